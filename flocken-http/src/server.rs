use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::HttpConfig;
use crate::handlers::{
    compare, daily_breakdown, experiment_context, experiment_report, get_quiz, health,
    list_experiments, list_quizzes, page, quiz_result, sample_size, AppState,
};
use crate::middleware::assign_experiments;

pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let startup_start = std::time::Instant::now();
    let config = HttpConfig::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::from_config(&config)?);
    tracing::info!(
        env = %config.env_mode,
        experiments = state.resolver.registry().len(),
        running = state.resolver.registry().running().count(),
        quiz_dir = %config.quiz_dir.display(),
        secure_cookie = state.cookie.secure,
        "Experiment configuration loaded"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        startup_ms = startup_start.elapsed().as_millis() as u64,
        "Flocken listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

/// API routes, plus a page fallback that every non-API path reaches through
/// the assignment middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/experiments", get(list_experiments))
        .route("/api/experiments/context", get(experiment_context))
        .route("/api/experiments/breakdown", post(daily_breakdown))
        .route("/api/experiments/compare", post(compare))
        .route("/api/experiments/sample-size", post(sample_size))
        .route("/api/experiments/report", post(experiment_report))
        .route("/api/quiz", get(list_quizzes))
        .route("/api/quiz/:slug", get(get_quiz))
        .route("/api/quiz/:slug/result", get(quiz_result))
        .fallback(page)
        .layer(middleware::from_fn_with_state(state.clone(), assign_experiments))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
}
