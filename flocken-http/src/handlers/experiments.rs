use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use flocken::experiments::aggregate::{DailyAggregate, ExperimentAggregate, CONTROL_VARIANT_ID};
use flocken::experiments::report::{
    format_daily_breakdown, format_experiment_list, format_sample_size_report, ExperimentReport,
    MAX_DAILY_ROWS,
};
use flocken::experiments::sample_size::{calculate_sample_size, SampleSizeParams, SampleSizeResult};
use flocken::experiments::stats::ArmCounts;
use flocken::experiments::{Assignments, Experiment, ExperimentContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error_response, flocken_error_to_response, AppState};

const DEFAULT_CHALLENGER_ID: &str = "variant";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextResponse {
    pub assignments: Assignments,
    #[serde(flatten)]
    pub context: ExperimentContext,
}

/// Assignments the request's cookie already carries. Never assigns.
pub async fn experiment_context(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<ContextResponse> {
    let assignments = state.assignments_from_headers(&headers);
    let context = state.resolver.context(&assignments);
    Json(ContextResponse {
        assignments,
        context,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareRequest {
    pub control_visitors: u64,
    pub control_conversions: u64,
    pub variant_visitors: u64,
    pub variant_conversions: u64,
    #[serde(default)]
    pub experiment_id: Option<String>,
    #[serde(default)]
    pub experiment_name: Option<String>,
    #[serde(default)]
    pub days_running: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    #[serde(flatten)]
    pub report: ExperimentReport,
    pub markdown: String,
}

impl From<ExperimentReport> for ReportResponse {
    fn from(report: ExperimentReport) -> Self {
        let markdown = report.to_markdown();
        Self { report, markdown }
    }
}

fn compare_report(req: &CompareRequest) -> ExperimentReport {
    let experiment_id = req.experiment_id.as_deref().unwrap_or("adhoc");
    let experiment_name = req.experiment_name.as_deref().unwrap_or(experiment_id);
    ExperimentReport::from_counts(
        experiment_id,
        experiment_name,
        req.days_running,
        CONTROL_VARIANT_ID,
        ArmCounts::new(req.control_visitors, req.control_conversions),
        DEFAULT_CHALLENGER_ID,
        ArmCounts::new(req.variant_visitors, req.variant_conversions),
        &mut rand::thread_rng(),
    )
}

/// Runs CPU-bound analysis off the async workers. A panicked task maps to 500.
async fn run_blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "Analysis task failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("analysis task failed: {}", e))
    })
}

pub async fn compare(Json(req): Json<CompareRequest>) -> Response {
    match run_blocking(move || compare_report(&req)).await {
        Ok(report) => Json(ReportResponse::from(report)).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSizeResponse {
    #[serde(flatten)]
    pub result: SampleSizeResult,
    pub markdown: String,
}

pub async fn sample_size(Json(params): Json<SampleSizeParams>) -> Response {
    match calculate_sample_size(&params) {
        Ok(result) => Json(SampleSizeResponse {
            result,
            markdown: format_sample_size_report(&params, &result),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn aggregate_report(aggregate: &ExperimentAggregate) -> Result<ExperimentReport, Response> {
    aggregate.validate().map_err(flocken_error_to_response)?;
    ExperimentReport::from_aggregate(aggregate, &mut rand::thread_rng())
        .map_err(flocken_error_to_response)
}

/// Report for an exported per-variant aggregate (same shape as the files the
/// CLI reads).
pub async fn experiment_report(Json(aggregate): Json<ExperimentAggregate>) -> Response {
    let built = match run_blocking(move || aggregate_report(&aggregate)).await {
        Ok(built) => built,
        Err(resp) => return resp,
    };
    match built {
        Ok(report) => {
            tracing::debug!(
                experiment = %report.experiment_id,
                visitors = report.total_visitors(),
                "Built experiment report"
            );
            Json(ReportResponse::from(report)).into_response()
        }
        Err(resp) => resp,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownResponse {
    pub experiment_id: String,
    pub rows: Vec<DailyAggregate>,
    pub markdown: String,
}

/// Daily table for an exported aggregate, newest day first.
pub async fn daily_breakdown(
    Json(aggregate): Json<ExperimentAggregate>,
) -> Json<BreakdownResponse> {
    let rows = aggregate
        .daily_newest_first()
        .into_iter()
        .take(MAX_DAILY_ROWS)
        .cloned()
        .collect();
    Json(BreakdownResponse {
        markdown: format_daily_breakdown(&aggregate),
        experiment_id: aggregate.experiment_id,
        rows,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentListResponse {
    pub experiments: Vec<Experiment>,
    pub running: usize,
    pub markdown: String,
}

/// Every experiment in the registry, whatever its status.
pub async fn list_experiments(
    State(state): State<Arc<AppState>>,
) -> Json<ExperimentListResponse> {
    let registry = state.resolver.registry();
    Json(ExperimentListResponse {
        experiments: registry.all().to_vec(),
        running: registry.running().count(),
        markdown: format_experiment_list(registry.all()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{body_json, state};
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::routing::{get, post};
    use axum::Router;
    use flocken::experiments::cookie::{encode_cookie_value, AB_COOKIE_NAME};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_router(tmp: &TempDir) -> Router {
        Router::new()
            .route("/api/experiments", get(list_experiments))
            .route("/api/experiments/context", get(experiment_context))
            .route("/api/experiments/breakdown", post(daily_breakdown))
            .route("/api/experiments/compare", post(compare))
            .route("/api/experiments/sample-size", post(sample_size))
            .route("/api/experiments/report", post(experiment_report))
            .with_state(Arc::new(state(tmp.path())))
    }

    async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn context_reflects_cookie_without_assigning() {
        let tmp = TempDir::new().unwrap();
        let app = app_router(&tmp);
        let mut assignments = Assignments::new();
        assignments.insert("valkommen_hero_v1".into(), "variant_c".into());
        assignments.insert("retired_test".into(), "control".into());
        let cookie = format!("{AB_COOKIE_NAME}={}", encode_cookie_value(&assignments));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/experiments/context")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());

        let json = body_json(resp).await;
        assert_eq!(json["assignments"]["retired_test"], "control");
        let variants = json["variants"].as_array().unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0]["variantId"], "variant_c");
        assert_eq!(variants[0]["content"]["heroTitle"], "Slipp röriga Facebook-grupper");
    }

    #[tokio::test]
    async fn context_without_cookie_is_empty() {
        let tmp = TempDir::new().unwrap();
        let resp = app_router(&tmp)
            .oneshot(
                Request::builder()
                    .uri("/api/experiments/context")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["assignments"], serde_json::json!({}));
        assert_eq!(json["variants"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn compare_returns_tests_and_markdown() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/compare",
            serde_json::json!({
                "controlVisitors": 1000,
                "controlConversions": 50,
                "variantVisitors": 1000,
                "variantConversions": 75,
                "experimentName": "Hero copy"
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["zTest"]["significant"], true);
        assert_eq!(json["zTest"]["winner"], "variant");
        assert!(json["bayesian"]["probabilityVariantBetter"].as_f64().unwrap() > 0.95);
        let markdown = json["markdown"].as_str().unwrap();
        assert!(markdown.contains("Hero copy"));
        assert!(markdown.contains("variant wins"));
    }

    #[tokio::test]
    async fn compare_rejects_missing_counts() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/compare",
            serde_json::json!({"controlVisitors": 10}),
        )
        .await;
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn sample_size_applies_defaults() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/sample-size",
            serde_json::json!({"baselineConversionRate": 0.05, "minimumDetectableEffect": 0.2}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let n = json["sampleSizePerVariant"].as_u64().unwrap();
        assert!((8_100..=8_220).contains(&n), "n={n}");
        assert_eq!(json["totalSampleSize"].as_u64().unwrap(), 2 * n);
        assert!(json["markdown"].is_string());
    }

    #[tokio::test]
    async fn sample_size_out_of_range_is_400() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/sample-size",
            serde_json::json!({"baselineConversionRate": 1.5, "minimumDetectableEffect": 0.2}),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert!(json["message"].as_str().unwrap().contains("baseline"));
    }

    #[tokio::test]
    async fn report_from_aggregate_body() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/report",
            serde_json::json!({
                "experimentId": "valkommen_hero_v1",
                "experimentName": "Välkommen hero",
                "daysRunning": 12,
                "variants": [
                    {"variantId": "control", "impressions": 1000, "conversions": 50},
                    {"variantId": "variant_c", "impressions": 1000, "conversions": 75}
                ]
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["variantId"], "variant_c");
        assert!(json["markdown"].as_str().unwrap().contains("**Days running:** 12"));
    }

    #[tokio::test]
    async fn report_with_one_variant_is_400() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/report",
            serde_json::json!({
                "experimentId": "solo",
                "variants": [{"variantId": "control", "impressions": 10, "conversions": 1}]
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(resp).await["message"].is_string());
    }

    #[tokio::test]
    async fn panicked_analysis_is_500() {
        let resp = run_blocking(|| -> u64 { panic!("boom") }).await.unwrap_err();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert!(json["message"].as_str().unwrap().starts_with("analysis task failed"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn compare_runs_on_single_threaded_runtime() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/compare",
            serde_json::json!({
                "controlVisitors": 500,
                "controlConversions": 20,
                "variantVisitors": 500,
                "variantConversions": 22
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["zTest"]["significant"], false);
    }

    #[tokio::test]
    async fn list_includes_every_status() {
        let tmp = TempDir::new().unwrap();
        let resp = app_router(&tmp)
            .oneshot(
                Request::builder()
                    .uri("/api/experiments")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        let ids: Vec<&str> = json["experiments"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"valkommen_hero_v1"));
        assert!(json["running"].as_u64().unwrap() >= 1);
        assert!(json["markdown"].as_str().unwrap().contains("(running)"));
    }

    #[tokio::test]
    async fn breakdown_returns_sorted_rows() {
        let tmp = TempDir::new().unwrap();
        let resp = post_json(
            &app_router(&tmp),
            "/api/experiments/breakdown",
            serde_json::json!({
                "experimentId": "valkommen_hero_v1",
                "variants": [
                    {"variantId": "control", "impressions": 20, "conversions": 2},
                    {"variantId": "variant_c", "impressions": 20, "conversions": 3}
                ],
                "daily": [
                    {"date": "20250101", "variantId": "variant_c", "impressions": 10, "conversions": 1},
                    {"date": "20250102", "variantId": "variant_c", "impressions": 10, "conversions": 2}
                ]
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["rows"][0]["date"], "20250102");
        assert_eq!(json["rows"][1]["date"], "20250101");
        let markdown = json["markdown"].as_str().unwrap();
        assert!(markdown.contains("| 20250102 | variant_c | 10 | 2 | 20.00% |"));
    }
}
