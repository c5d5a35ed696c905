//! Analytics events for experiments and the quiz funnel.
//!
//! Emission is fire-and-forget: a failing sink is logged and skipped, and
//! never surfaces to the caller. Payload keys are snake_case to match the
//! parameter names the analytics properties already collect.

use serde::Serialize;
use std::sync::{Arc, Mutex};

use super::attribution::TouchHistory;
use super::registry::ExperimentRegistry;
use super::resolver::{ExperimentContext, NewAssignment};
use crate::quiz::score::ScoreBucket;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackingEvent {
    ExperimentImpression {
        experiment_id: String,
        experiment_name: String,
        variant_id: String,
    },
    ExperimentConversion {
        experiment_id: String,
        experiment_name: String,
        variant_id: String,
        conversion_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(flatten)]
        extra: serde_json::Map<String, serde_json::Value>,
    },
    CtaClick {
        experiment_id: String,
        experiment_name: String,
        variant_id: String,
        cta_name: String,
        cta_destination: String,
    },
    QuizView {
        slug: String,
    },
    QuizStart {
        slug: String,
    },
    QuizComplete {
        slug: String,
        score: usize,
    },
    QuizScoreBucket {
        slug: String,
        bucket: ScoreBucket,
    },
    QuizCtaClick {
        slug: String,
        cta: QuizCta,
    },
    QuizCtaDownloadClick {
        slug: String,
        cta: QuizCta,
    },
    QuizShare {
        slug: String,
        score: usize,
        method: ShareMethod,
    },
    /// Stored first and last touch, as flat `ft_*` and `lt_*` keys.
    AttributionUpdate {
        #[serde(flatten)]
        params: serde_json::Map<String, serde_json::Value>,
    },
}

/// Call-to-action buttons on the quiz results view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizCta {
    Download,
    HowItWorks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareMethod {
    /// The platform share sheet.
    Native,
    /// Link copied to the clipboard.
    Copy,
}

impl TrackingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TrackingEvent::ExperimentImpression { .. } => "experiment_impression",
            TrackingEvent::ExperimentConversion { .. } => "experiment_conversion",
            TrackingEvent::CtaClick { .. } => "cta_click",
            TrackingEvent::QuizView { .. } => "quiz_view",
            TrackingEvent::QuizStart { .. } => "quiz_start",
            TrackingEvent::QuizComplete { .. } => "quiz_complete",
            TrackingEvent::QuizScoreBucket { .. } => "quiz_score_bucket",
            TrackingEvent::QuizCtaClick { .. } => "quiz_cta_click",
            TrackingEvent::QuizCtaDownloadClick { .. } => "quiz_cta_download_click",
            TrackingEvent::QuizShare { .. } => "quiz_share",
            TrackingEvent::AttributionUpdate { .. } => "attribution_update",
        }
    }

    /// Flat JSON object, `event` key included.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "event": self.name() }))
    }
}

/// Extra data carried by a conversion event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversion {
    pub conversion_type: String,
    pub value: Option<f64>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Conversion {
    pub fn new(conversion_type: impl Into<String>) -> Self {
        Self {
            conversion_type: conversion_type.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, thiserror::Error)]
#[error("tracking sink {sink} failed: {reason}")]
pub struct TrackingError {
    pub sink: String,
    pub reason: String,
}

/// Destination for analytics events (a pixel, a measurement API, a log).
pub trait TrackingSink: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError>;
}

/// Writes every event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TrackingSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
        tracing::info!(
            target: "flocken::tracking",
            event = event.name(),
            payload = %event.payload(),
            "Tracking event"
        );
        Ok(())
    }
}

/// Keeps events in memory; used by tests and local tooling.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TrackingEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TrackingEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(TrackingEvent::name).collect()
    }
}

impl TrackingSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, event: &TrackingEvent) -> Result<(), TrackingError> {
        let mut events = self.events.lock().map_err(|e| TrackingError {
            sink: "recording".to_string(),
            reason: e.to_string(),
        })?;
        events.push(event.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct Tracker {
    sinks: Vec<Arc<dyn TrackingSink>>,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Tracker").field("sinks", &names).finish()
    }
}

impl Tracker {
    pub fn new(sinks: Vec<Arc<dyn TrackingSink>>) -> Self {
        Self { sinks }
    }

    /// No sinks: every emit is a no-op.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn TrackingSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn emit(&self, event: TrackingEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(&event) {
                tracing::warn!(
                    sink = sink.name(),
                    event = event.name(),
                    error = %e,
                    "Dropping tracking event"
                );
            }
        }
    }

    /// One impression per newly created assignment; kept assignments emit nothing.
    pub fn impressions(&self, registry: &ExperimentRegistry, new_assignments: &[NewAssignment]) {
        for assignment in new_assignments {
            let Some(experiment) = registry.get(&assignment.experiment_id) else {
                continue;
            };
            self.emit(TrackingEvent::ExperimentImpression {
                experiment_id: experiment.id.clone(),
                experiment_name: experiment.name.clone(),
                variant_id: assignment.variant_id.clone(),
            });
        }
    }

    /// Returns false when the visitor has no assignment for `experiment_id`.
    pub fn conversion(
        &self,
        context: &ExperimentContext,
        experiment_id: &str,
        conversion: Conversion,
    ) -> bool {
        let Some(active) = context.get(experiment_id) else {
            return false;
        };
        self.emit(TrackingEvent::ExperimentConversion {
            experiment_id: active.experiment_id.clone(),
            experiment_name: active.experiment_name.clone(),
            variant_id: active.variant_id.clone(),
            conversion_type: conversion.conversion_type,
            value: conversion.value,
            extra: conversion.extra,
        });
        true
    }

    /// Every results-view CTA emits `quiz_cta_click`; the download button
    /// also emits `quiz_cta_download_click`.
    pub fn quiz_cta_click(&self, slug: &str, cta: QuizCta) {
        self.emit(TrackingEvent::QuizCtaClick {
            slug: slug.to_string(),
            cta,
        });
        if cta == QuizCta::Download {
            self.emit(TrackingEvent::QuizCtaDownloadClick {
                slug: slug.to_string(),
                cta,
            });
        }
    }

    pub fn quiz_share(&self, slug: &str, score: usize, method: ShareMethod) {
        self.emit(TrackingEvent::QuizShare {
            slug: slug.to_string(),
            score,
            method,
        });
    }

    /// Skipped when the visitor has no stored attribution.
    pub fn attribution_update(&self, history: &TouchHistory) -> bool {
        let params = history.event_params();
        if params.is_empty() {
            return false;
        }
        self.emit(TrackingEvent::AttributionUpdate { params });
        true
    }

    /// Emits one click per assigned experiment, so every running test on the
    /// page can attribute the click.
    pub fn cta_click(&self, context: &ExperimentContext, cta_name: &str, cta_destination: &str) {
        for active in &context.variants {
            self.emit(TrackingEvent::CtaClick {
                experiment_id: active.experiment_id.clone(),
                experiment_name: active.experiment_name.clone(),
                variant_id: active.variant_id.clone(),
                cta_name: cta_name.to_string(),
                cta_destination: cta_destination.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiments::config::{Experiment, ExperimentStatus, Variant};
    use crate::experiments::cookie::Assignments;
    use serde_json::json;

    struct FailingSink;

    impl TrackingSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn send(&self, _event: &TrackingEvent) -> Result<(), TrackingError> {
            Err(TrackingError {
                sink: "failing".to_string(),
                reason: "network down".to_string(),
            })
        }
    }

    fn registry() -> ExperimentRegistry {
        ExperimentRegistry::new(vec![Experiment {
            id: "hero".to_string(),
            name: "Hero copy".to_string(),
            description: None,
            status: ExperimentStatus::Running,
            start_date: None,
            end_date: None,
            variants: vec![
                Variant {
                    id: "control".to_string(),
                    weight: 1.0,
                    content: serde_json::Map::new(),
                },
                Variant {
                    id: "variant_b".to_string(),
                    weight: 1.0,
                    content: serde_json::Map::new(),
                },
            ],
            target_pages: vec!["/".to_string()],
        }])
        .unwrap()
    }

    fn context(variant: &str) -> ExperimentContext {
        let mut assignments = Assignments::new();
        assignments.insert("hero".to_string(), variant.to_string());
        ExperimentContext::from_assignments(&registry(), &assignments)
    }

    #[test]
    fn impression_payload_carries_the_triple() {
        let event = TrackingEvent::ExperimentImpression {
            experiment_id: "hero".to_string(),
            experiment_name: "Hero copy".to_string(),
            variant_id: "control".to_string(),
        };
        assert_eq!(
            event.payload(),
            json!({
                "event": "experiment_impression",
                "experiment_id": "hero",
                "experiment_name": "Hero copy",
                "variant_id": "control"
            })
        );
    }

    #[test]
    fn conversion_payload_flattens_extra() {
        let event = TrackingEvent::ExperimentConversion {
            experiment_id: "hero".to_string(),
            experiment_name: "Hero copy".to_string(),
            variant_id: "variant_b".to_string(),
            conversion_type: "app_download".to_string(),
            value: None,
            extra: json!({"store": "ios"}).as_object().unwrap().clone(),
        };
        let payload = event.payload();
        assert_eq!(payload["conversion_type"], "app_download");
        assert_eq!(payload["store"], "ios");
        assert!(payload.get("value").is_none());
    }

    #[test]
    fn failing_sink_does_not_stop_the_others() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::new(vec![Arc::new(FailingSink), recording.clone()]);
        tracker.emit(TrackingEvent::QuizView {
            slug: "hundraser".to_string(),
        });
        assert_eq!(recording.event_names(), vec!["quiz_view"]);
    }

    #[test]
    fn impressions_only_for_new_assignments() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        tracker.impressions(
            &registry(),
            &[
                NewAssignment {
                    experiment_id: "hero".to_string(),
                    variant_id: "variant_b".to_string(),
                },
                NewAssignment {
                    experiment_id: "unknown".to_string(),
                    variant_id: "control".to_string(),
                },
            ],
        );
        let events = recording.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TrackingEvent::ExperimentImpression { variant_id, experiment_name, .. }
                if variant_id == "variant_b" && experiment_name == "Hero copy"
        ));
    }

    #[test]
    fn conversion_uses_assigned_variant() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        let sent = tracker.conversion(
            &context("variant_b"),
            "hero",
            Conversion::new("signup").with_value(49.0),
        );
        assert!(sent);
        let payload = recording.events()[0].payload();
        assert_eq!(payload["variant_id"], "variant_b");
        assert_eq!(payload["value"], 49.0);
    }

    #[test]
    fn conversion_without_assignment_is_skipped() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        assert!(!tracker.conversion(&context("control"), "pricing", Conversion::new("signup")));
        assert!(recording.events().is_empty());
    }

    #[test]
    fn cta_click_attributes_every_assignment() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        tracker.cta_click(&context("control"), "hero_download", "https://apps.apple.com");
        let payload = recording.events()[0].payload();
        assert_eq!(payload["event"], "cta_click");
        assert_eq!(payload["cta_name"], "hero_download");
        assert_eq!(payload["variant_id"], "control");
    }

    #[test]
    fn score_bucket_serializes_lowercase() {
        let event = TrackingEvent::QuizScoreBucket {
            slug: "hundraser".to_string(),
            bucket: ScoreBucket::Med,
        };
        assert_eq!(event.payload()["bucket"], "med");
    }

    #[test]
    fn download_cta_emits_both_events() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        tracker.quiz_cta_click("hundraser", QuizCta::Download);
        tracker.quiz_cta_click("hundraser", QuizCta::HowItWorks);
        assert_eq!(
            recording.event_names(),
            vec!["quiz_cta_click", "quiz_cta_download_click", "quiz_cta_click"]
        );
        let events = recording.events();
        assert_eq!(events[1].payload()["cta"], "download");
        assert_eq!(events[2].payload()["cta"], "how_it_works");
    }

    #[test]
    fn share_carries_score_and_method() {
        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        tracker.quiz_share("hundraser", 7, ShareMethod::Copy);
        assert_eq!(
            recording.events()[0].payload(),
            json!({"event": "quiz_share", "slug": "hundraser", "score": 7, "method": "copy"})
        );
    }

    #[test]
    fn attribution_update_flattens_touch_params() {
        use crate::experiments::attribution::Attribution;
        use chrono::TimeZone;

        let recording = Arc::new(RecordingSink::new());
        let tracker = Tracker::disabled().with_sink(recording.clone());
        assert!(!tracker.attribution_update(&TouchHistory::default()));

        let mut history = TouchHistory::default();
        let now = chrono::Utc.timestamp_millis_opt(42).unwrap();
        history.record(Attribution::from_query("utm_source=instagram", now));
        assert!(tracker.attribution_update(&history));

        let payload = recording.events()[0].payload();
        assert_eq!(payload["event"], "attribution_update");
        assert_eq!(payload["ft_source"], "instagram");
        assert_eq!(payload["lt_ts"], 42);
    }
}
