use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

use super::assignment::select_variant;
use super::config::{Experiment, Variant};
use super::cookie::{merge_assignments, Assignments};
use super::registry::ExperimentRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAssignment {
    pub experiment_id: String,
    pub variant_id: String,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    /// Full merged mapping, including experiments this page did not touch.
    pub assignments: Assignments,
    /// Assignments created by this call; only these get an impression event.
    pub new_assignments: Vec<NewAssignment>,
    /// Number of active experiments resolved for the path.
    pub resolved: usize,
}

impl Resolution {
    /// False when no experiment ran on the path: writing the cookie then would
    /// only churn it.
    pub fn needs_cookie_write(&self) -> bool {
        self.resolved > 0
    }
}

/// Decides the variant of every active experiment on a page. Shared by the
/// request middleware and by anything that needs the visitor's context.
#[derive(Debug, Clone)]
pub struct AssignmentResolver {
    registry: Arc<ExperimentRegistry>,
}

impl AssignmentResolver {
    pub fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExperimentRegistry {
        &self.registry
    }

    pub fn resolve<R: Rng>(
        &self,
        path: &str,
        mut existing: Assignments,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Resolution {
        let mut updates = Vec::new();
        let mut new_assignments = Vec::new();
        let mut resolved = 0;

        for experiment in self.registry.active_for_page(path, now) {
            let kept = existing
                .get(&experiment.id)
                .and_then(|variant_id| experiment.variant(variant_id));
            if let Some(variant) = kept {
                resolved += 1;
                updates.push((experiment.id.clone(), variant.id.clone()));
                continue;
            }

            let Some(variant) = select_variant(&experiment.variants, rng) else {
                tracing::warn!(experiment = %experiment.id, "Experiment has no variants, skipping");
                continue;
            };
            resolved += 1;
            tracing::debug!(
                experiment = %experiment.id,
                variant = %variant.id,
                path,
                "Assigned new variant"
            );
            updates.push((experiment.id.clone(), variant.id.clone()));
            new_assignments.push(NewAssignment {
                experiment_id: experiment.id.clone(),
                variant_id: variant.id.clone(),
            });
        }

        merge_assignments(&mut existing, updates);
        Resolution {
            assignments: existing,
            new_assignments,
            resolved,
        }
    }

    pub fn context(&self, assignments: &Assignments) -> ExperimentContext {
        ExperimentContext::from_assignments(&self.registry, assignments)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveVariant {
    pub experiment_id: String,
    pub experiment_name: String,
    pub variant_id: String,
    pub content: serde_json::Map<String, serde_json::Value>,
}

/// The visitor's view of their experiments, derived from the cookie mapping.
/// Entries whose experiment or variant no longer exists are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentContext {
    pub variants: Vec<ActiveVariant>,
}

impl ExperimentContext {
    pub fn from_assignments(registry: &ExperimentRegistry, assignments: &Assignments) -> Self {
        let variants = assignments
            .iter()
            .filter_map(|(experiment_id, variant_id)| {
                let experiment = registry.get(experiment_id)?;
                let variant = experiment.variant(variant_id)?;
                Some(active_variant(experiment, variant))
            })
            .collect();
        Self { variants }
    }

    pub fn variant_id(&self, experiment_id: &str) -> Option<&str> {
        self.get(experiment_id).map(|v| v.variant_id.as_str())
    }

    pub fn get(&self, experiment_id: &str) -> Option<&ActiveVariant> {
        self.variants
            .iter()
            .find(|v| v.experiment_id == experiment_id)
    }

    pub fn content_or<T: serde::de::DeserializeOwned>(
        &self,
        experiment_id: &str,
        key: &str,
        default: T,
    ) -> T {
        self.get(experiment_id)
            .and_then(|v| v.content.get(key))
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or(default)
    }
}

fn active_variant(experiment: &Experiment, variant: &Variant) -> ActiveVariant {
    ActiveVariant {
        experiment_id: experiment.id.clone(),
        experiment_name: experiment.name.clone(),
        variant_id: variant.id.clone(),
        content: variant.content.clone(),
    }
}
