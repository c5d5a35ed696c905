//! In-memory experiment configuration.
//!
//! The registry is built once (from code or a JSON file) and shared
//! read-only. Activity is never cached: every query takes `now` so that
//! date windows open and close without a restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;

use super::config::{Experiment, ExperimentError, ExperimentStatus};

#[derive(Debug, Clone, Default)]
pub struct ExperimentRegistry {
    experiments: Vec<Experiment>,
    by_id: HashMap<String, usize>,
}

impl ExperimentRegistry {
    pub fn new(experiments: Vec<Experiment>) -> Result<Self, ExperimentError> {
        let mut by_id = HashMap::with_capacity(experiments.len());
        for (idx, experiment) in experiments.iter().enumerate() {
            experiment.validate()?;
            if by_id.insert(experiment.id.clone(), idx).is_some() {
                return Err(ExperimentError::AlreadyExists(experiment.id.clone()));
            }
        }
        Ok(Self { experiments, by_id })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a JSON array of experiments.
    pub fn load(path: &Path) -> Result<Self, ExperimentError> {
        let data = std::fs::read_to_string(path)?;
        let experiments: Vec<Experiment> = serde_json::from_str(&data)?;
        let registry = Self::new(experiments)?;
        tracing::info!(
            path = %path.display(),
            experiments = registry.len(),
            "Loaded experiment registry"
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Experiment> {
        self.by_id.get(id).map(|&idx| &self.experiments[idx])
    }

    pub fn require(&self, id: &str) -> Result<&Experiment, ExperimentError> {
        self.get(id)
            .ok_or_else(|| ExperimentError::NotFound(id.to_string()))
    }

    pub fn all(&self) -> &[Experiment] {
        &self.experiments
    }

    /// Experiments with `status == running`, regardless of date window.
    pub fn running(&self) -> impl Iterator<Item = &Experiment> {
        self.experiments
            .iter()
            .filter(|e| e.status == ExperimentStatus::Running)
    }

    /// Experiments targeting `path` that are active at `now`, in registry order.
    pub fn active_for_page<'a>(
        &'a self,
        path: &'a str,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a Experiment> + 'a {
        self.experiments
            .iter()
            .filter(move |e| e.targets(path) && e.is_active(now))
    }
}
