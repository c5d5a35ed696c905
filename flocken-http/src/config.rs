//! Runtime configuration read from `FLOCKEN_*` environment variables.

use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_QUIZ_DIR: &str = "./data/quizzes";

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// `development` or anything else. Non-development modes set `Secure` on
    /// the assignment cookie.
    pub env_mode: String,
    pub bind_addr: String,
    /// JSON list of experiments. `None` runs with an empty registry.
    pub experiments_file: Option<PathBuf>,
    pub quiz_dir: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            env_mode: "development".into(),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            experiments_file: None,
            quiz_dir: PathBuf::from(DEFAULT_QUIZ_DIR),
        }
    }
}

impl HttpConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            env_mode: get("FLOCKEN_ENV").unwrap_or(defaults.env_mode),
            bind_addr: get("FLOCKEN_BIND_ADDR").unwrap_or(defaults.bind_addr),
            experiments_file: get("FLOCKEN_EXPERIMENTS_FILE").map(PathBuf::from),
            quiz_dir: get("FLOCKEN_QUIZ_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.quiz_dir),
        }
    }

    pub fn is_development(&self) -> bool {
        self.env_mode == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> HttpConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HttpConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let c = config(&[]);
        assert_eq!(c, HttpConfig::default());
        assert!(c.is_development());
        assert_eq!(c.bind_addr, "127.0.0.1:3000");
    }

    #[test]
    fn reads_every_variable() {
        let c = config(&[
            ("FLOCKEN_ENV", "production"),
            ("FLOCKEN_BIND_ADDR", "0.0.0.0:8080"),
            ("FLOCKEN_EXPERIMENTS_FILE", "/etc/flocken/experiments.json"),
            ("FLOCKEN_QUIZ_DIR", "/srv/quizzes"),
        ]);
        assert!(!c.is_development());
        assert_eq!(c.bind_addr, "0.0.0.0:8080");
        assert_eq!(
            c.experiments_file,
            Some(PathBuf::from("/etc/flocken/experiments.json"))
        );
        assert_eq!(c.quiz_dir, PathBuf::from("/srv/quizzes"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let c = config(&[("FLOCKEN_BIND_ADDR", "  "), ("FLOCKEN_EXPERIMENTS_FILE", "")]);
        assert_eq!(c.bind_addr, DEFAULT_BIND_ADDR);
        assert!(c.experiments_file.is_none());
    }
}
