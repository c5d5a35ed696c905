//! Quiz definitions on disk: one `<slug>.json` per quiz.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::schema::{is_valid_slug, parse_quiz_definition};
use super::types::QuizDefinition;
use super::QuizError;

#[derive(Debug, Clone)]
pub struct QuizStore {
    dir: PathBuf,
}

impl QuizStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every quiz in the directory, ordered by file name. One invalid file
    /// fails the whole listing. A missing directory is an empty listing.
    pub fn all(&self) -> Result<Vec<QuizDefinition>, QuizError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "Quiz directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<String> = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                files.push(name);
            }
        }
        files.sort();

        files.iter().map(|name| self.read_file(name)).collect()
    }

    /// Slug lookup is trimmed and lower-cased. A blank slug or a missing
    /// file is `Ok(None)`; any other failure is an error.
    pub fn by_slug(&self, slug: &str) -> Result<Option<QuizDefinition>, QuizError> {
        let safe = slug.trim().to_lowercase();
        if safe.is_empty() || !is_valid_slug(&safe) {
            return Ok(None);
        }
        match self.read_file(&format!("{safe}.json")) {
            Ok(quiz) => Ok(Some(quiz)),
            Err(QuizError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn require(&self, slug: &str) -> Result<QuizDefinition, QuizError> {
        self.by_slug(slug)?
            .ok_or_else(|| QuizError::NotFound(slug.trim().to_string()))
    }

    fn read_file(&self, file_name: &str) -> Result<QuizDefinition, QuizError> {
        let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
        let raw = std::fs::read_to_string(self.dir.join(file_name))?;
        let quiz = parse_quiz_definition(&raw, stem)?;
        if quiz.slug != stem {
            return Err(QuizError::Invalid {
                slug: quiz.slug,
                reason: format!("slug does not match file name {file_name}, expected {stem}"),
            });
        }
        Ok(quiz)
    }
}
