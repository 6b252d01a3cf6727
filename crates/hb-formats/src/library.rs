//! Named pattern collection, resolvable by the morph state machine.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use hb_engine::{LoadError, PatternLoader};
use hb_ir::Pattern;

use crate::pattern_store::{load_pattern, save_pattern};
use crate::FormatError;

/// Patterns keyed by id, held in memory and optionally backed by a
/// directory of `<id>.json` files.
///
/// Directory patterns are read on first use and cached.
#[derive(Debug, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, Pattern>,
    dir: Option<PathBuf>,
    /// Required (voices, steps), if any
    shape: Option<(usize, usize)>,
}

impl PatternLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library that falls back to `<dir>/<id>.json` for unknown ids.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Reject patterns that are not `voices` × `steps`.
    pub fn require_shape(mut self, voices: usize, steps: usize) -> Self {
        self.shape = Some((voices, steps));
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn insert(&mut self, id: impl Into<String>, pattern: Pattern) {
        self.patterns.insert(id.into(), pattern);
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.patterns.contains_key(id) || self.file_for(id).is_some_and(|p| p.is_file())
    }

    /// Ids currently held in memory, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Write a pattern to the backing directory and keep it in memory.
    pub fn save(&mut self, id: &str, pattern: Pattern) -> Result<(), FormatError> {
        if let Some(path) = self.file_for(id) {
            save_pattern(&path, &pattern)?;
        }
        self.insert(id, pattern);
        Ok(())
    }

    fn file_for(&self, id: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        valid_id(id).then(|| dir.join(format!("{id}.json")))
    }

    fn check_shape(&self, id: &str, pattern: &Pattern) -> Result<(), LoadError> {
        match self.shape {
            Some((voices, steps)) if pattern.voices() != voices || pattern.steps() != steps => {
                Err(LoadError::Shape {
                    id: id.to_string(),
                    voices: pattern.voices(),
                    steps: pattern.steps(),
                    expected_voices: voices,
                    expected_steps: steps,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Ids name files, so they may not carry path syntax.
fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.')
}

impl PatternLoader for PatternLibrary {
    fn load(&mut self, id: &str) -> Result<Pattern, LoadError> {
        if let Some(pattern) = self.patterns.get(id) {
            self.check_shape(id, pattern)?;
            return Ok(pattern.clone());
        }

        let Some(path) = self.file_for(id) else {
            return Err(LoadError::UnknownId(id.to_string()));
        };
        let pattern = load_pattern(&path).map_err(|err| match err {
            FormatError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
                LoadError::UnknownId(id.to_string())
            }
            other => LoadError::Malformed {
                id: id.to_string(),
                reason: other.to_string(),
            },
        })?;
        self.check_shape(id, &pattern)?;
        log::debug!("loaded pattern `{id}` from {}", path.display());
        self.patterns.insert(id.to_string(), pattern.clone());
        Ok(pattern)
    }
}
