//! Context retrieval collaborator.
//!
//! Checks that need external context ask a `Retriever` with a unit-specific
//! query. Retrieval is strictly best-effort: the pipeline treats any error as
//! empty context, so implementations can fail freely without taking a round
//! down with them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Provides reference context for a query. Implementations rank and trim
/// however they like; quality of ranking is not this crate's concern.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, instructions: &str) -> Result<String>;
}

/// Retriever that always returns empty context. Useful when no knowledge
/// base is configured.
pub struct NoRetriever;

#[async_trait]
impl Retriever for NoRetriever {
    async fn retrieve(&self, _query: &str, _instructions: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// Keyword-scored retrieval over a directory of plain-text notes.
///
/// Splits each `.md`/`.txt` file into paragraphs and scores them by overlap
/// with the query's significant words. Deliberately simple; it stands in
/// for a real embedding store behind the same trait.
pub struct NotesRetriever {
    notes_dir: PathBuf,
    max_excerpts: usize,
}

impl NotesRetriever {
    pub fn new(notes_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
            max_excerpts: 3,
        }
    }

    pub fn with_max_excerpts(mut self, max_excerpts: usize) -> Self {
        self.max_excerpts = max_excerpts;
        self
    }

    fn keywords(query: &str) -> Vec<String> {
        query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(String::from)
            .collect()
    }
}

#[async_trait]
impl Retriever for NotesRetriever {
    async fn retrieve(&self, query: &str, _instructions: &str) -> Result<String> {
        let keywords = Self::keywords(query);
        if keywords.is_empty() {
            return Ok(String::new());
        }

        let mut scored: Vec<(usize, String)> = Vec::new();
        let entries = std::fs::read_dir(&self.notes_dir)
            .with_context(|| format!("failed to read notes dir {}", self.notes_dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let is_note = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "md" || e == "txt");
            if !is_note {
                continue;
            }
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read note {}", path.display()))?;
            for paragraph in content.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                let lower = paragraph.to_lowercase();
                let score = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
                if score > 0 {
                    scored.push((score, paragraph.to_string()));
                }
            }
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.max_excerpts);

        Ok(scored
            .into_iter()
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
