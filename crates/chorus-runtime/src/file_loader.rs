//! The `FileLoader` collaborator (spec §6): reads attachment content
//! from the local filesystem ahead of summarisation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chorus_core::{ChorusError, ChorusResult};

/// Caps how much of a file's content is handed to the summariser model.
/// Longer files are truncated, not rejected — the chosen policy mirrors
/// `handleStream`'s "load and trim its content" step.
pub const MAX_SUMMARY_INPUT_BYTES: usize = 16 * 1024;

/// Reads attachment content for file summarisation (spec §6, "Load(path)
/// → iterator<doc>"). A loader returns one or more text chunks ("docs")
/// rather than a single blob so a future implementation can page a large
/// file without changing the trait shape.
#[async_trait]
pub trait FileLoader: Send + Sync {
    /// Load and trim the document(s) backing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ChorusError::Resource`] if the path cannot be read.
    async fn load(&self, path: &str) -> ChorusResult<Vec<String>>;
}

/// Reads attachment content from a configured base directory on the
/// local filesystem (spec §6, "respects the configured file base
/// directory").
pub struct LocalFileLoader {
    base_dir: PathBuf,
}

impl LocalFileLoader {
    /// Build a loader rooted at `base_dir`. Paths passed to [`FileLoader::load`]
    /// are resolved relative to this directory.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.base_dir.join(Path::new(path))
    }
}

#[async_trait]
impl FileLoader for LocalFileLoader {
    async fn load(&self, path: &str) -> ChorusResult<Vec<String>> {
        let resolved = self.resolve(path);
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ChorusError::Resource(format!("reading {}: {e}", resolved.display())))?;
        let trimmed = if content.len() > MAX_SUMMARY_INPUT_BYTES {
            truncate_at_char_boundary(&content, MAX_SUMMARY_INPUT_BYTES)
        } else {
            content
        };
        Ok(vec![trimmed])
    }
}

fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> String {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_a_file_relative_to_base_dir() {
        let dir = std::env::temp_dir().join(format!("chorus-file-loader-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("notes.txt"), "hello world").await.unwrap();

        let loader = LocalFileLoader::new(&dir);
        let docs = loader.load("notes.txt").await.unwrap();
        assert_eq!(docs, vec!["hello world".to_string()]);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_a_resource_error() {
        let loader = LocalFileLoader::new(std::env::temp_dir());
        let err = loader.load("does-not-exist.txt").await.unwrap_err();
        assert!(matches!(err, ChorusError::Resource(_)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "a".repeat(10) + "\u{1F600}"; // 4-byte emoji right after the cutoff
        let truncated = truncate_at_char_boundary(&s, 11);
        assert!(truncated.is_char_boundary(truncated.len()));
        assert_eq!(truncated, "a".repeat(10));
    }
}
