//! Engine configuration
//!
//! Loaded from TOML; every section and field is optional.
//!
//! ```toml
//! [ranking]
//! min_score = 0.1
//! visible_percentile = 0.9
//! # absolute_cutoff = 0.95
//!
//! [commit]
//! notify_on_abort = false
//! default_fail_on_error = false
//! ```

use crate::error::EngineError;
use reqtrace_commit::{PipelineConfig, RankingPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Commit behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitPolicy {
    /// Publish an empty payload when a commit is aborted
    pub notify_on_abort: bool,
    /// Abort on any validation error even when the change set does not ask to
    pub default_fail_on_error: bool,
}

/// Engine configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ranking: RankingPolicy,
    pub commit: CommitPolicy,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_ranking(mut self, ranking: RankingPolicy) -> Self {
        self.ranking = ranking;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_commit_policy(mut self, commit: CommitPolicy) -> Self {
        self.commit = commit;
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// `Config` if the document is malformed or a threshold is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML file
    ///
    /// # Errors
    /// - `Io` if the file cannot be read
    /// - `Config` if it does not parse or validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    /// Render as TOML
    ///
    /// # Errors
    /// `Config` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Check that every threshold lies in `[0, 1]`
    ///
    /// # Errors
    /// `Config` naming the offending field
    pub fn validate(&self) -> Result<(), EngineError> {
        let ranking = &self.ranking;
        let fields = [
            ("ranking.min_score", Some(ranking.min_score)),
            ("ranking.visible_percentile", Some(ranking.visible_percentile)),
            ("ranking.absolute_cutoff", ranking.absolute_cutoff),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                if !(0.0..=1.0).contains(&value) {
                    return Err(EngineError::Config(format!(
                        "{name} must be within [0, 1], got {value}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Settings handed to the commit pipeline
    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_ranking(self.ranking)
            .with_notify_on_abort(self.commit.notify_on_abort)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [ranking]
            absolute_cutoff = 0.95

            [commit]
            notify_on_abort = true
            "#,
        )
        .unwrap();

        assert_eq!(config.ranking.absolute_cutoff, Some(0.95));
        assert_eq!(config.ranking.visible_percentile, 0.9);
        assert!(config.commit.notify_on_abort);
        assert!(!config.commit.default_fail_on_error);
        assert!(config.pipeline().notify_on_abort);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = EngineConfig::from_toml_str("[ranking]\nvisible_percentile = 1.5\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(ref msg) if msg.contains("visible_percentile")));
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("[ranking"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn toml_round_trip_through_file() {
        let config = EngineConfig::new()
            .with_ranking(RankingPolicy::new().with_min_score(0.2))
            .with_commit_policy(CommitPolicy {
                notify_on_abort: true,
                default_fail_on_error: true,
            });
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqtrace.toml");
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::load("/nonexistent/reqtrace.toml").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
