//! Per-file version history for one build
//!
//! Every body a file takes during a run (first draft, each revision) is kept
//! in order, so the report can say how many rounds a file went through and
//! callers can look back at earlier drafts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Where a recorded body came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    Generated,
    /// Revised after failing safety or content checks
    CheckFix,
    /// Revised after reviewer feedback
    ReviewFix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileVersion {
    /// 1-based
    pub version: usize,
    pub code: String,
    pub origin: VersionOrigin,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Default)]
pub struct VersionHistory {
    files: Arc<RwLock<HashMap<String, Vec<FileVersion>>>>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body for `file` and return its version number
    pub async fn record(&self, file: &str, code: &str, origin: VersionOrigin) -> usize {
        let mut files = self.files.write().await;
        let versions = files.entry(file.to_string()).or_default();
        let version = versions.len() + 1;
        versions.push(FileVersion {
            version,
            code: code.to_string(),
            origin,
            recorded_at: Utc::now(),
        });
        tracing::debug!(file, version, "Recorded file version");
        version
    }

    /// Every recorded body for `file`, oldest first
    pub async fn versions(&self, file: &str) -> Vec<FileVersion> {
        self.files
            .read()
            .await
            .get(file)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn latest(&self, file: &str) -> Option<FileVersion> {
        self.files
            .read()
            .await
            .get(file)
            .and_then(|versions| versions.last().cloned())
    }

    /// Files with at least one recorded version, sorted
    pub async fn files(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_versions_accumulate_in_order() {
        let history = VersionHistory::new();
        assert_eq!(history.record("app.py", "v1", VersionOrigin::Generated).await, 1);
        assert_eq!(history.record("app.py", "v2", VersionOrigin::ReviewFix).await, 2);
        history.record("static/app.js", "js", VersionOrigin::Generated).await;

        let versions = history.versions("app.py").await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].code, "v1");
        assert_eq!(versions[1].origin, VersionOrigin::ReviewFix);

        let latest = history.latest("app.py").await.unwrap();
        assert_eq!((latest.version, latest.code.as_str()), (2, "v2"));
        assert_eq!(history.files().await, vec!["app.py", "static/app.js"]);
    }

    #[tokio::test]
    async fn test_unknown_file() {
        let history = VersionHistory::new();
        assert!(history.versions("missing.py").await.is_empty());
        assert!(history.latest("missing.py").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_history() {
        let history = VersionHistory::new();
        let observer = history.clone();
        history.record("app.py", "print(1)", VersionOrigin::Generated).await;
        assert_eq!(observer.versions("app.py").await.len(), 1);
    }
}
