//! Build outcome per component and for the whole run

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::FrameworkResult;

use super::extract::BuildTask;

/// File name of the persisted summary
pub const REPORT_FILE: &str = "build_report.json";

/// What happened to one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentOutcome {
    Succeeded { path: PathBuf, bytes: usize },
    Failed { reason: String },
}

impl ComponentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ComponentOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentReport {
    /// Requested file
    pub task: String,

    #[serde(flatten)]
    pub outcome: ComponentOutcome,

    /// Reviewer feedback, when a review ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,

    /// Revision rounds the file went through after its first draft
    #[serde(default)]
    pub revisions: u32,
}

impl ComponentReport {
    pub fn failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            outcome: ComponentOutcome::Failed {
                reason: reason.into(),
            },
            review: None,
            revisions: 0,
        }
    }
}

/// Summary of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub description: String,
    pub output_dir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Task list produced by the ideation step (adaptive builds only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inferred_tasks: Vec<BuildTask>,

    pub components: Vec<ComponentReport>,

    /// Pipeline steps that finished, e.g. `code_gen_app.py`
    #[serde(default)]
    pub completed_steps: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn new(description: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            description: description.into(),
            output_dir: output_dir.into(),
            plan: None,
            inferred_tasks: Vec::new(),
            components: Vec::new(),
            completed_steps: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.components
            .iter()
            .filter(|c| c.outcome.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.components.len() - self.succeeded()
    }

    /// Every component succeeded
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Write `build_report.json` into `dir`
    pub fn save(&self, dir: &Path) -> FrameworkResult<PathBuf> {
        let path = dir.join(REPORT_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "Build report written");
        Ok(path)
    }

    pub fn load(path: &Path) -> FrameworkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = BuildReport::new("todo app", dir.path());
        report.components.push(ComponentReport {
            task: "app.py".into(),
            outcome: ComponentOutcome::Succeeded {
                path: dir.path().join("app.py"),
                bytes: 42,
            },
            review: Some("Looks fine".into()),
            revisions: 1,
        });
        report
            .components
            .push(ComponentReport::failed("../evil.py", "path escapes output directory"));

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());

        let path = report.save(dir.path()).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["components"][0]["status"], "succeeded");
        assert_eq!(json["components"][0]["bytes"], 42);
        assert_eq!(json["components"][0]["revisions"], 1);
        assert_eq!(json["components"][1]["status"], "failed");
        assert!(json.get("inferred_tasks").is_none());

        let loaded = BuildReport::load(&path).unwrap();
        assert_eq!(loaded.components, report.components);
    }
}
