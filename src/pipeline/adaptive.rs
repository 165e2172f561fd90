//! Adaptive build: infer the file list from a product description first

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::AgentProfile;
use crate::core::{FrameworkError, FrameworkResult, MessageKind};
use crate::llm::CompletionProvider;

use super::config::{BuildConfig, TaskCategory};
use super::crew::{specialist, Crew};
use super::extract::{parse_task_list, BuildTask};
use super::prompts;
use super::report::BuildReport;
use super::standard::StandardBuild;

pub struct AdaptiveBuild {
    standard: StandardBuild,
    provider: Arc<dyn CompletionProvider>,
}

impl AdaptiveBuild {
    pub fn new(config: BuildConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            standard: StandardBuild::new(config, provider.clone()),
            provider,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        self.standard.config()
    }

    /// The standard build used once the task list is known
    pub fn standard(&self) -> &StandardBuild {
        &self.standard
    }

    /// Ask an ideation agent to break `description` into build tasks
    ///
    /// Duplicate file names are dropped and the list is cut to the configured
    /// maximum. An empty or unparseable list is an error.
    pub async fn infer_tasks(&self, description: &str) -> FrameworkResult<Vec<BuildTask>> {
        let config = self.config();
        let mut crew = Crew::start(config).await?;
        let architect = crew
            .hire(
                "ProductArchitect",
                specialist(
                    config,
                    self.provider.clone(),
                    AgentProfile::ideation(),
                    TaskCategory::Ideation,
                    MessageKind::InferTasksRequest,
                    MessageKind::InferTasksResponse,
                ),
            )
            .await?;

        let step = "infer_tasks";
        let tracker = self.standard.tracker();
        tracker.create(step).await;
        let reply = crew
            .ask(
                &architect,
                prompts::ideation_prompt(description, config.min_files, config.max_files),
                MessageKind::InferTasksRequest,
                MessageKind::InferTasksResponse,
                step,
            )
            .await;
        crew.dismiss().await;
        let reply = reply?;

        let mut seen = HashSet::new();
        let mut tasks: Vec<BuildTask> = parse_task_list(&reply)?
            .into_iter()
            .filter(|t| seen.insert(t.task.trim().to_string()))
            .collect();

        if tasks.is_empty() {
            return Err(FrameworkError::other("ideation returned an empty task list"));
        }
        if tasks.len() > config.max_files {
            tracing::warn!(
                proposed = tasks.len(),
                max = config.max_files,
                "Too many tasks proposed, keeping the first ones"
            );
            tasks.truncate(config.max_files);
        }
        if tasks.len() < config.min_files {
            tracing::warn!(
                proposed = tasks.len(),
                min = config.min_files,
                "Fewer tasks than requested"
            );
        }

        tracker.complete(step).await;
        tracing::info!(
            tasks = %tasks.iter().map(|t| t.task.as_str()).collect::<Vec<_>>().join(", "),
            "Inferred build tasks"
        );
        Ok(tasks)
    }

    /// Infer tasks, build them, and write `build_report.json`
    pub async fn run(&self, description: &str) -> FrameworkResult<BuildReport> {
        let tasks = self.infer_tasks(description).await?;
        self.build_inferred(tasks, description).await
    }

    /// Build a task list returned by [`Self::infer_tasks`]
    ///
    /// The tasks are recorded in the report as `inferred_tasks`.
    pub async fn build_inferred(
        &self,
        tasks: Vec<BuildTask>,
        description: &str,
    ) -> FrameworkResult<BuildReport> {
        let mut report = self.standard.execute(&tasks, description).await?;
        report.inferred_tasks = tasks;
        report.save(&self.config().output_dir)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionRequest, RetryPolicy, ScriptedProvider};
    use crate::pipeline::report::REPORT_FILE;
    use std::path::Path;
    use std::time::Duration;

    const TASKS: &str = r#"Here is the breakdown:
```json
[
  {"task": "app.py", "description": "Flask API", "priority": 1, "type": "backend"},
  {"task": "app.py", "description": "duplicate"},
  {"task": "templates/index.html", "description": "UI", "priority": 2, "type": "frontend"},
  {"task": "static/style.css", "description": "styles"}
]
```"#;

    fn architect(tasks: &'static str) -> ScriptedProvider {
        ScriptedProvider::new().with_responder(move |request: &CompletionRequest| {
            let prompt = request.last_user_text().unwrap_or_default();
            if prompt.starts_with("Analyze this product idea") {
                return Ok(tasks.to_string());
            }
            if let Some(rest) = prompt.strip_prefix("Write code for: ") {
                let file = rest.lines().next().unwrap_or_default();
                if file.ends_with(".html") {
                    return Ok(format!("<!DOCTYPE html>\n<html><!-- {} --></html>", file));
                }
                return Ok(format!("contents of {}", file));
            }
            Ok("ok".to_string())
        })
    }

    fn config(dir: &Path) -> BuildConfig {
        BuildConfig::new(dir)
            .with_retry(RetryPolicy::none())
            .with_plan(false)
            .with_review(false)
            .with_poll_interval(Duration::from_millis(20))
            .with_step_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_infer_dedupes_and_caps() {
        let dir = tempfile::tempdir().unwrap();
        let build = AdaptiveBuild::new(
            config(dir.path()).with_file_bounds(1, 2),
            Arc::new(architect(TASKS)),
        );

        let tasks = build.infer_tasks("A todo app").await.unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.task.as_str()).collect();
        assert_eq!(names, vec!["app.py", "templates/index.html"]);
        assert_eq!(tasks[0].description, "Flask API");
        assert!(build.standard().tracker().is_complete("infer_tasks").await);
    }

    #[tokio::test]
    async fn test_unparseable_ideation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let build = AdaptiveBuild::new(
            config(dir.path()),
            Arc::new(architect("I would rather not.")),
        );

        assert!(build.infer_tasks("anything").await.is_err());
        assert!(build.run("anything").await.is_err());
        assert!(!dir.path().join(REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_empty_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let build = AdaptiveBuild::new(config(dir.path()), Arc::new(architect("[]")));

        let err = build.infer_tasks("anything").await.unwrap_err();
        assert!(err.to_string().contains("empty task list"));
    }

    #[tokio::test]
    async fn test_run_builds_inferred_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let build = AdaptiveBuild::new(config(dir.path()), Arc::new(architect(TASKS)));

        let report = build.run("A todo app").await.unwrap();

        assert_eq!(report.inferred_tasks.len(), 3);
        assert_eq!(report.components.len(), 3);
        assert!(report.is_success());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("static/style.css")).unwrap(),
            "contents of static/style.css\n"
        );

        assert!(std::fs::read_to_string(dir.path().join("templates/index.html"))
            .unwrap()
            .starts_with("<!DOCTYPE html>"));

        let saved = BuildReport::load(&dir.path().join(REPORT_FILE)).unwrap();
        assert_eq!(saved.inferred_tasks, report.inferred_tasks);
        assert!(saved.completed_steps.contains(&"infer_tasks".to_string()));
    }
}
