//! Standard build: a fixed list of files, one agent per role
//!
//! For each task the code writer produces the file. The draft is screened
//! (safety and file-type checks) and, when enabled, reviewed; failed checks
//! and review feedback go back to the writer as revision requests, bounded
//! by `max_fix_attempts`. The test writer (when enabled) then produces a
//! matching test file. A component that fails is reported and the run moves
//! on to the next one.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::agent::AgentProfile;
use crate::core::{AgentId, FrameworkResult, MessageKind};
use crate::llm::CompletionProvider;

use super::checks;
use super::config::{BuildConfig, TaskCategory};
use super::crew::{specialist, Crew};
use super::extract::{extract_code, BuildTask};
use super::prompts;
use super::report::{BuildReport, ComponentOutcome, ComponentReport};
use super::tracker::TaskTracker;
use super::versions::{VersionHistory, VersionOrigin};

/// Identities of the specialists hired for one run
struct Roles {
    writer: AgentId,
    reviewer: Option<AgentId>,
    tester: Option<AgentId>,
}

/// Resolve a task's file name under the output directory
///
/// Absolute paths and `..` components are rejected so a model cannot write
/// outside the build directory.
pub fn resolve_output_path(root: &Path, file_name: &str) -> Result<PathBuf, String> {
    let trimmed = file_name.trim();
    let mut relative = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(format!("path '{}' escapes the output directory", trimmed));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(format!("invalid file name '{}'", file_name));
    }
    Ok(root.join(relative))
}

/// `src/app.py` -> `tests/src/test_app.py`
///
/// The source directory is kept so files sharing a name in different
/// directories get distinct test files.
pub fn test_file_name(file_name: &str) -> String {
    let path = Path::new(file_name.trim());
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("component");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("test_{}.{}", stem, ext),
        None => format!("test_{}", stem),
    };

    let mut test_path = PathBuf::from("tests");
    if let Some(parent) = path.parent() {
        for component in parent.components() {
            if let Component::Normal(part) = component {
                test_path.push(part);
            }
        }
    }
    test_path.push(name);
    test_path.to_string_lossy().replace('\\', "/")
}

/// Drop tasks that resolve to the same output path as an earlier task
fn unique_tasks(root: &Path, tasks: &[BuildTask]) -> Vec<BuildTask> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter(|task| match resolve_output_path(root, &task.task) {
            Ok(path) => {
                let fresh = seen.insert(path);
                if !fresh {
                    tracing::warn!(component = %task.task, "Duplicate task dropped");
                }
                fresh
            }
            // kept so the report records why it was rejected
            Err(_) => true,
        })
        .cloned()
        .collect()
}

/// Claim `path` for this run; a second claim is refused
fn claim(claimed: &mut HashSet<PathBuf>, file: &str, path: &Path) -> Result<(), String> {
    if claimed.insert(path.to_path_buf()) {
        Ok(())
    } else {
        Err(format!("would overwrite {} written earlier in this run", file))
    }
}

async fn write_component(path: &Path, code: &str) -> FrameworkResult<usize> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut body = code.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    tokio::fs::write(path, &body).await?;
    Ok(body.len())
}

pub struct StandardBuild {
    config: BuildConfig,
    provider: Arc<dyn CompletionProvider>,
    tracker: TaskTracker,
    versions: VersionHistory,
}

impl StandardBuild {
    pub fn new(config: BuildConfig, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            config,
            provider,
            tracker: TaskTracker::new(),
            versions: VersionHistory::new(),
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Step tracker for this build; clones observe progress from other tasks
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Every draft of every generated file
    pub fn versions(&self) -> &VersionHistory {
        &self.versions
    }

    /// Build every task and write `build_report.json` into the output directory
    pub async fn run(&self, tasks: &[BuildTask], description: &str) -> FrameworkResult<BuildReport> {
        let report = self.execute(tasks, description).await?;
        report.save(&self.config.output_dir)?;
        Ok(report)
    }

    pub(crate) async fn execute(
        &self,
        tasks: &[BuildTask],
        description: &str,
    ) -> FrameworkResult<BuildReport> {
        let root = self.config.output_dir.clone();
        tokio::fs::create_dir_all(&root).await?;
        let tasks = unique_tasks(&root, tasks);
        tracing::info!(output = %root.display(), components = tasks.len(), "Starting build");

        let mut report = BuildReport::new(description, &root);
        let mut crew = Crew::start(&self.config).await?;
        let roles = self.hire(&mut crew).await?;

        if self.config.generate_plan {
            report.plan = self.plan(&mut crew, &tasks, description).await;
        }

        let mut claimed = HashSet::new();
        for (idx, task) in tasks.iter().enumerate() {
            tracing::info!(component = %task.task, "Building component {}/{}", idx + 1, tasks.len());
            let components = self
                .build_component(&mut crew, &roles, task, &mut claimed)
                .await;
            for component in &components {
                match &component.outcome {
                    ComponentOutcome::Succeeded { path, bytes } => {
                        tracing::info!(component = %component.task, path = %path.display(), bytes, "Component written")
                    }
                    ComponentOutcome::Failed { reason } => {
                        tracing::warn!(component = %component.task, reason = %reason, "Component failed")
                    }
                }
            }
            report.components.extend(components);
        }

        crew.dismiss().await;

        report.completed_steps = self.tracker.completed().await;
        report.finished_at = Utc::now();
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Build finished"
        );
        Ok(report)
    }

    async fn hire(&self, crew: &mut Crew) -> FrameworkResult<Roles> {
        let config = &self.config;

        let writer = crew
            .hire(
                "CodeWriter",
                specialist(
                    config,
                    self.provider.clone(),
                    AgentProfile::code_writer(),
                    TaskCategory::CodeGeneration,
                    MessageKind::CodeRequest,
                    MessageKind::CodeResponse,
                ),
            )
            .await?;

        let reviewer = if config.review_code {
            let handler = specialist(
                config,
                self.provider.clone(),
                AgentProfile::code_reviewer(),
                TaskCategory::CodeReview,
                MessageKind::CodeReviewRequest,
                MessageKind::CodeReview,
            );
            Some(crew.hire("CodeReviewer", handler).await?)
        } else {
            None
        };

        let tester = if config.generate_tests {
            let handler = specialist(
                config,
                self.provider.clone(),
                AgentProfile::test_writer(),
                TaskCategory::TestGeneration,
                MessageKind::TestRequest,
                MessageKind::TestResponse,
            );
            Some(crew.hire("TestWriter", handler).await?)
        } else {
            None
        };

        Ok(Roles {
            writer,
            reviewer,
            tester,
        })
    }

    /// Ask a planner for a build plan; a failed plan does not stop the build
    async fn plan(&self, crew: &mut Crew, tasks: &[BuildTask], description: &str) -> Option<String> {
        let handler = specialist(
            &self.config,
            self.provider.clone(),
            AgentProfile::planner(),
            TaskCategory::Planning,
            MessageKind::PlanRequest,
            MessageKind::Plan,
        );
        let planner = match crew.hire("Planner", handler).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Could not start planner");
                return None;
            }
        };

        let step = "plan";
        self.tracker.create(step).await;
        match crew
            .ask(
                &planner,
                prompts::plan_prompt(description, tasks),
                MessageKind::PlanRequest,
                MessageKind::Plan,
                step,
            )
            .await
        {
            Ok(plan) => {
                self.tracker.complete(step).await;
                Some(plan)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Planning failed, continuing without a plan");
                None
            }
        }
    }

    async fn build_component(
        &self,
        crew: &mut Crew,
        roles: &Roles,
        task: &BuildTask,
        claimed: &mut HashSet<PathBuf>,
    ) -> Vec<ComponentReport> {
        let file = task.task.as_str();
        let path = match resolve_output_path(&self.config.output_dir, file) {
            Ok(path) => path,
            Err(reason) => return vec![ComponentReport::failed(file, reason)],
        };
        if let Err(reason) = claim(claimed, file, &path) {
            return vec![ComponentReport::failed(file, reason)];
        }

        let step = format!("code_gen_{}", file);
        self.tracker.create(&step).await;
        let raw = match crew
            .ask(
                &roles.writer,
                prompts::code_prompt(task),
                MessageKind::CodeRequest,
                MessageKind::CodeResponse,
                &step,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => return vec![ComponentReport::failed(file, e.to_string())],
        };
        self.tracker.complete(&step).await;

        let mut code = extract_code(file, &raw);
        self.versions.record(file, &code, VersionOrigin::Generated).await;

        let max_fixes = self.config.max_fix_attempts;
        let mut revisions = 0u32;
        let mut review_rounds = 0u32;
        let mut review = None;

        loop {
            let problems = checks::screen(file, &code);
            if !problems.is_empty() {
                let feedback = problems.join("; ");
                if revisions >= max_fixes {
                    let reason = format!("rejected after {} revision(s): {}", revisions, feedback);
                    return vec![ComponentReport::failed(file, reason)];
                }
                revisions += 1;
                tracing::warn!(file, problems = %feedback, round = revisions, "Generated code failed checks, requesting a revision");
                let revised = self
                    .revise(crew, &roles.writer, file, &code, &feedback, revisions)
                    .await;
                match revised {
                    Ok(revised) => {
                        code = revised;
                        self.versions.record(file, &code, VersionOrigin::CheckFix).await;
                        continue;
                    }
                    Err(e) => {
                        return vec![ComponentReport::failed(file, format!("revision failed: {}", e))];
                    }
                }
            }

            let Some(reviewer) = &roles.reviewer else {
                break;
            };
            let step = match review_rounds {
                0 => format!("review_{}", file),
                n => format!("review_{}_iter_{}", file, n),
            };
            review_rounds += 1;
            review = self.review(crew, reviewer, file, &code, &step).await;

            let feedback = match review.as_deref() {
                Some(text) if !prompts::is_approval(text) && revisions < max_fixes => text.to_string(),
                _ => break,
            };
            revisions += 1;
            tracing::info!(file, round = revisions, "Reviewer requested changes");
            let revised = self
                .revise(crew, &roles.writer, file, &code, &feedback, revisions)
                .await;
            match revised {
                Ok(revised) => {
                    code = revised;
                    self.versions.record(file, &code, VersionOrigin::ReviewFix).await;
                }
                Err(e) => {
                    tracing::warn!(file, error = %e, "Revision failed, keeping the reviewed code");
                    break;
                }
            }
        }

        let outcome = match write_component(&path, &code).await {
            Ok(bytes) => ComponentOutcome::Succeeded { path, bytes },
            Err(e) => ComponentOutcome::Failed {
                reason: format!("could not write {}: {}", file, e),
            },
        };
        let written = outcome.is_success();

        let mut components = vec![ComponentReport {
            task: task.task.clone(),
            outcome,
            review: review.clone(),
            revisions,
        }];

        if let (Some(tester), true) = (&roles.tester, written) {
            components.push(
                self.write_tests(crew, tester, file, &code, review.as_deref(), claimed)
                    .await,
            );
        }
        components
    }

    /// Send `feedback` back to the code writer and extract the new body
    async fn revise(
        &self,
        crew: &mut Crew,
        writer: &AgentId,
        file: &str,
        code: &str,
        feedback: &str,
        round: u32,
    ) -> FrameworkResult<String> {
        let step = format!("improve_{}_iter_{}", file, round);
        self.tracker.create(&step).await;
        let raw = crew
            .ask(
                writer,
                prompts::revise_prompt(file, code, feedback),
                MessageKind::CodeRequest,
                MessageKind::CodeResponse,
                &step,
            )
            .await?;
        self.tracker.complete(&step).await;
        Ok(extract_code(file, &raw))
    }

    async fn review(
        &self,
        crew: &mut Crew,
        reviewer: &AgentId,
        file: &str,
        code: &str,
        step: &str,
    ) -> Option<String> {
        self.tracker.create(step).await;
        match crew
            .ask(
                reviewer,
                prompts::review_prompt(file, code),
                MessageKind::CodeReviewRequest,
                MessageKind::CodeReview,
                step,
            )
            .await
        {
            Ok(review) => {
                self.tracker.complete(step).await;
                Some(review)
            }
            Err(e) => {
                tracing::warn!(file, error = %e, "Review failed, keeping unreviewed code");
                None
            }
        }
    }

    async fn write_tests(
        &self,
        crew: &mut Crew,
        tester: &AgentId,
        file: &str,
        code: &str,
        review: Option<&str>,
        claimed: &mut HashSet<PathBuf>,
    ) -> ComponentReport {
        let test_file = test_file_name(file);
        let path = match resolve_output_path(&self.config.output_dir, &test_file) {
            Ok(path) => path,
            Err(reason) => return ComponentReport::failed(test_file, reason),
        };
        if let Err(reason) = claim(claimed, &test_file, &path) {
            return ComponentReport::failed(test_file, reason);
        }

        let step = format!("test_gen_{}", file);
        self.tracker.create(&step).await;
        let raw = match crew
            .ask(
                tester,
                prompts::test_prompt(file, &test_file, code, review),
                MessageKind::TestRequest,
                MessageKind::TestResponse,
                &step,
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => return ComponentReport::failed(test_file, e.to_string()),
        };
        self.tracker.complete(&step).await;

        let tests = extract_code(&test_file, &raw);
        if tests.trim().is_empty() {
            return ComponentReport::failed(test_file, "model returned no tests");
        }
        let problems = checks::screen(&test_file, &tests);
        if !problems.is_empty() {
            return ComponentReport::failed(
                test_file,
                format!("generated tests rejected: {}", problems.join("; ")),
            );
        }
        self.versions
            .record(&test_file, &tests, VersionOrigin::Generated)
            .await;

        match write_component(&path, &tests).await {
            Ok(bytes) => ComponentReport {
                task: test_file,
                outcome: ComponentOutcome::Succeeded { path, bytes },
                review: None,
                revisions: 0,
            },
            Err(e) => ComponentReport::failed(test_file, format!("could not write tests: {}", e)),
        }
    }
}
