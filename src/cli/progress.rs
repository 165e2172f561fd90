//! Live step progress printed while a build runs

use std::time::Duration;

use colored::*;
use futures::future::join_all;
use tokio::task::JoinHandle;

use crate::pipeline::{BuildTask, TaskTracker};

/// Steps worth reporting for `tasks`: the plan (when enabled), then one
/// code generation step per file
pub fn build_steps(tasks: &[BuildTask], with_plan: bool) -> Vec<String> {
    let mut steps = Vec::with_capacity(tasks.len() + 1);
    if with_plan {
        steps.push("plan".to_string());
    }
    steps.extend(tasks.iter().map(|t| format!("code_gen_{}", t.task)));
    steps
}

/// Print each step as it completes
///
/// The steps are registered on `tracker` first so the build and the watcher
/// share the same events. The returned task resolves to the steps that
/// completed within `timeout`, in the order given. Abort it once the build
/// is over to stop waiting on steps that will never finish.
pub async fn watch_steps(
    tracker: &TaskTracker,
    steps: Vec<String>,
    timeout: Duration,
) -> JoinHandle<Vec<String>> {
    for step in &steps {
        tracker.create(step.as_str()).await;
    }

    let tracker = tracker.clone();
    tokio::spawn(async move {
        let waits = steps.into_iter().map(|step| {
            let tracker = tracker.clone();
            async move {
                match tracker.wait(&step, timeout).await {
                    Ok(()) => {
                        println!("  {} {}", "done".green().bold(), step.bright_black());
                        Some(step)
                    }
                    Err(e) => {
                        tracing::debug!(step = %step, error = %e, "Stopped watching step");
                        None
                    }
                }
            }
        });
        join_all(waits).await.into_iter().flatten().collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_steps() {
        let tasks = vec![BuildTask::new("app.py", ""), BuildTask::new("static/app.js", "")];
        assert_eq!(
            build_steps(&tasks, true),
            vec!["plan", "code_gen_app.py", "code_gen_static/app.js"]
        );
        assert_eq!(build_steps(&tasks, false).len(), 2);
    }

    #[tokio::test]
    async fn test_reports_completed_steps() {
        let tracker = TaskTracker::new();
        let watcher = watch_steps(
            &tracker,
            vec!["plan".into(), "code_gen_app.py".into(), "code_gen_broken.py".into()],
            Duration::from_millis(200),
        )
        .await;

        tracker.complete("code_gen_app.py").await;
        tracker.complete("plan").await;

        let done = watcher.await.unwrap();
        assert_eq!(done, vec!["plan", "code_gen_app.py"]);
        assert!(!tracker.is_complete("code_gen_broken.py").await);
    }

    #[tokio::test]
    async fn test_already_completed_step() {
        let tracker = TaskTracker::new();
        tracker.create("plan").await;
        tracker.complete("plan").await;

        let done = watch_steps(&tracker, vec!["plan".into()], Duration::from_millis(50))
            .await
            .await
            .unwrap();
        assert_eq!(done, vec!["plan"]);
    }
}
