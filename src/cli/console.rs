use colored::*;

use crate::pipeline::{BuildReport, BuildTask, ComponentOutcome};

/// Longest plan excerpt shown in the summary
const PLAN_PREVIEW_LINES: usize = 12;

/// Console handles terminal output with colored formatting
pub struct Console {
    heading_color: Color,
    success_color: Color,
    failure_color: Color,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self {
            heading_color: Color::BrightBlue,
            success_color: Color::Green,
            failure_color: Color::Red,
        }
    }

    /// Create a new Console with custom colors
    pub fn with_colors(heading_color: Color, success_color: Color, failure_color: Color) -> Self {
        Self {
            heading_color,
            success_color,
            failure_color,
        }
    }

    /// Print a banner naming what is about to be built
    pub fn print_banner(&self, title: &str, description: &str) {
        println!("{}", "=".repeat(60).color(self.heading_color));
        println!("{}", format!("  {}", title).color(self.heading_color).bold());
        println!("{}", "=".repeat(60).color(self.heading_color));
        println!("{} {}", "Project:".bold(), description);
        println!();
    }

    /// Print a system message (progress, info)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    /// Print an error message
    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".color(self.failure_color).bold(), error);
    }

    /// Print a separator line
    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    /// Print the task list a build will work through
    pub fn print_tasks(&self, tasks: &[BuildTask]) {
        println!("{}", "Tasks:".bold());
        for (idx, task) in tasks.iter().enumerate() {
            let kind = task
                .kind
                .as_deref()
                .map(|k| format!(" [{}]", k))
                .unwrap_or_default();
            println!(
                "  {}. {}{} {}",
                idx + 1,
                task.task.bold(),
                kind.bright_black(),
                task.description.bright_black()
            );
        }
        println!();
    }

    /// Print the end-of-run summary
    pub fn print_report(&self, report: &BuildReport) {
        self.print_separator();

        if let Some(plan) = &report.plan {
            println!("{}", "Plan:".bold());
            for line in plan.lines().take(PLAN_PREVIEW_LINES) {
                println!("  {}", line.bright_black());
            }
            if plan.lines().count() > PLAN_PREVIEW_LINES {
                println!("  {}", "...".bright_black());
            }
            println!();
        }

        for component in &report.components {
            match &component.outcome {
                ComponentOutcome::Succeeded { path, bytes } => println!(
                    "  {} {} {}",
                    "✓".color(self.success_color).bold(),
                    component.task,
                    format!("({} bytes, {})", bytes, path.display()).bright_black()
                ),
                ComponentOutcome::Failed { reason } => println!(
                    "  {} {} {}",
                    "✗".color(self.failure_color).bold(),
                    component.task,
                    reason.color(self.failure_color)
                ),
            }
            if let Some(review) = &component.review {
                let first = review.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
                println!("      {} {}", "review:".bright_black(), first.bright_black());
            }
            if component.revisions > 0 {
                println!(
                    "      {}",
                    format!("revised {} time(s)", component.revisions).bright_black()
                );
            }
        }

        println!();
        let elapsed = report.finished_at - report.started_at;
        let summary = format!(
            "{} succeeded, {} failed in {:.1}s",
            report.succeeded(),
            report.failed(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        if report.is_success() {
            println!("{}", summary.color(self.success_color).bold());
        } else {
            println!("{}", summary.color(self.failure_color).bold());
        }
        println!("{} {}", "Output:".bold(), report.output_dir.display());
    }
}
