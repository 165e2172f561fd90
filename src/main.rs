//! build-my-startup - turn a product description into generated source files
//!
//! # Configuration
//!
//! Settings are read from `config.json` (or `--config`), then overridden by
//! `BUILD_MY_STARTUP_<SECTION>_<KEY>` environment variables. API keys come
//! from `OPENAI_API_KEY` / `ANTHROPIC_API_KEY` when set. Without any key the
//! offline provider answers with mock responses.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use build_my_startup::cli::{build_steps, watch_steps, Console};
use build_my_startup::config::{ProviderKind, Settings, DEFAULT_CONFIG_FILE};
use build_my_startup::llm::{CompletionProvider, OfflineProvider};
use build_my_startup::logging;
use build_my_startup::pipeline::{AdaptiveBuild, BuildConfig, BuildReport, BuildTask, StandardBuild};

#[derive(Parser, Debug)]
#[command(name = "build-my-startup")]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Preferred completion service (openai, anthropic)
    #[arg(long, global = true)]
    provider: Option<ProviderKind>,

    /// Use mock responses instead of a hosted model
    #[arg(long, global = true)]
    offline: bool,

    /// Directory for the rolling JSON log
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Skip the code review step
    #[arg(long, global = true)]
    no_review: bool,

    /// Skip the planning step
    #[arg(long, global = true)]
    no_plan: bool,

    /// Generate a test file for each component
    #[arg(long, global = true)]
    tests: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer the file list from a description, then build it
    Build {
        /// What the product should do
        description: String,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Fewest files to ask for
        #[arg(long, default_value_t = 2)]
        min_files: usize,

        /// Most files to build
        #[arg(long, default_value_t = 10)]
        max_files: usize,
    },

    /// Build an explicit list of files
    Files {
        /// What the product should do
        description: String,

        /// A file to build, as `path=description`
        #[arg(short, long = "task", value_parser = parse_task)]
        tasks: Vec<BuildTask>,

        /// JSON file holding a task list
        #[arg(long)]
        tasks_file: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },
}

fn parse_task(raw: &str) -> std::result::Result<BuildTask, String> {
    match raw.split_once('=') {
        Some((file, description)) if !file.trim().is_empty() => {
            Ok(BuildTask::new(file.trim(), description.trim()))
        }
        _ => Err(format!("expected path=description, got '{}'", raw)),
    }
}

fn provider(args: &Args, settings: &Settings) -> Arc<dyn CompletionProvider> {
    if args.offline {
        tracing::info!("Offline mode, using mock responses");
        return Arc::new(OfflineProvider::new());
    }
    let preferred = args.provider.unwrap_or_default();
    let provider = settings.completion_provider(preferred);
    tracing::info!(provider = provider.provider_name(), "Completion provider ready");
    provider
}

fn build_config(args: &Args, settings: &Settings, output: &Path) -> BuildConfig {
    let mut config = BuildConfig::from_settings(settings, output);
    if args.no_review {
        config = config.with_review(false);
    }
    if args.no_plan {
        config = config.with_plan(false);
    }
    if args.tests {
        config = config.with_tests(true);
    }
    config
}

/// Upper bound on how long the progress display waits for any step
fn watch_timeout(config: &BuildConfig, tasks: usize) -> Duration {
    let rounds = (tasks as u32 + 1).saturating_mul(config.max_fix_attempts + 2);
    config.step_timeout.saturating_mul(rounds)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _guard = logging::init_logging(Some(args.log_dir.as_path()))?;
    tracing::info!("=== build-my-startup starting ===");

    let settings = Settings::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let provider = provider(&args, &settings);
    let console = Console::new();

    let report: BuildReport = match &args.command {
        Command::Build {
            description,
            output,
            min_files,
            max_files,
        } => {
            let config = build_config(&args, &settings, output).with_file_bounds(*min_files, *max_files);
            console.print_banner("Build My Startup: adaptive build", description);

            let build = AdaptiveBuild::new(config, provider);
            let tasks = build.infer_tasks(description).await?;
            console.print_tasks(&tasks);

            let config = build.config();
            let watcher = watch_steps(
                build.standard().tracker(),
                build_steps(&tasks, config.generate_plan),
                watch_timeout(config, tasks.len()),
            )
            .await;
            let report = build.build_inferred(tasks, description).await;
            watcher.abort();
            report?
        }
        Command::Files {
            description,
            tasks,
            tasks_file,
            output,
        } => {
            let mut tasks = tasks.clone();
            if let Some(path) = tasks_file {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                tasks.extend(build_my_startup::pipeline::parse_task_list(&text)?);
            }
            if tasks.is_empty() {
                bail!("no tasks given; use --task path=description or --tasks-file");
            }

            let config = build_config(&args, &settings, output);
            console.print_banner("Build My Startup: standard build", description);
            console.print_tasks(&tasks);

            let watcher_timeout = watch_timeout(&config, tasks.len());
            let build = StandardBuild::new(config, provider);
            let watcher = watch_steps(
                build.tracker(),
                build_steps(&tasks, build.config().generate_plan),
                watcher_timeout,
            )
            .await;
            let report = build.run(&tasks, description).await;
            watcher.abort();
            report?
        }
    };

    console.print_report(&report);
    tracing::info!("=== build-my-startup finished ===");

    if !report.is_success() {
        bail!("{} component(s) failed", report.failed());
    }
    Ok(())
}
