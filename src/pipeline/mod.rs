//! Build pipelines
//!
//! Two drivers sit on top of the agent runtime:
//! - [`StandardBuild`] - generate a known list of files with a writer,
//!   optional reviewer, planner and test writer
//! - [`AdaptiveBuild`] - ask an ideation agent for the file list, then run
//!   the standard build on it
//!
//! Both screen and revise each component before writing it under the output
//! directory, and finish with a `build_report.json` summary.

pub mod adaptive;
pub mod checks;
pub mod config;
mod crew;
pub mod extract;
mod prompts;
pub mod report;
pub mod standard;
pub mod tracker;
pub mod versions;
pub mod waiter;

pub use adaptive::AdaptiveBuild;
pub use checks::{content_issues, safety_violations, screen};
pub use config::{BuildConfig, TaskCategory};
pub use extract::{extract_code, parse_task_list, BuildTask};
pub use report::{BuildReport, ComponentOutcome, ComponentReport, REPORT_FILE};
pub use standard::{resolve_output_path, test_file_name, StandardBuild};
pub use tracker::TaskTracker;
pub use versions::{FileVersion, VersionHistory, VersionOrigin};
pub use waiter::ReplyWaiter;
