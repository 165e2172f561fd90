//! Build pipeline configuration
//!
//! ```ignore
//! let config = BuildConfig::new("./output/todo")
//!     .with_step_timeout(Duration::from_secs(120))
//!     .with_retry(RetryPolicy::default().with_max_attempts(5))
//!     .with_review(false);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentProfile;
use crate::config::{DefaultModels, Settings};
use crate::conversation::RetentionPolicy;
use crate::llm::RetryPolicy;

/// Which configured model a pipeline agent uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    CodeGeneration,
    CodeReview,
    TestGeneration,
    Planning,
    Ideation,
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory generated files are written under
    pub output_dir: PathBuf,

    /// How long to wait for any single agent reply
    pub step_timeout: Duration,

    /// Progress logging cadence while waiting
    pub poll_interval: Duration,

    /// Retry policy for every completion call
    pub retry: RetryPolicy,

    /// Revision rounds per file driven by content checks and review feedback
    pub max_fix_attempts: u32,

    /// Model per task category
    pub models: DefaultModels,

    pub temperature: f32,

    /// Ask the planner for a plan before building
    pub generate_plan: bool,

    /// Send each generated file to the reviewer
    pub review_code: bool,

    /// Ask the test writer for a test file per generated component
    pub generate_tests: bool,

    /// History kept by each AI agent
    pub retention: RetentionPolicy,

    /// Bounds on the number of files ideation may propose
    pub min_files: usize,
    pub max_files: usize,
}

impl BuildConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            step_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            max_fix_attempts: 3,
            models: DefaultModels::default(),
            temperature: 0.7,
            generate_plan: true,
            review_code: true,
            generate_tests: false,
            retention: RetentionPolicy::MaxTurns(10),
            min_files: 2,
            max_files: 10,
        }
    }

    /// Derive a config from loaded settings
    pub fn from_settings(settings: &Settings, output_dir: impl Into<PathBuf>) -> Self {
        let build = &settings.build_settings;
        Self {
            step_timeout: build.timeout(),
            poll_interval: build.poll_interval(),
            retry: RetryPolicy::default().with_max_attempts(build.max_retries),
            max_fix_attempts: build.max_fix_attempts,
            models: settings.default_models.clone(),
            temperature: build.temperature,
            generate_plan: build.generate_plan,
            review_code: build.review_code,
            generate_tests: build.generate_tests,
            retention: build.retention(),
            ..Self::new(output_dir)
        }
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_fix_attempts = attempts;
        self
    }

    pub fn with_models(mut self, models: DefaultModels) -> Self {
        self.models = models;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_plan(mut self, enabled: bool) -> Self {
        self.generate_plan = enabled;
        self
    }

    pub fn with_review(mut self, enabled: bool) -> Self {
        self.review_code = enabled;
        self
    }

    pub fn with_tests(mut self, enabled: bool) -> Self {
        self.generate_tests = enabled;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Bounds on the ideation task list
    pub fn with_file_bounds(mut self, min_files: usize, max_files: usize) -> Self {
        self.min_files = min_files.max(1);
        self.max_files = max_files.max(self.min_files);
        self
    }

    pub fn model_for(&self, category: TaskCategory) -> &str {
        let models = &self.models;
        match category {
            TaskCategory::CodeGeneration => &models.code_generation,
            TaskCategory::CodeReview => &models.code_review,
            TaskCategory::TestGeneration => &models.test_generation,
            TaskCategory::Planning => &models.planning,
            TaskCategory::Ideation => &models.ideation,
        }
    }

    /// Apply this run's model and temperature to a profile
    pub fn profile(&self, base: AgentProfile, category: TaskCategory) -> AgentProfile {
        base.with_model(self.model_for(category))
            .with_temperature(self.temperature)
    }
}
