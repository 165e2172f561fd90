//! Agent profiles
//!
//! A profile is the role-specific part of an AI-backed agent: the system
//! prompt plus the model parameters every completion call uses.
//!
//! ```ignore
//! let profile = AgentProfile::code_reviewer()
//!     .with_model("gpt-4o")
//!     .with_temperature(0.2);
//! ```

use serde::{Deserialize, Serialize};

use crate::llm::DEFAULT_MAX_TOKENS;

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature used when nothing else is configured
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Role, system prompt and model parameters of an AI-backed agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Short role label used in logs ("developer", "code_reviewer")
    pub role: String,

    /// System prompt sent with every request
    pub system_prompt: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,

    /// Cap on generated tokens
    pub max_tokens: u32,
}

impl AgentProfile {
    /// Create a profile with an explicit system prompt
    pub fn new(role: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            system_prompt: system_prompt.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Generic assistant for `role`
    pub fn assistant(role: impl Into<String>) -> Self {
        let role = role.into();
        let prompt = format!("You are a helpful {} agent.", role);
        Self::new(role, prompt)
    }

    pub fn code_writer() -> Self {
        Self::new(
            "developer",
            "You are an expert software developer. Write clean, efficient, well-documented code. \
             Follow best practices and coding standards.",
        )
    }

    pub fn code_reviewer() -> Self {
        Self::new(
            "code_reviewer",
            "You are an expert code reviewer. Review code carefully, identify bugs, suggest \
             improvements, and check for best practices. Provide clear, actionable feedback.",
        )
    }

    pub fn test_writer() -> Self {
        Self::new(
            "qa_engineer",
            "You are an expert QA engineer. Write comprehensive test cases, including edge cases \
             and error handling.",
        )
    }

    pub fn planner() -> Self {
        Self::new(
            "planner",
            "You are an expert project planner. Generate comprehensive markdown plans with \
             objectives, milestones, agent assignments and methodologies. Create clear, \
             actionable plans that coordinate multiple agents working together.",
        )
    }

    /// Breaks a product idea down into files to build
    pub fn ideation() -> Self {
        Self::new(
            "product_architect",
            "You are an expert startup architect and product designer. Given a high-level product \
             description, you break it down into concrete technical components, files, and \
             implementation tasks. You identify what needs to be built, which technologies to use, \
             and provide a detailed description for each component.",
        )
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Let the provider pick its default temperature
    pub fn without_temperature(mut self) -> Self {
        self.temperature = None;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self::assistant("assistant")
    }
}
