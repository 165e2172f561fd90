//! Settings loaded from `config.json` plus environment overrides
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! After the file is read, variables named
//! `BUILD_MY_STARTUP_<SECTION>_<KEY>` override individual keys, e.g.
//! `BUILD_MY_STARTUP_BUILD_SETTINGS_MAX_FIX_ATTEMPTS=5` or
//! `BUILD_MY_STARTUP_DEFAULT_MODELS_PLANNING=gpt-4o`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::RetentionPolicy;
use crate::core::{FrameworkError, FrameworkResult};
use crate::llm::{
    AnthropicProvider, AuthConfig, CompletionProvider, FallbackProvider, OfflineProvider,
    OpenAiProvider,
};

/// Prefix of override variables
pub const ENV_PREFIX: &str = "BUILD_MY_STARTUP_";

/// Default settings file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

// ============================================================================
// Sections
// ============================================================================

/// Provider credentials stored in the file (environment variables win)
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("anthropic", &mask(&self.anthropic))
            .finish()
    }
}

/// Model per task category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultModels {
    pub code_generation: String,
    pub code_review: String,
    pub test_generation: String,
    pub planning: String,
    pub ideation: String,
}

impl Default for DefaultModels {
    fn default() -> Self {
        Self {
            code_generation: "gpt-4o-mini".to_string(),
            code_review: "gpt-4o-mini".to_string(),
            test_generation: "gpt-4o-mini".to_string(),
            planning: "gpt-4o".to_string(),
            ideation: "gpt-4o".to_string(),
        }
    }
}

/// Knobs shared by the build pipelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Completion attempts per request
    pub max_retries: u32,
    /// Revision rounds per generated file (safety, content checks, review)
    pub max_fix_attempts: u32,
    /// Per-step wait budget
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub temperature: f32,
    pub generate_plan: bool,
    pub review_code: bool,
    pub generate_tests: bool,
    /// Turns of history each AI agent keeps; `None` keeps everything
    pub history_max_turns: Option<usize>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_fix_attempts: 3,
            timeout_secs: 600,
            poll_interval_ms: 500,
            temperature: 0.7,
            generate_plan: true,
            review_code: true,
            generate_tests: false,
            history_max_turns: Some(10),
        }
    }
}

impl BuildSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.history_max_turns
            .map(RetentionPolicy::MaxTurns)
            .unwrap_or_default()
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Hosted completion service to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding this provider's key
    pub fn key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn base_url_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_BASE_URL",
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
        }
    }

    fn other(&self) -> Self {
        match self {
            ProviderKind::OpenAi => ProviderKind::Anthropic,
            ProviderKind::Anthropic => ProviderKind::OpenAi,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(FrameworkError::InvalidConfig(format!(
                "unknown provider '{}' (expected openai or anthropic)",
                other
            ))),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_keys: ApiKeys,
    pub default_models: DefaultModels,
    pub build_settings: BuildSettings,
}

impl Settings {
    /// Load from `path` and apply overrides from the process environment
    ///
    /// A missing file yields defaults; a malformed one is an error.
    pub fn load(path: impl AsRef<Path>) -> FrameworkResult<Self> {
        Self::load_with_env(path, std::env::vars())
    }

    /// Load from `path` and apply overrides from `vars`
    pub fn load_with_env<I>(path: impl AsRef<Path>, vars: I) -> FrameworkResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let path = path.as_ref();
        let mut settings = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            let settings = Self::from_json_str(&text).map_err(|e| {
                FrameworkError::InvalidConfig(format!("{}: {}", path.display(), e))
            })?;
            tracing::info!(path = %path.display(), "Configuration loaded");
            settings
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Self::default()
        };

        settings.apply_overrides(vars)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_str(text: &str) -> FrameworkResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply `BUILD_MY_STARTUP_<SECTION>_<KEY>` overrides
    ///
    /// Values are parsed as JSON when possible, then as booleans, and
    /// otherwise taken as strings. Unknown keys are ignored with a warning.
    pub fn apply_overrides<I>(&mut self, vars: I) -> FrameworkResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut tree = serde_json::to_value(&*self)?;
        let mut applied = 0;

        let Value::Object(sections) = &mut tree else {
            return Err(FrameworkError::other("settings did not serialize to an object"));
        };

        for (name, raw) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let rest = rest.to_ascii_lowercase();

            let target = sections.iter_mut().find_map(|(section, body)| {
                let key = rest.strip_prefix(section.as_str())?.strip_prefix('_')?;
                let is_key_section = section == "api_keys";
                body.as_object_mut()?
                    .get_mut(key)
                    .map(|slot| (slot, is_key_section))
            });

            match target {
                Some((slot, is_key_section)) => {
                    *slot = parse_override(&raw, slot, is_key_section);
                    applied += 1;
                }
                None => tracing::warn!(variable = %name, "Ignoring unknown config override"),
            }
        }

        if applied > 0 {
            *self = serde_json::from_value(tree).map_err(|e| {
                FrameworkError::InvalidConfig(format!("environment override: {}", e))
            })?;
            tracing::debug!(count = applied, "Applied config overrides");
        }
        Ok(())
    }

    /// Reject values no pipeline can run with
    pub fn validate(&self) -> FrameworkResult<()> {
        if self.build_settings.max_retries == 0 {
            return Err(FrameworkError::InvalidConfig(
                "build_settings.max_retries must be a positive integer".to_string(),
            ));
        }
        if self.build_settings.timeout_secs == 0 {
            return Err(FrameworkError::InvalidConfig(
                "build_settings.timeout_secs must be positive".to_string(),
            ));
        }
        let models = &self.default_models;
        for (category, model) in [
            ("code_generation", &models.code_generation),
            ("code_review", &models.code_review),
            ("test_generation", &models.test_generation),
            ("planning", &models.planning),
            ("ideation", &models.ideation),
        ] {
            if model.trim().is_empty() {
                return Err(FrameworkError::InvalidConfig(format!(
                    "no model configured for {}",
                    category
                )));
            }
        }
        Ok(())
    }

    /// API key for `provider`: environment first, then the file
    pub fn api_key(&self, provider: ProviderKind) -> Option<String> {
        let from_file = match provider {
            ProviderKind::OpenAi => self.api_keys.openai.as_ref(),
            ProviderKind::Anthropic => self.api_keys.anthropic.as_ref(),
        };
        std::env::var(provider.key_var())
            .ok()
            .or_else(|| from_file.cloned())
            .filter(|key| !key.trim().is_empty())
    }

    /// Build the completion provider the agents will share
    ///
    /// The preferred provider is primary; when the other one also has a
    /// key it becomes the fallback. Without any key the offline provider is
    /// used.
    pub fn completion_provider(&self, preferred: ProviderKind) -> Arc<dyn CompletionProvider> {
        let primary = self.hosted_provider(preferred);
        let secondary = self.hosted_provider(preferred.other());

        match (primary, secondary) {
            (Some(primary), Some(secondary)) => Arc::new(FallbackProvider::new(primary, secondary)),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => {
                tracing::warn!("No API key configured, using offline mock responses");
                Arc::new(OfflineProvider::new())
            }
        }
    }

    fn hosted_provider(&self, kind: ProviderKind) -> Option<Arc<dyn CompletionProvider>> {
        let key = self.api_key(kind)?;
        let auth = match std::env::var(kind.base_url_var()).ok().filter(|u| !u.is_empty()) {
            Some(base_url) => AuthConfig::with_base_url(key, base_url),
            None => AuthConfig::new(key),
        };
        let provider: Arc<dyn CompletionProvider> = match kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(auth)),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(auth)),
        };
        Some(provider)
    }
}

fn parse_override(raw: &str, current: &Value, verbatim: bool) -> Value {
    if verbatim || current.is_string() {
        return Value::String(raw.to_string());
    }
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.build_settings.max_retries, 3);
        assert_eq!(settings.build_settings.max_fix_attempts, 3);
        assert_eq!(settings.build_settings.timeout(), Duration::from_secs(600));
        assert_eq!(settings.default_models.planning, "gpt-4o");
        assert_eq!(settings.default_models.code_generation, "gpt-4o-mini");
        assert_eq!(settings.build_settings.retention(), RetentionPolicy::MaxTurns(10));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_models": {{"code_review": "claude-sonnet-4-5"}}, "build_settings": {{"review_code": false}}}}"#
        )
        .unwrap();

        let settings = Settings::load_with_env(file.path(), Vec::new()).unwrap();
        assert_eq!(settings.default_models.code_review, "claude-sonnet-4-5");
        assert_eq!(settings.default_models.code_generation, "gpt-4o-mini");
        assert!(!settings.build_settings.review_code);
        assert!(settings.build_settings.generate_plan);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_with_env(dir.path().join("config.json"), Vec::new()).unwrap();
        assert_eq!(settings.build_settings.poll_interval_ms, 500);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Settings::load_with_env(file.path(), Vec::new()).unwrap_err();
        assert!(matches!(err, FrameworkError::InvalidConfig(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(vars(&[
                ("BUILD_MY_STARTUP_BUILD_SETTINGS_MAX_FIX_ATTEMPTS", "5"),
                ("BUILD_MY_STARTUP_BUILD_SETTINGS_GENERATE_PLAN", "False"),
                ("BUILD_MY_STARTUP_BUILD_SETTINGS_TEMPERATURE", "0.2"),
                ("BUILD_MY_STARTUP_BUILD_SETTINGS_HISTORY_MAX_TURNS", "null"),
                ("BUILD_MY_STARTUP_DEFAULT_MODELS_PLANNING", "o1"),
                ("BUILD_MY_STARTUP_API_KEYS_OPENAI", "sk-test"),
                ("BUILD_MY_STARTUP_NOPE_FIELD", "x"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();

        assert_eq!(settings.build_settings.max_fix_attempts, 5);
        assert!(!settings.build_settings.generate_plan);
        assert!((settings.build_settings.temperature - 0.2).abs() < 1e-6);
        assert_eq!(settings.build_settings.history_max_turns, None);
        assert_eq!(settings.default_models.planning, "o1");
        assert_eq!(settings.api_keys.openai.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_numeric_looking_string_stays_string() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(vars(&[("BUILD_MY_STARTUP_DEFAULT_MODELS_IDEATION", "4")]))
            .unwrap();
        assert_eq!(settings.default_models.ideation, "4");
    }

    #[test]
    fn test_bad_override_type_is_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(vars(&[("BUILD_MY_STARTUP_BUILD_SETTINGS_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, FrameworkError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"build_settings": {{"max_retries": 0}}}}"#).unwrap();
        assert!(Settings::load_with_env(file.path(), Vec::new()).is_err());

        // zero revision rounds only disables the fix loop
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"build_settings": {{"max_fix_attempts": 0}}}}"#).unwrap();
        let settings = Settings::load_with_env(file.path(), Vec::new()).unwrap();
        assert_eq!(settings.build_settings.max_fix_attempts, 0);
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("gemini".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_api_keys_debug_redacted() {
        let keys = ApiKeys {
            openai: Some("sk-secret".into()),
            anthropic: None,
        };
        let printed = format!("{:?}", keys);
        assert!(!printed.contains("sk-secret"));
    }
}
