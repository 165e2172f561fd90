//! Credentials for the hosted completion APIs

use std::env;

use anyhow::{Context, Result};

/// Authentication configuration for API requests
#[derive(Clone)]
pub struct AuthConfig {
    /// API key or token for authentication
    pub api_key: String,
    /// Optional custom base URL (overrides default API endpoint)
    pub base_url: Option<String>,
}

impl AuthConfig {
    /// Create a new auth config with just an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    /// Create a new auth config with API key and custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Some(base_url.into()),
        }
    }

    /// Read the key (required) and base URL (optional) from the environment
    pub fn from_env(key_var: &str, base_url_var: &str) -> Result<Self> {
        let api_key = env::var(key_var)
            .with_context(|| format!("{} environment variable not set", key_var))?;
        if api_key.trim().is_empty() {
            anyhow::bail!("{} environment variable is empty", key_var);
        }

        Ok(Self {
            api_key,
            base_url: env::var(base_url_var).ok().filter(|s| !s.is_empty()),
        })
    }

    /// Base URL to use, falling back to the provider default
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default).trim_end_matches('/')
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
