//! Runtime configuration
//!
//! [`Settings`] is read once by the binary and turned into a
//! [`crate::pipeline::BuildConfig`] plus a shared completion provider.

pub mod settings;

pub use settings::{
    ApiKeys, BuildSettings, DefaultModels, ProviderKind, Settings, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
