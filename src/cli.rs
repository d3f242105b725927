//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;

use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_MODEL};
use crate::gemini::GeminiConfig;

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "HOHO_DEBUG")]
    /// Enable debug logging. Env: HOHO_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "HOHO_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: HOHO_PORT
    pub port: NonZeroU16,
    #[clap(long, short, default_value = "127.0.0.1", env = "HOHO_LISTEN_ADDRESS")]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: HOHO_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(flatten)]
    /// Model connection settings
    pub model: ModelOptions,
    #[clap(long, default_value = "4", env = "HOHO_MAX_UPLOAD_MB")]
    /// Largest accepted photo, in megabytes.
    /// Env: HOHO_MAX_UPLOAD_MB
    pub max_upload_mb: usize,
}

impl CliOptions {
    /// Upload limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(clap::Args, Debug, Clone)]
/// Settings shared by every binary that talks to the model
pub struct ModelOptions {
    #[clap(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    /// API key for the Generative Language API. Needed for any call to the model.
    /// Env: GEMINI_API_KEY
    pub gemini_api_key: Option<String>,
    #[clap(long, default_value = DEFAULT_MODEL, env = "HOHO_MODEL")]
    /// Image model name.
    /// Env: HOHO_MODEL
    pub model: String,
    #[clap(long, default_value = DEFAULT_API_BASE_URL, env = "HOHO_API_BASE_URL")]
    /// API base URL.
    /// Env: HOHO_API_BASE_URL
    pub api_base_url: String,
}

/// No API key was given on the command line or in the environment.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MissingApiKey;

impl std::fmt::Display for MissingApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("No API key, set --gemini-api-key or GEMINI_API_KEY")
    }
}

impl std::error::Error for MissingApiKey {}

impl TryFrom<&ModelOptions> for GeminiConfig {
    type Error = MissingApiKey;

    fn try_from(options: &ModelOptions) -> Result<Self, Self::Error> {
        let api_key = options
            .gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(MissingApiKey)?;
        Ok(GeminiConfig {
            api_key: api_key.to_string(),
            model: options.model.clone(),
            base_url: options.api_base_url.trim_end_matches('/').to_string(),
        })
    }
}
