use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::gemini::{DEFAULT_API_HOSTNAME, DEFAULT_MODEL};

/// Sessions nobody has touched for this long are ended.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_api_key: String,
    pub gemini_api_hostname: String,
    pub gemini_model: String,
    pub web_ui_path: String,
    pub session_idle_timeout: Duration,
}

impl AppConfig {
    /// Reads the config from environment variables. `GOOGLE_API_KEY` is
    /// required, everything else falls back to a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let google_api_key = lookup("GOOGLE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(anyhow!("Missing env var GOOGLE_API_KEY"))?;
        let gemini_api_hostname =
            lookup("DILEMMA_GEMINI_HOST").unwrap_or_else(|| DEFAULT_API_HOSTNAME.to_string());
        let gemini_model =
            lookup("DILEMMA_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let web_ui_path =
            lookup("DILEMMA_WEB_UI_PATH").unwrap_or_else(|| "./web-ui/src".to_string());
        let session_idle_secs = match lookup("DILEMMA_SESSION_IDLE_SECS") {
            Some(secs) => secs
                .trim()
                .parse::<u64>()
                .context("Invalid env var DILEMMA_SESSION_IDLE_SECS")?,
            None => DEFAULT_SESSION_IDLE_SECS,
        };

        Ok(Self {
            google_api_key,
            gemini_api_hostname,
            gemini_model,
            web_ui_path,
            session_idle_timeout: Duration::from_secs(session_idle_secs),
        })
    }
}
