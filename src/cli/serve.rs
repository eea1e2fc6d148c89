use anyhow::{Context, Result};

use crate::api;
use crate::core::AppConfig;

pub async fn run(host: String, port: String) -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load config")?;
    api::serve(host, port, config).await
}
