use anyhow::Result;
use autoreg::RegistrationConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::env;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so stdout carries only progress lines and the record.
pub fn init_logging() -> Result<()> {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    Ok(())
}

/// Front ends pass the work directory base64-encoded so non-ASCII paths
/// survive argv. Anything that does not decode to UTF-8 is taken as-is.
pub fn decode_work_dir(raw: &str) -> PathBuf {
    match STANDARD.decode(raw.trim()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) if !decoded.is_empty() => PathBuf::from(decoded),
            _ => PathBuf::from(raw),
        },
        Err(_) => PathBuf::from(raw),
    }
}

pub fn load_config(path: Option<&Path>, webdriver_url: Option<String>) -> Result<RegistrationConfig> {
    let mut config = match path {
        Some(path) => RegistrationConfig::load(path)?,
        None => RegistrationConfig::default(),
    };
    if let Some(url) = webdriver_url {
        config.webdriver.url = url;
    }
    Ok(config)
}
