//! File-based verification code handoff.
//!
//! A separate process delivers the code by writing the code file, or aborts
//! by writing the cancel file. Both live in a shared directory at fixed names,
//! so only one registration may wait at a time.

use crate::config::HandoffConfig;
use crate::errors::{HandoffError, OutputClosed};
use crate::messages::MessageKey;
use crate::reporter::CompletionReporter;
use crate::timing::sleep_or_cancel;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::json;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const CODE_LENGTH: usize = 6;
pub const CANCEL_KEYWORD: &str = "cancel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeResult {
    Code(String),
    Cancelled,
    TimedOut,
    Invalid(String),
}

impl CodeResult {
    /// The code, or the handoff error that ended the wait.
    pub fn into_code(self, timeout: Duration) -> Result<String, HandoffError> {
        match self {
            CodeResult::Code(code) => Ok(code),
            CodeResult::Cancelled => Err(HandoffError::Cancelled),
            CodeResult::TimedOut => Err(HandoffError::TimedOut(timeout)),
            CodeResult::Invalid(reason) => Err(HandoffError::Invalid(reason)),
        }
    }
}

/// Classify trimmed code file content.
pub fn classify_code(content: &str) -> CodeResult {
    let content = content.trim();
    if is_valid_code(content) {
        CodeResult::Code(content.to_string())
    } else if content.eq_ignore_ascii_case(CANCEL_KEYWORD) {
        CodeResult::Cancelled
    } else {
        CodeResult::Invalid(content.to_string())
    }
}

pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

/// Anything that can hand the signup flow a verification code.
#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn verification_code(&self) -> Result<CodeResult, OutputClosed>;

    /// Wait budget, used to describe a timeout.
    fn timeout(&self) -> Duration;
}

pub struct VerificationHandoff<'a> {
    code_path: PathBuf,
    cancel_path: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
    progress_interval: Duration,
    reporter: &'a CompletionReporter,
    cancel: CancellationToken,
}

impl<'a> VerificationHandoff<'a> {
    pub fn new(
        config: &HandoffConfig,
        reporter: &'a CompletionReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            code_path: config.code_path(),
            cancel_path: config.cancel_path(),
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            progress_interval: config.progress_interval,
            reporter,
            cancel,
        }
    }

    pub fn code_path(&self) -> &Path {
        &self.code_path
    }

    pub fn cancel_path(&self) -> &Path {
        &self.cancel_path
    }

    /// Remove marker files left by an earlier attempt.
    pub fn purge_stale(&self) {
        for path in [&self.code_path, &self.cancel_path] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed stale marker {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove stale marker {}: {}", path.display(), e),
            }
        }
    }

    /// Wait for the code or cancel file. Cancel wins when both are present.
    #[instrument(skip(self), fields(code_file = %self.code_path.display()))]
    pub async fn await_code(&self, timeout: Duration) -> Result<CodeResult, OutputClosed> {
        self.purge_stale();

        let message = self.reporter.render(
            MessageKey::WaitingForCode,
            &[("path", &self.code_path.display())],
        );
        self.reporter.event(&json!({
            "action": "request_verification_code",
            "message": message,
            "status": "waiting_for_code",
        }))?;
        info!("Waiting up to {:?} for verification code", timeout);

        let start = Instant::now();
        let deadline = start + timeout;
        let mut next_progress = start + self.progress_interval;

        loop {
            if self.cancel_path.exists() {
                remove_quietly(&self.cancel_path);
                info!("Cancel marker found");
                self.reporter.progress(MessageKey::CodeCancelled, &[])?;
                return Ok(CodeResult::Cancelled);
            }

            if self.code_path.exists() {
                let result = match fs::read_to_string(&self.code_path) {
                    Ok(content) => classify_code(&content),
                    Err(e) => CodeResult::Invalid(e.to_string()),
                };
                remove_quietly(&self.code_path);
                match &result {
                    CodeResult::Code(_) => {
                        info!("Verification code received");
                        self.reporter.progress(MessageKey::CodeReceived, &[])?;
                    }
                    CodeResult::Cancelled => {
                        self.reporter.progress(MessageKey::CodeCancelled, &[])?;
                    }
                    CodeResult::Invalid(content) => {
                        warn!("Invalid verification code content: {:?}", content);
                        self.reporter
                            .progress(MessageKey::CodeInvalid, &[("content", content)])?;
                    }
                    CodeResult::TimedOut => {}
                }
                return Ok(result);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("No verification code after {:?}", timeout);
                self.reporter.progress(
                    MessageKey::CodeTimedOut,
                    &[("timeout", &timeout.as_secs())],
                )?;
                return Ok(CodeResult::TimedOut);
            }

            if now >= next_progress {
                let remaining = deadline.saturating_duration_since(now).as_secs();
                self.reporter.progress(
                    MessageKey::CodeStillWaiting,
                    &[("remaining", &remaining)],
                )?;
                next_progress += self.progress_interval;
            }

            let wait = self.poll_interval.min(deadline - now);
            if !sleep_or_cancel(wait, &self.cancel).await {
                info!("Verification wait interrupted");
                return Ok(CodeResult::Cancelled);
            }
        }
    }
}

#[async_trait]
impl CodeSource for VerificationHandoff<'_> {
    async fn verification_code(&self) -> Result<CodeResult, OutputClosed> {
        self.await_code(self.timeout).await
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!("Could not remove {}: {}", path.display(), e);
    }
}

/// Write `code` to the code file. Only six-digit codes are accepted.
pub fn write_code(config: &HandoffConfig, code: &str) -> anyhow::Result<PathBuf> {
    let code = code.trim();
    if !is_valid_code(code) {
        return Err(anyhow!(
            "Verification code must be exactly {} digits, got {:?}",
            CODE_LENGTH,
            code
        ));
    }
    let path = config.code_path();
    write_marker(&path, code)?;
    Ok(path)
}

/// Write the cancel file.
pub fn write_cancel(config: &HandoffConfig) -> anyhow::Result<PathBuf> {
    let path = config.cancel_path();
    write_marker(&path, CANCEL_KEYWORD)?;
    Ok(path)
}

// Rename into place so the reader never sees a partial file.
fn write_marker(path: &Path, content: &str) -> anyhow::Result<()> {
    let staging = path.with_extension("tmp");
    fs::write(&staging, content)
        .with_context(|| format!("Failed to write {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("Failed to move marker into {}", path.display()))?;
    Ok(())
}
