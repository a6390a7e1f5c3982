//! Operator progress lines and the single terminal completion record.

use crate::errors::OutputClosed;
use crate::messages::{localize, MessageCatalog, MessageKey};
use crate::session::RegistrationSession;
use crate::token::SessionToken;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "Registration completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Failed,
    Cancelled,
}

/// The authoritative outcome of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub success: bool,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub message: String,
    pub status: CompletionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionRecord {
    pub fn success(session: &RegistrationSession, message: impl Into<String>) -> Self {
        Self {
            success: true,
            email: session.email().to_string(),
            first_name: session.first_name().to_string(),
            last_name: session.last_name().to_string(),
            message: message.into(),
            status: CompletionStatus::Completed,
            token: None,
            session_token_raw: None,
            error: None,
        }
    }

    pub fn failure(
        session: &RegistrationSession,
        status: CompletionStatus,
        error: impl Display,
    ) -> Self {
        let error = error.to_string();
        Self {
            success: false,
            email: session.email().to_string(),
            first_name: session.first_name().to_string(),
            last_name: session.last_name().to_string(),
            message: format!("Registration failed: {error}"),
            status,
            token: None,
            session_token_raw: None,
            error: Some(error),
        }
    }

    pub fn with_token(mut self, token: &SessionToken) -> Self {
        self.token = Some(token.normalized.clone());
        self.session_token_raw = Some(token.raw.clone());
        self
    }

    pub fn to_line(&self) -> String {
        // Serializing a struct of strings and bools cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Writes progress lines and the terminal record to one output channel.
///
/// A closed pipe surfaces as [`OutputClosed`] so the caller can stop quietly.
/// Other write errors are logged and dropped.
pub struct CompletionReporter {
    out: Mutex<Box<dyn Write + Send>>,
    catalog: &'static dyn MessageCatalog,
    terminal: Mutex<Option<CompletionRecord>>,
}

impl CompletionReporter {
    pub fn new(out: Box<dyn Write + Send>, catalog: &'static dyn MessageCatalog) -> Self {
        Self {
            out: Mutex::new(out),
            catalog,
            terminal: Mutex::new(None),
        }
    }

    pub fn stdout(catalog: &'static dyn MessageCatalog) -> Self {
        Self::new(Box::new(io::stdout()), catalog)
    }

    pub fn catalog(&self) -> &'static dyn MessageCatalog {
        self.catalog
    }

    pub fn render(&self, key: MessageKey, params: &[(&str, &dyn Display)]) -> String {
        localize(self.catalog, key, params)
    }

    /// Human-readable, non-authoritative line.
    pub fn progress(
        &self,
        key: MessageKey,
        params: &[(&str, &dyn Display)],
    ) -> Result<(), OutputClosed> {
        let line = self.render(key, params);
        self.write_line(&line)
    }

    /// Machine-readable notification that is not the terminal record.
    pub fn event(&self, event: &serde_json::Value) -> Result<(), OutputClosed> {
        self.write_line(&event.to_string())
    }

    /// Emit `record` and remember it as the terminal outcome.
    pub fn report(&self, record: &CompletionRecord) -> Result<(), OutputClosed> {
        *lock(&self.terminal) = Some(record.clone());
        debug!(success = record.success, status = ?record.status, "Reporting completion record");
        self.write_line(&record.to_line())
    }

    /// Re-emit the remembered record, or a minimal success record when none
    /// was computed yet.
    pub fn finish(&self, session: &RegistrationSession) -> Result<CompletionRecord, OutputClosed> {
        let record = lock(&self.terminal)
            .clone()
            .unwrap_or_else(|| CompletionRecord::success(session, DEFAULT_SUCCESS_MESSAGE));
        self.report(&record)?;
        Ok(record)
    }

    pub fn terminal(&self) -> Option<CompletionRecord> {
        lock(&self.terminal).clone()
    }

    fn write_line(&self, line: &str) -> Result<(), OutputClosed> {
        let mut out = lock(&self.out);
        let result = writeln!(out, "{line}").and_then(|_| out.flush());
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Err(OutputClosed),
            Err(e) => {
                warn!("Failed to write output line: {}", e);
                Ok(())
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
