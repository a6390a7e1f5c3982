use crate::errors::RegistrationError;
use crate::session::RegistrationSession;
use crate::token::SessionToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const ACCOUNTS_FILE: &str = "accounts.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub email: String,
    pub token: String,
    pub session_token_raw: String,
    /// Usage figure shown on the account page, when it was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_usage: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Persists the outcome of a successful registration.
pub trait AccountStore: Send + Sync {
    fn save(
        &self,
        session: &RegistrationSession,
        token: &SessionToken,
        total_usage: Option<&str>,
    ) -> Result<(), RegistrationError>;
}

/// Accounts kept as a JSON array in one file. Passwords are never written.
#[derive(Debug, Clone)]
pub struct JsonAccountStore {
    path: PathBuf,
}

impl JsonAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(ACCOUNTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Vec<AccountRecord>, RegistrationError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(persist_error(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| persist_error(&self.path, e))
    }

    fn write(&self, accounts: &[AccountRecord]) -> Result<(), RegistrationError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persist_error(parent, e))?;
        }
        let json = serde_json::to_string_pretty(accounts).map_err(|e| persist_error(&self.path, e))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|e| persist_error(&staging, e))?;
        fs::rename(&staging, &self.path).map_err(|e| persist_error(&self.path, e))
    }
}

impl AccountStore for JsonAccountStore {
    fn save(
        &self,
        session: &RegistrationSession,
        token: &SessionToken,
        total_usage: Option<&str>,
    ) -> Result<(), RegistrationError> {
        let mut accounts = self.load()?;
        let before = accounts.len();
        accounts.retain(|a| a.email != session.email());
        if accounts.len() != before {
            debug!("Replacing existing entry for {}", session.email());
        }
        accounts.push(AccountRecord {
            email: session.email().to_string(),
            token: token.normalized.clone(),
            session_token_raw: token.raw.clone(),
            total_usage: total_usage.map(str::to_string),
            created_at: Utc::now(),
        });
        self.write(&accounts)?;
        info!("Saved account {} to {}", session.email(), self.path.display());
        Ok(())
    }
}

fn persist_error(path: &Path, e: impl std::fmt::Display) -> RegistrationError {
    RegistrationError::Persist(format!("{}: {e}", path.display()))
}
