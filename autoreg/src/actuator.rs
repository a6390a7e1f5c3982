use crate::element::WebElement;
use crate::errors::ActuatorError;
use crate::locator::Locator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A browser cookie as seen by the actuator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The capability to observe and drive one live browser page.
///
/// Implementations are not expected to be driven from several tasks at once;
/// the orchestration core only ever issues one call at a time.
#[async_trait]
pub trait WebActuator: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), ActuatorError>;

    /// Find the first element matching `locator`, waiting up to `timeout`.
    /// Returns `Ok(None)` when nothing matched in time.
    async fn find_element(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<Option<WebElement>, ActuatorError>;

    /// Find all elements currently matching `locator`, in document order.
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<WebElement>, ActuatorError>;

    async fn read_cookies(&self) -> Result<Vec<Cookie>, ActuatorError>;

    async fn current_url(&self) -> Result<String, ActuatorError>;

    async fn page_title(&self) -> Result<String, ActuatorError>;

    async fn page_html(&self) -> Result<String, ActuatorError>;

    /// End the browser session. Further calls fail with `SessionClosed`.
    async fn close(&self) -> Result<(), ActuatorError>;
}

/// Opens actuator sessions. Called only after the registration input is valid.
#[async_trait]
pub trait ActuatorLauncher: Send + Sync {
    async fn launch(&self, incognito: bool) -> Result<Arc<dyn WebActuator>, ActuatorError>;
}
