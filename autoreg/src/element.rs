use crate::errors::ActuatorError;
use async_trait::async_trait;
use std::fmt::Debug;

/// Keys the workflows need to send outside of plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Escape,
}

impl Key {
    /// WebDriver private-use code point for the key.
    pub fn webdriver_code(&self) -> char {
        match self {
            Key::Enter => '\u{E007}',
            Key::Tab => '\u{E004}',
            Key::Escape => '\u{E00C}',
        }
    }
}

/// Interface for actuator-specific element implementations
#[async_trait]
pub trait WebElementImpl: Send + Sync + Debug {
    /// Visible text content
    async fn text(&self) -> Result<String, ActuatorError>;
    async fn attribute(&self, name: &str) -> Result<Option<String>, ActuatorError>;
    async fn click(&self) -> Result<(), ActuatorError>;
    async fn clear(&self) -> Result<(), ActuatorError>;
    async fn type_text(&self, text: &str) -> Result<(), ActuatorError>;
    /// Choose an option of a selection-type field by its visible label
    async fn select_option(&self, label: &str) -> Result<(), ActuatorError>;
    async fn press_key(&self, key: Key) -> Result<(), ActuatorError>;
}

/// Represents an element on the live page
#[derive(Debug)]
pub struct WebElement {
    inner: Box<dyn WebElementImpl>,
}

impl WebElement {
    pub fn new(inner: Box<dyn WebElementImpl>) -> Self {
        Self { inner }
    }

    pub async fn text(&self) -> Result<String, ActuatorError> {
        self.inner.text().await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, ActuatorError> {
        self.inner.attribute(name).await
    }

    pub async fn click(&self) -> Result<(), ActuatorError> {
        self.inner.click().await
    }

    pub async fn clear(&self) -> Result<(), ActuatorError> {
        self.inner.clear().await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        self.inner.type_text(text).await
    }

    pub async fn select_option(&self, label: &str) -> Result<(), ActuatorError> {
        self.inner.select_option(label).await
    }

    pub async fn press_key(&self, key: Key) -> Result<(), ActuatorError> {
        self.inner.press_key(key).await
    }

    /// Clear the field then type `text`.
    pub async fn fill(&self, text: &str) -> Result<(), ActuatorError> {
        self.inner.clear().await?;
        self.inner.type_text(text).await
    }

    /// One-line description used in diagnostics
    pub async fn describe(&self) -> String {
        let text = self.text().await.unwrap_or_default();
        let aria = self
            .attribute("aria-label")
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let testid = self
            .attribute("data-testid")
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        let class: String = self
            .attribute("class")
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
            .chars()
            .take(50)
            .collect();
        format!("text='{text}', aria-label='{aria}', data-testid='{testid}', class='{class}'")
    }
}
