//! Locating clickable controls by what they say rather than where they sit.

use crate::actuator::WebActuator;
use crate::element::WebElement;
use crate::errors::ActuatorError;
use crate::locator::Locator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_SCAN_SELECTOR: &str =
    "css:button, [role='button'], input[type='submit'], input[type='button']";
pub const DEFAULT_SCAN_LIMIT: usize = 10;

/// What a control should look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlCriteria {
    /// Preferred explicit locator. Tried first.
    pub locator: Option<String>,
    /// Case-insensitive fragments matched against visible text and `aria-label`.
    pub labels: Vec<String>,
    /// Which controls are scanned when the locator misses.
    pub scan_selector: String,
    /// Only the first N scanned controls are considered.
    pub scan_limit: usize,
    /// Zero-based position among scanned controls, used only when no label
    /// matches. Off unless configured.
    pub ordinal_fallback: Option<usize>,
    /// How long the explicit locator may wait for its element.
    #[serde(with = "crate::duration::serde_duration")]
    pub timeout: Duration,
}

impl Default for ControlCriteria {
    fn default() -> Self {
        Self {
            locator: None,
            labels: Vec::new(),
            scan_selector: DEFAULT_SCAN_SELECTOR.to_string(),
            scan_limit: DEFAULT_SCAN_LIMIT,
            ordinal_fallback: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl ControlCriteria {
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        match &self.locator {
            Some(locator) => format!("{locator} / labels {:?}", self.labels),
            None => format!("labels {:?}", self.labels),
        }
    }
}

/// Find the control best matching a set of criteria.
#[async_trait]
pub trait ControlFinder: Send + Sync {
    async fn find_control(
        &self,
        actuator: &dyn WebActuator,
        criteria: &ControlCriteria,
    ) -> Result<Option<WebElement>, ActuatorError>;
}

/// Resolution order: explicit locator, then label match among the first
/// `scan_limit` scanned controls, then the configured ordinal if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelControlFinder;

#[async_trait]
impl ControlFinder for LabelControlFinder {
    #[instrument(level = "debug", skip(self, actuator, criteria), fields(criteria = %criteria.describe()))]
    async fn find_control(
        &self,
        actuator: &dyn WebActuator,
        criteria: &ControlCriteria,
    ) -> Result<Option<WebElement>, ActuatorError> {
        if let Some(raw) = criteria.locator.as_deref() {
            let locator = Locator::from(raw);
            if let Some(element) = actuator
                .find_element(&locator, Some(criteria.timeout))
                .await?
            {
                debug!("Control found by explicit locator {}", raw);
                return Ok(Some(element));
            }
            debug!("Explicit locator {} matched nothing, scanning controls", raw);
        }

        let scan = Locator::from(criteria.scan_selector.as_str());
        let mut candidates: Vec<WebElement> = actuator.find_elements(&scan).await?;
        candidates.truncate(criteria.scan_limit);
        debug!("Scanning {} candidate controls", candidates.len());

        let wanted: Vec<String> = criteria.labels.iter().map(|l| l.to_lowercase()).collect();
        let mut matched = None;
        for (i, candidate) in candidates.iter().enumerate() {
            debug!("  control {}: {}", i + 1, candidate.describe().await);
            if matched.is_some() || wanted.is_empty() {
                continue;
            }
            let text = candidate.text().await.unwrap_or_default().to_lowercase();
            let aria = candidate
                .attribute("aria-label")
                .await
                .ok()
                .flatten()
                .unwrap_or_default()
                .to_lowercase();
            if wanted
                .iter()
                .any(|label| text.contains(label.as_str()) || aria.contains(label.as_str()))
            {
                matched = Some(i);
            }
        }

        let index = match (matched, criteria.ordinal_fallback) {
            (Some(i), _) => Some(i),
            (None, Some(ordinal)) if ordinal < candidates.len() => {
                debug!("No label matched, using configured position {}", ordinal);
                Some(ordinal)
            }
            _ => None,
        };

        Ok(index.map(|i| candidates.swap_remove(i)))
    }
}
