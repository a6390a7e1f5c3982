use crate::errors::FormError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const BILLING_PROFILE_FILE: &str = "bank_card_config.json";

/// Placeholder the configuration editor writes for fields left blank.
const PLACEHOLDER: &str = "--";

/// Card and address data for the payment form. Treated as opaque except for
/// `billing_country`, which selects the address branch.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillingProfile {
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvc: String,
    pub billing_name: String,
    pub billing_country: String,
    pub billing_postal_code: String,
    pub billing_administrative_area: String,
    pub billing_locality: String,
    pub billing_dependent_locality: String,
    pub billing_address_line1: String,
}

impl std::fmt::Debug for BillingProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingProfile")
            .field("card_number", &mask(&self.card_number))
            .field("billing_name", &self.billing_name)
            .field("billing_country", &self.billing_country)
            .finish_non_exhaustive()
    }
}

fn mask(card: &str) -> String {
    let digits: Vec<char> = card.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 {
        return "****".to_string();
    }
    let head: String = digits[..4].iter().collect();
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileFile {
    List { cards: Vec<BillingProfile> },
    Single(BillingProfile),
}

/// Which set of address fields the payment form expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingBranch {
    Domestic,
    International,
}

impl std::fmt::Display for BillingBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingBranch::Domestic => write!(f, "domestic"),
            BillingBranch::International => write!(f, "international"),
        }
    }
}

impl BillingProfile {
    pub fn branch(&self, domestic_country: &str) -> BillingBranch {
        if self
            .billing_country
            .trim()
            .eq_ignore_ascii_case(domestic_country.trim())
        {
            BillingBranch::Domestic
        } else {
            BillingBranch::International
        }
    }

    /// Names of required card fields that are empty or still placeholders.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("cardNumber", &self.card_number),
            ("cardExpiry", &self.card_expiry),
            ("cardCvc", &self.card_cvc),
        ]
        .into_iter()
        .filter(|(_, v)| is_blank(v))
        .map(|(name, _)| name)
        .collect()
    }

    pub fn parse(content: &str) -> Result<Self, FormError> {
        let parsed: ProfileFile = serde_json::from_str(content)
            .map_err(|e| FormError::BillingProfileUnavailable(format!("invalid JSON: {e}")))?;
        let profile = match parsed {
            ProfileFile::List { cards } => cards.into_iter().next().ok_or_else(|| {
                FormError::BillingProfileUnavailable("card list is empty".to_string())
            })?,
            ProfileFile::Single(profile) => profile,
        };
        let missing = profile.missing_required();
        if !missing.is_empty() {
            return Err(FormError::BillingProfileUnavailable(format!(
                "missing {}",
                missing.join(", ")
            )));
        }
        Ok(profile)
    }

    /// Load from `explicit` or `<work_dir>/bank_card_config.json`.
    /// There is no built-in fallback profile.
    pub fn load(explicit: Option<&Path>, work_dir: &Path) -> Result<Self, FormError> {
        let path: PathBuf = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| work_dir.join(BILLING_PROFILE_FILE));
        debug!("Loading billing profile from {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| {
            warn!("Billing profile {} unreadable: {}", path.display(), e);
            FormError::BillingProfileUnavailable(format!("{}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }
}

fn is_blank(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v == PLACEHOLDER
}
