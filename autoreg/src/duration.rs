use anyhow::{anyhow, Result};
use rand::Rng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Parse human-readable duration strings.
/// Supports formats like: "1s", "500ms", "2m", "1.5s", "2h". A bare number is seconds.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim();

    let (number_part, unit_part) = split_number_and_unit(input)?;
    let value: f64 = number_part
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", number_part))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow!("Duration must be a non-negative number: {}", input));
    }

    // nanoseconds per unit
    let multiplier = match unit_part {
        "ms" | "milliseconds" | "millisecond" => 1e6,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1e9,
        "m" | "min" | "mins" | "minute" | "minutes" => 6e10,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3.6e12,
        _ => return Err(anyhow!("Unknown time unit: {}", unit_part)),
    };

    Ok(Duration::from_nanos((value * multiplier).round() as u64))
}

fn split_number_and_unit(input: &str) -> Result<(&str, &str)> {
    let split_pos = input
        .char_indices()
        .find(|(_, ch)| ch.is_alphabetic())
        .map(|(i, _)| i)
        .unwrap_or(input.len());

    let number_part = input[..split_pos].trim();
    let unit_part = input[split_pos..].trim();

    if number_part.is_empty() {
        return Err(anyhow!("No numeric value in duration: {}", input));
    }

    Ok((number_part, unit_part))
}

fn format_duration(d: &Duration) -> String {
    if d.subsec_millis() == 0 && d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// A wait drawn uniformly from `[min, max]` on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingRange {
    pub min: Duration,
    pub max: Duration,
}

impl TimingRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn fixed(d: Duration) -> Self {
        Self { min: d, max: d }
    }

    pub fn from_millis(min: u64, max: u64) -> Self {
        Self::new(Duration::from_millis(min), Duration::from_millis(max))
    }

    /// Parse "0.1-0.8", "0.5,1.5", "300ms-1s" or a single duration.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let split = input.split_once('-').or_else(|| input.split_once(','));
        let range = match split {
            Some((lo, hi)) => Self::new(parse_duration(lo)?, parse_duration(hi)?),
            None => Self::fixed(parse_duration(input)?),
        };
        if range.min > range.max {
            return Err(anyhow!("Range minimum exceeds maximum: {}", input));
        }
        Ok(range)
    }

    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Serialize for TimingRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.min == self.max {
            serializer.serialize_str(&format_duration(&self.min))
        } else {
            serializer.serialize_str(&format!(
                "{}-{}",
                format_duration(&self.min),
                format_duration(&self.max)
            ))
        }
    }
}

impl<'de> Deserialize<'de> for TimingRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        TimingRange::parse(&raw.into_string()).map_err(de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

/// `#[serde(with = "crate::duration::serde_duration")]` for human duration fields.
pub mod serde_duration {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = StringOrNumber::deserialize(deserializer)?;
        parse_duration(&raw.into_string()).map_err(de::Error::custom)
    }
}
