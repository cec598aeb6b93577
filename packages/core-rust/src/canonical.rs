//! Canonical device identifiers.
//!
//! Device names arrive as `{prefix}:{id}[/{service}[/{ignored}]]`. Parsing
//! normalizes them so that every spelling of the same device compares equal:
//! the prefix is lowercased and MAC addresses lose their separators.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const MAC_PREFIX: &str = "mac";
const MAC_HEX_DIGITS: usize = 12;

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^((?i-u:mac|uuid|dns|serial)):([^/]+)(?:/[^/]+)?").expect("device id pattern is valid")
    })
}

/// Errors from parsing a device name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("invalid device id: {value}")]
    Invalid { value: String },
    #[error("invalid mac address: {value}")]
    InvalidMac { value: String },
}

/// A canonicalized device identifier such as `mac:112233445566`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId {
    canonical: String,
    prefix_len: usize,
}

impl DeviceId {
    /// Lowercased prefix, e.g. `mac`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.canonical[..self.prefix_len]
    }

    /// The id portion after the prefix separator.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.canonical[self.prefix_len + 1..]
    }

    /// The canonical `prefix:id` form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }
}

/// Parse and canonicalize a device name.
///
/// # Errors
///
/// Returns [`IdError::Invalid`] when the value does not match the device name
/// grammar, and [`IdError::InvalidMac`] when a `mac` id is not 12 hex digits.
pub fn parse_id(value: &str) -> Result<DeviceId, IdError> {
    let captures = id_pattern()
        .captures(value)
        .ok_or_else(|| IdError::Invalid { value: value.to_string() })?;

    let prefix = captures[1].to_ascii_lowercase();
    let mut id = captures[2].to_string();

    if prefix == MAC_PREFIX {
        id.retain(|c| !matches!(c, ':' | '-' | '.' | ','));
        if id.len() != MAC_HEX_DIGITS || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdError::InvalidMac { value: value.to_string() });
        }
        id.make_ascii_lowercase();
    }

    Ok(DeviceId {
        prefix_len: prefix.len(),
        canonical: format!("{prefix}:{id}"),
    })
}

impl FromStr for DeviceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_id(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_id(&value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.canonical
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
