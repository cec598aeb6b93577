//! Convey payloads: base64-encoded JSON objects carrying device metadata.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Base64 alphabet a convey header is encoded with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Standard,
    UrlSafe,
}

impl Encoding {
    fn decode(self, value: &str) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Self::Standard => STANDARD.decode(value),
            Self::UrlSafe => URL_SAFE.decode(value),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConveyError {
    #[error("convey payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("convey payload is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
    #[error("convey header is not visible ASCII")]
    NotText,
}

/// Decoded convey payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Convey(Map<String, Value>);

impl Convey {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Convey {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Decode a convey header value.
///
/// Surrounding whitespace is ignored.
///
/// # Errors
///
/// Returns [`ConveyError::Decode`] for invalid base64 and
/// [`ConveyError::Json`] when the decoded bytes are not a JSON object.
pub fn parse_payload(encoding: Encoding, value: &str) -> Result<Convey, ConveyError> {
    let raw = encoding.decode(value.trim())?;
    Ok(serde_json::from_slice(&raw)?)
}
