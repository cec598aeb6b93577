//! Security tokens taken from the `Authorization` header.

use std::fmt;
use std::str::FromStr;

use http::header::AUTHORIZATION;
use http::HeaderMap;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no authorization header")]
    Missing,
    #[error("malformed authorization header")]
    Malformed,
    #[error("unsupported token type: {0}")]
    UnsupportedType(String),
}

/// Authorization scheme of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Basic,
    Bearer,
}

impl TokenType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Bearer => "Bearer",
        }
    }
}

impl FromStr for TokenType {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("basic") {
            Ok(Self::Basic)
        } else if s.eq_ignore_ascii_case("bearer") {
            Ok(Self::Bearer)
        } else {
            Err(TokenError::UnsupportedType(s.to_string()))
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential presented by a request. The value is kept exactly as sent.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    token_type: TokenType,
    value: String,
}

impl Token {
    #[must_use]
    pub fn new(token_type: TokenType, value: impl Into<String>) -> Self {
        Self {
            token_type,
            value: value.into(),
        }
    }

    /// Parse an `Authorization` header value of the form `<type> <value>`.
    ///
    /// # Errors
    ///
    /// [`TokenError::Malformed`] if either part is missing,
    /// [`TokenError::UnsupportedType`] for schemes other than Basic and Bearer.
    pub fn parse(header: &str) -> Result<Self, TokenError> {
        let (scheme, value) = header
            .trim()
            .split_once(char::is_whitespace)
            .ok_or(TokenError::Malformed)?;
        let value = value.trim();
        if value.is_empty() {
            return Err(TokenError::Malformed);
        }
        Ok(Self::new(scheme.parse()?, value))
    }

    /// Extract the token from a request's headers.
    ///
    /// # Errors
    ///
    /// [`TokenError::Missing`] when there is no `Authorization` header,
    /// otherwise the errors of [`Token::parse`].
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, TokenError> {
        let header = headers.get(AUTHORIZATION).ok_or(TokenError::Missing)?;
        let header = header.to_str().map_err(|_| TokenError::Malformed)?;
        Self::parse(header)
    }

    #[must_use]
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

// Credentials stay out of logs.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Decides whether a presented token is acceptable.
pub trait Validator: Send + Sync {
    fn validate(&self, token: &Token) -> bool;
}

/// Accepts tokens equal to one of a fixed set.
///
/// Values are compared in constant time.
#[derive(Clone, Default)]
pub struct ExactMatchValidator {
    accepted: Vec<Token>,
}

impl ExactMatchValidator {
    #[must_use]
    pub fn new(accepted: impl IntoIterator<Item = Token>) -> Self {
        Self {
            accepted: accepted.into_iter().collect(),
        }
    }

    /// Accept `Basic` tokens with the given encoded credentials.
    #[must_use]
    pub fn basic<I, S>(credentials: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            credentials
                .into_iter()
                .map(|value| Token::new(TokenType::Basic, value)),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }
}

impl Validator for ExactMatchValidator {
    fn validate(&self, token: &Token) -> bool {
        self.accepted.iter().any(|accepted| {
            accepted.token_type == token.token_type
                && bool::from(accepted.value.as_bytes().ct_eq(token.value.as_bytes()))
        })
    }
}

impl fmt::Debug for ExactMatchValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactMatchValidator")
            .field("accepted", &self.accepted.len())
            .finish()
    }
}
