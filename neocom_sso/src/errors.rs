use std::fmt;

use neocom_core::ids::CharacterId;
use reqwest::StatusCode;
use thiserror::Error;

pub type SsoResult<T> = Result<T, SsoError>;

#[derive(Debug, Error)]
pub enum SsoError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("http request failed")]
    Network(#[source] reqwest::Error),
    #[error("http request timed out")]
    Timeout,
    #[error("provider rejected request ({status}): {}", .description.as_deref().unwrap_or("unknown error"))]
    Provider {
        status: StatusCode,
        description: Option<String>,
    },
    #[error("token validation failed")]
    Validation(#[from] ValidationError),
    #[error("response body did not match the expected schema")]
    Decode(#[from] serde_json::Error),
    #[error("affiliation lookup failed: {0}")]
    Affiliation(String),
    #[error("invalid url")]
    Url(#[from] url::ParseError),
    #[error("keyring operation failed")]
    Keyring(#[from] keyring::Error),
    #[error("session serialization failed")]
    SessionSerialization(#[source] serde_json::Error),
    #[error("login was not started before code exchange")]
    LoginNotStarted,
    #[error("state mismatch: expected {expected}, got {got}")]
    StateMismatch { expected: String, got: String },
    #[error("missing required scopes: {missing:?}")]
    MissingRequiredScopes { missing: Vec<String> },
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("jwt rejected")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("key set contains no usable signing key")]
    NoSigningKey,
    #[error("unsupported signing key: {0}")]
    UnsupportedKey(String),
    #[error("invalid token subject format: {0}")]
    InvalidSubject(String),
    #[error("token expiry {0} is out of range")]
    InvalidExpiry(i64),
    #[error("refreshed token belongs to character {got}, expected {expected}")]
    CharacterMismatch {
        expected: CharacterId,
        got: CharacterId,
    },
}

impl From<reqwest::Error> for SsoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err)
        }
    }
}

impl SsoError {
    /// Failures a caller may retry or ignore without forcing a new login.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout | Self::Provider { .. } | Self::Affiliation(_) => {
                true
            }
            _ => false,
        }
    }

    /// Failures worth retrying later with the same credentials: transport
    /// errors, timeouts, throttling and provider-side outages. A 4xx
    /// rejection of a grant is not transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Provider { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
