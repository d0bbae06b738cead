//! Email Value Object
//!
//! Validated, normalized recipient address. Invalid addresses are still
//! stored on contacts; they are only counted separately so the operator can
//! be warned before a send.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized email address
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Parse and normalize (trim + lowercase) an address
    pub fn parse(value: impl AsRef<str>) -> Result<Self, EmailError> {
        let value = value.as_ref().trim().to_lowercase();

        if value.is_empty() {
            return Err(EmailError::Empty);
        }

        let (local, domain) = value.split_once('@').ok_or(EmailError::MissingAt)?;
        if local.is_empty() || domain.contains('@') || value.chars().any(char::is_whitespace) {
            return Err(EmailError::InvalidFormat);
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(EmailError::InvalidDomain);
        }

        Ok(Self(value))
    }

    /// True when the raw value would be accepted by the sending pipeline
    pub fn is_deliverable(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split_once('@').map(|(_, d)| d).unwrap_or_default()
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Email> for String {
    fn from(email: Email) -> Self {
        email.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailError {
    #[error("email address is empty")]
    Empty,
    #[error("email address has no '@'")]
    MissingAt,
    #[error("email address is malformed")]
    InvalidFormat,
    #[error("email domain is malformed")]
    InvalidDomain,
}
