//! Document token: the opaque handle shared by storage paths, payment
//! linkage and download gating.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Maximum accepted token length, in bytes.
pub const MAX_TOKEN_LENGTH: usize = 1500;

lazy_static! {
    static ref FORBIDDEN_TOKEN_CHARS: Regex = Regex::new(r"[/.\s#$\[\]]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token inválido: debe ser un string no vacío")]
    Empty,
    #[error("Token excede longitud máxima ({MAX_TOKEN_LENGTH} caracteres)")]
    TooLong { len: usize },
    #[error("Token contiene caracteres inválidos (/ . espacios # $ [ ])")]
    ForbiddenCharacters,
}

/// A token that is safe to use as a storage path segment and as a store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentToken(String);

impl DocumentToken {
    /// Validate a client-supplied token. Surrounding whitespace is trimmed
    /// before the checks run.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TokenError::Empty);
        }
        if trimmed.len() > MAX_TOKEN_LENGTH {
            return Err(TokenError::TooLong { len: trimmed.len() });
        }
        if FORBIDDEN_TOKEN_CHARS.is_match(trimmed) {
            return Err(TokenError::ForbiddenCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Mint a fresh token. Never derived from user input.
    pub fn mint() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines; full tokens stay out of the logs.
    pub fn log_prefix(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for DocumentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentToken> for String {
    fn from(token: DocumentToken) -> Self {
        token.0
    }
}
