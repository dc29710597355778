//! Input validation for request bodies.
//!
//! Collects per-field errors so a client gets every problem in one response
//! instead of fixing them one round-trip at a time.

use std::collections::BTreeMap;
use std::fmt;

use crate::payment::models::PaymentChoice;
use crate::token::DocumentToken;

/// Validation error for a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, format!("El campo '{}' es requerido", field))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors, keyed by field in the response.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Field → message map for `ErrorResponse::details`. The first error per
    /// field wins.
    pub fn to_details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        for error in &self.errors {
            details
                .entry(error.field.clone())
                .or_insert_with(|| error.message.clone());
        }
        details
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Validation functions
// ============================================================================

/// Validate a token field, returning it when it is usable as a key.
pub fn validate_token(
    value: Option<&str>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<DocumentToken> {
    let Some(raw) = value else {
        errors.add(ValidationError::missing(field));
        return None;
    };

    match DocumentToken::parse(raw) {
        Ok(token) => Some(token),
        Err(err) => {
            errors.add(ValidationError::new(field, err.to_string()));
            None
        }
    }
}

/// Validate a payment option field against the allowlist.
pub fn validate_payment_choice(
    value: Option<&str>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<PaymentChoice> {
    match value.and_then(PaymentChoice::parse) {
        Some(choice) => Some(choice),
        None => {
            errors.add(ValidationError::new(
                field,
                "Opción inválida. Valores permitidos: pdf, pdf-word",
            ));
            None
        }
    }
}
