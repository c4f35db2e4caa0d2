use thiserror::Error;

/// Errors that can occur during invoice construction, export or import.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvoiceError {
    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Data required to produce a compliant document is absent.
    #[error("missing {field}: {message}")]
    MissingField { field: String, message: String },

    /// XML generation error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Malformed input document or unparsable value.
    #[error("parse error: {0}")]
    Parse(String),
}

impl InvoiceError {
    #[cfg_attr(not(feature = "cii"), allow(dead_code))]
    pub(crate) fn missing(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "totals.vat_total").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// EN 16931 business rule ID if applicable (e.g. "BR-CO-15").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error with an EN 16931 rule ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

/// Join validation errors into one message, as carried by
/// [`InvoiceError::Validation`].
pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
