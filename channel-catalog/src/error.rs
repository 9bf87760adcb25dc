//! Error types for service normalization.

use thiserror::Error;

/// A backend service record that cannot be turned into a [`CanonicalService`].
///
/// These never abort a reconciliation pass; the record is dropped like any
/// other filter rejection.
///
/// [`CanonicalService`]: crate::types::CanonicalService
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A numeric field does not fit its broadcast-standard width.
    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    /// A ChSet5.txt line could not be split into its columns.
    #[error("Malformed ChSet5 line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}
