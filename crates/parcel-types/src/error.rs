//! Shared error types for the Parcel system.

use thiserror::Error;

/// Top-level error type for the Parcel system.
#[derive(Error, Debug)]
pub enum ParcelError {
    /// A `$ref` path could not be followed inside its schema document.
    #[error("Unresolved reference '{reference}': segment '{segment}' not found")]
    UnresolvedReference {
        /// The full reference string.
        reference: String,
        /// The first segment that was missing.
        segment: String,
    },

    /// A reference re-entered itself while being expanded.
    #[error("Cyclic reference detected: {}", chain.join(" -> "))]
    CyclicReference {
        /// References on the expansion stack, ending with the repeated one.
        chain: Vec<String>,
    },

    /// The schema uses a shape the mapper cannot safely describe.
    #[error("Unsupported schema shape at '{path}': {reason}")]
    UnsupportedSchemaShape {
        /// Field path where the shape was found.
        path: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A descriptor string did not parse to a known kind.
    #[error("Malformed descriptor for field '{field}': {reason}")]
    MalformedDescriptor {
        /// The field whose descriptor failed to parse.
        field: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// Instantiation values disagree with the declared record type.
    #[error("Field mismatch on '{field}': {reason}")]
    FieldMismatch {
        /// Dotted path of the offending field.
        field: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// A serialized message could not be turned back into a message.
    #[error("Corrupt message: {0}")]
    CorruptMessage(#[source] Box<ParcelError>),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ParcelError {
    /// Wrap an error as a [`ParcelError::CorruptMessage`], without double wrapping.
    pub fn corrupt(inner: ParcelError) -> Self {
        match inner {
            already @ ParcelError::CorruptMessage(_) => already,
            other => ParcelError::CorruptMessage(Box::new(other)),
        }
    }

    /// Shorthand for a [`ParcelError::FieldMismatch`].
    pub fn field_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ParcelError::FieldMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ParcelError::UnsupportedSchemaShape`].
    pub fn unsupported(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ParcelError::UnsupportedSchemaShape {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Alias for Result with ParcelError.
pub type ParcelResult<T> = Result<T, ParcelError>;
