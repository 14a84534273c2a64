//! Error types for the field-buffer engine.
//!
//! Every error carries enough context (field, occurrence, attempted type,
//! offsets) to rebuild a diagnostic message without access to the buffer
//! that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for field-buffer operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FmlError {
    // =========================================================================
    // Field Access Errors (E001-E019)
    // =========================================================================
    /// A required occurrence or field is absent.
    #[error("E001: Field {field} occurrence {occurrence} not present")]
    NotPresent {
        /// Display form of the field (name when known).
        field: String,
        /// The occurrence that was requested.
        occurrence: usize,
    },

    /// A value kind cannot be stored in or read from a field.
    #[error("E002: Type mismatch for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Display form of the field.
        field: String,
        /// The kind the field or caller required.
        expected: String,
        /// The kind that was supplied or found.
        actual: String,
    },

    /// The buffer has no room for the requested write.
    #[error("E003: Buffer space exhausted: need {needed} bytes, {available} available")]
    SpaceExhausted {
        /// Bytes the write needs.
        needed: usize,
        /// Bytes left in the current allocation.
        available: usize,
    },

    /// The operation needs an allocated buffer.
    #[error("E004: Operation '{operation}' requires an allocated buffer")]
    BufferNull {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// The operation needs a built index.
    #[error("E005: Operation '{operation}' requires an indexed buffer")]
    NotIndexed {
        /// The operation that was attempted.
        operation: &'static str,
    },

    // =========================================================================
    // Catalog Errors (E020-E039)
    // =========================================================================
    /// No field table entry for a name.
    #[error("E020: Unknown field name '{name}'")]
    UnknownName {
        /// The name that failed to resolve.
        name: String,
    },

    /// No field table entry for an identifier.
    #[error("E021: Unknown field identifier {id}")]
    UnknownIdentifier {
        /// The raw identifier.
        id: u32,
    },

    /// A `(type, number)` pair does not form a valid identifier.
    #[error("E022: Invalid field identifier ({field_type}, {number}): {cause}")]
    InvalidIdentifier {
        /// The requested type tag or keyword.
        field_type: String,
        /// The requested field number.
        number: u64,
        /// Why the pair is invalid.
        cause: String,
    },

    /// A field table source could not be loaded.
    #[error("E023: Failed to load field table {path}: {cause}")]
    TableLoad {
        /// The table source.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Expression Errors (E040-E049)
    // =========================================================================
    /// Expression text failed to compile.
    #[error("E040: Malformed expression '{expr}' at position {position}: {cause}")]
    MalformedExpression {
        /// The source text.
        expr: String,
        /// Byte offset of the failure.
        position: usize,
        /// Description of the syntax problem.
        cause: String,
    },

    // =========================================================================
    // Storage and Interchange Errors (E060-E099)
    // =========================================================================
    /// The arena refused an allocation.
    #[error("E060: Arena capacity exceeded: requested {requested} bytes, limit {limit} bytes")]
    ArenaCapacity {
        /// Bytes requested.
        requested: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// A byte region failed validation.
    #[error("E061: Corrupt buffer at offset {offset}: {cause}")]
    Corrupt {
        /// Offset where the problem was detected.
        offset: usize,
        /// Description of the corruption.
        cause: String,
    },

    /// A text dump line could not be parsed.
    #[error("E062: Text parse error on line {line}: {cause}")]
    TextParse {
        /// 1-based line number.
        line: usize,
        /// Description of the problem.
        cause: String,
    },

    /// An export frame was malformed.
    #[error("E063: Transport frame invalid: {cause}")]
    Transport {
        /// Description of the problem.
        cause: String,
    },

    /// I/O failure while reading or writing.
    #[error("E090: I/O error on {path}: {cause}")]
    Io {
        /// The path or stream involved.
        path: PathBuf,
        /// The underlying error.
        cause: String,
    },
}

impl FmlError {
    /// Get the error code (e.g., "E001").
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotPresent { .. } => "E001",
            Self::TypeMismatch { .. } => "E002",
            Self::SpaceExhausted { .. } => "E003",
            Self::BufferNull { .. } => "E004",
            Self::NotIndexed { .. } => "E005",
            Self::UnknownName { .. } => "E020",
            Self::UnknownIdentifier { .. } => "E021",
            Self::InvalidIdentifier { .. } => "E022",
            Self::TableLoad { .. } => "E023",
            Self::MalformedExpression { .. } => "E040",
            Self::ArenaCapacity { .. } => "E060",
            Self::Corrupt { .. } => "E061",
            Self::TextParse { .. } => "E062",
            Self::Transport { .. } => "E063",
            Self::Io { .. } => "E090",
        }
    }

    /// Check if this error is recovered by growing the buffer.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::SpaceExhausted { .. })
    }

    /// Check if this error came from name/identifier resolution.
    #[must_use]
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownName { .. }
                | Self::UnknownIdentifier { .. }
                | Self::InvalidIdentifier { .. }
                | Self::TableLoad { .. }
        )
    }

    pub(crate) fn type_mismatch(
        field: impl ToString,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::TypeMismatch {
            field: field.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn corrupt(offset: usize, cause: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            cause: cause.into(),
        }
    }
}

/// Result type alias using `FmlError`.
pub type Result<T> = std::result::Result<T, FmlError>;
