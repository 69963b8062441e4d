//! Error types for pgforge

use thiserror::Error;

/// Result type alias for pgforge operations
pub type ForgeResult<T> = Result<T, ForgeError>;

/// Error types for statement construction, schema planning and execution
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A literal's type could not be narrowed to one tag, or two operands
    /// resolved to incompatible type groups
    #[error("Ambiguous type: {0}")]
    Ambiguous(String),

    /// An expression or value had a different type than the position requires
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A literal could not be converted to its resolved type
    #[error("Malformed literal '{value}': {reason}")]
    MalformedLiteral { value: String, reason: String },

    /// Primary key declared twice on one model
    #[error("Primary key already set on table '{0}'")]
    DuplicatePrimaryKey(String),

    /// SELECT without projected columns
    #[error("SELECT requires at least one projected column")]
    EmptyProjection,

    /// Non-aggregate, non-key expression used alongside GROUP BY
    #[error("Expression is not groupable: {0}")]
    NotGroupable(String),

    /// Column lookup on a source or model failed
    #[error("Unknown column '{column}' on '{source_name}'")]
    UnknownColumn { source_name: String, column: String },

    /// Structurally invalid statement (arity mismatch, duplicate names, ...)
    #[error("Invalid statement: {0}")]
    Invalid(String),

    /// Migration requested between two absent table snapshots
    #[error("Nothing to migrate: both table snapshots are absent")]
    NothingToMigrate,

    /// A structural column record matched no registered column kind
    #[error("Unknown column kind in record: {0}")]
    UnknownColumnKind(String),

    /// A named parameter was referenced but not bound
    #[error("Missing value for parameter '{0}'")]
    MissingParam(String),

    /// A binding was supplied for a name the statement never references
    #[error("Unexpected parameter '{0}'")]
    UnexpectedParam(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Snapshot (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error surfaced by the database client, passed through unchanged
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),
}

impl ForgeError {
    /// Create an ambiguity error
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::Ambiguous(message.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a malformed literal error
    pub fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedLiteral {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(source_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            source_name: source_name.into(),
            column: column.into(),
        }
    }

    /// Create an invalid statement error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Check if this is an ambiguity error
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }

    /// Check if this error came from the database client
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }
}
