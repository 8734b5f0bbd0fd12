//! Error types for configuration loading.
//!
//! Fallible operations at the crate boundary return [`Result<T>`], which uses
//! the [`Error`] enum. Per-key parsers and the option codec return the narrower
//! [`ValidationError`], which always knows where in the document it happened.

use crate::document::Position;

/// Status code reported for a successful load.
pub const STATUS_SUCCESS: i32 = 0;

/// Status code reported when a configuration is rejected.
pub const STATUS_VALIDATION_FAILED: i32 = 1;

/// Status code reported when a valid configuration could not be activated.
pub const STATUS_COMMIT_FAILED: i32 = 2;

/// A malformed, missing, or out-of-range configuration parameter.
///
/// Every variant carries the [`Position`] of the offending node, and the
/// rendered message always ends in `(<line>:<col>)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A numeric option code outside `0..=65535` (or the narrower range a
    /// caller enforces).
    #[error("invalid option code '{token}': {reason} ({position})")]
    OutOfRange {
        token: String,
        reason: String,
        position: Position,
    },

    /// An option name with no definition in the searched option space.
    #[error(
        "unable to find option code for the specified option name '{name}' in option space '{space}' ({position})"
    )]
    UnknownOption {
        name: String,
        space: String,
        position: Position,
    },

    /// Option data that cannot be converted into a payload.
    ///
    /// `field` is the zero-based csv field index when the failure is tied to
    /// one field.
    #[error("{reason} ({position})")]
    BadOptionData {
        field: Option<usize>,
        reason: String,
        position: Position,
    },

    /// Any other malformed or missing parameter.
    #[error("{message} ({position})")]
    Invalid { message: String, position: Position },
}

impl ValidationError {
    pub fn invalid(message: impl Into<String>, position: Position) -> Self {
        Self::Invalid {
            message: message.into(),
            position,
        }
    }

    pub fn bad_data(field: Option<usize>, reason: impl Into<String>, position: Position) -> Self {
        Self::BadOptionData {
            field,
            reason: reason.into(),
            position,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Self::OutOfRange { position, .. }
            | Self::UnknownOption { position, .. }
            | Self::BadOptionData { position, .. }
            | Self::Invalid { position, .. } => *position,
        }
    }
}

/// Errors surfaced by a configuration load or by the CLI around it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or socket I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (answers, dumped configuration).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration text is not well-formed.
    #[error("{message} ({position})")]
    Syntax { message: String, position: Position },

    /// A parameter was rejected by one of the parsers.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A top-level key no parser is registered for.
    #[error("unsupported global configuration parameter: {key} ({position})")]
    UnsupportedKey { key: String, position: Position },

    /// Activating an already-validated configuration failed.
    ///
    /// Raised for command channel open/close failures and hook library
    /// loading failures.
    #[error("{0}")]
    Commit(String),

    /// Unexpected failure that fits none of the above.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Answer status code for this error.
    ///
    /// Commit failures report [`STATUS_COMMIT_FAILED`] so callers can tell
    /// "config rejected" from "config valid but could not be activated".
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Commit(_) => STATUS_COMMIT_FAILED,
            _ => STATUS_VALIDATION_FAILED,
        }
    }
}

/// A specialized Result type for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;
