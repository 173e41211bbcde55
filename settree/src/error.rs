//! Error types for tree resolution and mutation.
//!
//! Validation problems (missing required values, out-of-range numbers, dangling
//! links) are *not* errors: they are recorded on the setting as an error
//! message. The variants here describe caller or schema mistakes.

use thiserror::Error;

use crate::path::Path;

/// Errors raised by the editor and the settings it materializes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    /// The schema has no node at the requested path.
    #[error("Path not found in schema: `{path}`")]
    PathNotFound { path: String },

    /// A setting exists at the path but has a different kind.
    #[error("Type mismatch at `{path}`: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A directive payload could not be parsed.
    #[error("Invalid `{directive}` directive at `{path}`: {reason}")]
    InvalidDirective {
        path: String,
        directive: String,
        reason: String,
    },

    /// The schema node cannot be turned into a setting.
    #[error("Unsupported schema at `{path}`: {reason}")]
    UnsupportedSchema { path: String, reason: String },

    /// A link directive does not match the schema of its target.
    #[error("Link configuration error at `{path}`: {reason}")]
    LinkConfig { path: String, reason: String },

    /// Resolving link options re-entered a link that is already resolving.
    #[error("Link options cycle detected at `{path}`")]
    LinkCycle { path: String },

    /// A required setting cannot be removed from the document.
    #[error("Cannot unset required setting `{path}`")]
    RequiredUnset { path: String },

    /// The value passed to `set` has the wrong JSON type.
    #[error("Invalid value for `{path}`: {reason}")]
    InvalidValue { path: String, reason: String },

    /// The operation is not defined for this kind of setting.
    #[error("Operation `{operation}` is not supported by `{path}`")]
    Unsupported { path: String, operation: String },

    /// An array index past the end of the sequence at `path`.
    #[error("Index {index} out of bounds at `{path}` (len {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    /// The editor owning a setting has been dropped.
    #[error("Editor has been dropped")]
    EditorDropped,
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn path_not_found(path: &Path) -> Self {
        Error::PathNotFound {
            path: path.to_string(),
        }
    }

    pub(crate) fn link_config(path: &Path, reason: impl Into<String>) -> Self {
        Error::LinkConfig {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(path: &Path, reason: impl Into<String>) -> Self {
        Error::InvalidValue {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(path: &Path, operation: &str) -> Self {
        Error::Unsupported {
            path: path.to_string(),
            operation: operation.to_string(),
        }
    }
}
