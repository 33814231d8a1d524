//! Error types for trueno-gg operations.

use std::io;
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or rendering a plot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A mapping references a column that does not exist in the layer's data.
    #[error("Unknown column '{column}' (available: {available})")]
    UnknownColumn {
        /// Requested column name.
        column: String,
        /// Comma-separated list of the columns that do exist.
        available: String,
    },

    /// A group is too small for the selected statistic.
    #[error("Insufficient data for {stat}: group '{group}' has {found} observations, {required} required")]
    InsufficientData {
        /// Stat or fitting method name.
        stat: String,
        /// Human-readable group key.
        group: String,
        /// Observations required.
        required: usize,
        /// Observations present.
        found: usize,
    },

    /// A channel received both continuous and discrete data on one shared scale.
    #[error("Incompatible scale for '{channel}': {detail}")]
    IncompatibleScale {
        /// Channel name.
        channel: String,
        /// Description of the conflict.
        detail: String,
    },

    /// A computed mapping expression could not be parsed or evaluated.
    #[error("Invalid expression '{expr}': {reason}")]
    InvalidExpression {
        /// Expression source text.
        expr: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A layer or stat parameter is out of range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A stat, geom or method name was not recognized.
    #[error("Unknown {kind} '{name}'")]
    UnknownName {
        /// Kind of name (stat, geom, method, ...).
        kind: &'static str,
        /// The unrecognized name.
        name: String,
    },

    /// Scale domain error (e.g., log of non-positive value).
    #[error("Scale domain error: {0}")]
    ScaleDomain(String),

    /// Empty data provided where non-empty is required.
    #[error("Empty data provided")]
    EmptyData,

    /// Data length mismatch between columns.
    #[error("Data length mismatch: column '{column}' has {len} rows, expected {expected}")]
    DataLengthMismatch {
        /// Column name.
        column: String,
        /// Length of the offending column.
        len: usize,
        /// Expected row count.
        expected: usize,
    },

    /// A curve fitter rejected its input.
    #[error("Curve fitting failed: {0}")]
    Fit(String),

    /// Configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (config file loading).
    #[error("I/O error: {0}")]
    Io(String),

    /// Every error collected during the discovery pass.
    #[error("{} error(s) during scale discovery: {}", .0.len(), join_errors(.0))]
    Discovery(Vec<Error>),
}

impl Error {
    /// Build an [`Error::UnknownColumn`] listing the columns that are available.
    #[must_use]
    pub fn unknown_column<'a>(column: &str, available: impl IntoIterator<Item = &'a str>) -> Self {
        Error::UnknownColumn {
            column: column.to_string(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    /// Flatten nested [`Error::Discovery`] values into their leaf errors.
    #[must_use]
    pub fn into_leaves(self) -> Vec<Error> {
        match self {
            Error::Discovery(errors) => errors.into_iter().flat_map(Error::into_leaves).collect(),
            other => vec![other],
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Error::Config(err.to_string())
    }
}

fn join_errors(errors: &[Error]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_lists_available() {
        let err = Error::unknown_column("hwy", ["displ", "cty"]);
        let msg = err.to_string();
        assert!(msg.contains("hwy"));
        assert!(msg.contains("displ, cty"));
    }

    #[test]
    fn test_insufficient_data_display() {
        let err = Error::InsufficientData {
            stat: "linear".into(),
            group: "f".into(),
            required: 2,
            found: 1,
        };
        assert!(err.to_string().contains("2 required"));
    }

    #[test]
    fn test_discovery_flattens() {
        let nested = Error::Discovery(vec![
            Error::EmptyData,
            Error::Discovery(vec![Error::ScaleDomain("x".into()), Error::EmptyData]),
        ]);
        assert!(nested.to_string().starts_with("2 error(s)"));
        assert_eq!(nested.into_leaves().len(), 3);
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(matches!(err, Error::Io(_)));
    }
}
