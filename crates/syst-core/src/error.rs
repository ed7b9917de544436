//! Error types for syst-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in syst-core
///
/// Every variant is terminal for the run: the binaries report the error and
/// exit before writing any output.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad flag combination or insufficient arguments, rejected before any
    /// table I/O
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed input line
    #[error("{file}:{line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },

    /// Unparsable numeric string
    #[error("cannot interpret \"{value}\" as a number for \"{field}\" in variable \"{variable}\"")]
    NumericFormat {
        value: String,
        field: String,
        variable: String,
    },

    /// A field required by a stage is absent from a variable
    #[error("no \"{field}\" field in variable \"{variable}\"")]
    MissingField { field: String, variable: String },

    /// A variable has no bin edges
    #[error("no bins for variable \"{variable}\"")]
    EmptyBinning { variable: String },

    /// A field's value count does not match the variable's bin count
    #[error("{count} \"{field}\" values for variable \"{variable}\" with {bins} bins")]
    BinCountMismatch {
        variable: String,
        field: String,
        count: usize,
        bins: usize,
    },

    /// Incompatible bin edges across merged inputs
    #[error("incompatible binning for variable \"{variable}\" from \"{origin}\"")]
    BinningMismatch { variable: String, origin: String },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a `NumericFormat` error with its context
    pub fn numeric(value: &str, field: &str, variable: &str) -> Self {
        Error::NumericFormat {
            value: value.to_string(),
            field: field.to_string(),
            variable: variable.to_string(),
        }
    }
}
