//! Error and warning types for list-file parsing.
//!
//! Hard failures abort the load of one list file and surface as
//! [`LabelsError`]. A single malformed line only produces a
//! [`ParseWarning`]; parsing continues with the next line.

use std::fmt;
use std::path::PathBuf;

use memory_model::{ConfigurationError, QueryError};
use thiserror::Error;

/// A failure that aborts loading a list file.
#[derive(Debug, Error)]
pub enum LabelsError {
    /// The list, map or config file could not be read.
    #[error("Could not read '{}': {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// A configured path is not a valid glob pattern.
    #[error("Invalid path pattern '{pattern}': {message}")]
    Glob {
        /// Pattern as configured.
        pattern: String,
        /// Description from the glob parser.
        message: String,
    },
    /// The `filter` setting is not of the form `/search/replace/`.
    #[error("Invalid filter '{0}', expected '/search/replace/'.")]
    Filter(String),
    /// A regular expression failed to compile.
    #[error("Invalid regular expression: {0}")]
    Regex(#[from] regex::Error),
    /// The SLD file was produced for a device with no bank translation.
    #[error("Unsupported memory model '{0}' in SLD file.")]
    UnsupportedSourceModel(String),
    /// A revEng bank does not exist in the target model.
    #[error("Bank {bank} not available in '{model}'.")]
    BankNotAvailable {
        /// Bank as written in the list file.
        bank: String,
        /// Name of the target memory model.
        model: String,
    },
    /// The dialect needs a map file but none is configured.
    #[error("'{0}' requires a map file ('mapFile').")]
    MissingMapFile(String),
    /// A bank lookup against the target model failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The target memory model could not be built.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The JSON configuration is malformed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// One or more list files failed; holds the last message.
    #[error("Error during parsing of the list/sld file(s).\n{0}")]
    Aggregated(String),
}

impl LabelsError {
    /// Wraps an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A non-fatal problem with one line of a list file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// File the line belongs to.
    pub file: String,
    /// 0-based line number in `file`.
    pub line: usize,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line + 1, self.message)
    }
}
