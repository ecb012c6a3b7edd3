//! Error types for report rendering.
//!
//! [`ReportError`] is what callers see from a render.  Per-photo problems are
//! described by [`FetchError`]; those never abort a render and only show up in
//! logs and in the skipped list of a render summary.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The main error type for report operations.
#[derive(Error, Debug)]
pub enum ReportError {
    /// No registration exists for the requested identifier.
    #[error("registration {id} not found")]
    NotFound {
        /// The identifier that was looked up.
        id: i64,
    },

    /// A record store query failed.
    #[error("record store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// Fonts required for layout could not be loaded.
    #[error("failed to load fonts: {0}")]
    Font(#[source] genpdf::error::Error),

    /// The document could not be laid out.
    #[error("failed to lay out report: {0}")]
    Layout(#[source] genpdf::error::Error),

    /// The output sink stopped accepting bytes.
    #[error("output sink failed: {0}")]
    Sink(#[source] io::Error),

    /// The temporary asset directory could not be prepared.
    #[error("failed to prepare temporary assets in {path}: {source}")]
    TempAsset {
        /// Directory that was being prepared.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The HTTP listener could not be bound or stopped with an error.
    #[error("failed to serve on {addr}: {source}")]
    Serve {
        /// Address the listener was bound to.
        addr: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// An internal error occurred (bug or panicked worker).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;

impl From<figment::Error> for ReportError {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl ReportError {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the registration does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was raised by the output sink.
    #[must_use]
    pub fn is_sink_failure(&self) -> bool {
        matches!(self, Self::Sink(_))
    }
}

/// Reasons a single photo could not be retrieved.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or its body could not be read.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The remote host answered with a non-success status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// The fetch did not finish within the configured timeout.
    #[error("fetching {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    /// The fetcher has no way to resolve this reference.
    #[error("no asset available for {url}")]
    Unavailable { url: String },
}
