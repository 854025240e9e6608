//! Error types for the spectra downloader.
//!
//! A single `DownloaderError` enum serves both library consumers and the CLI.
//! Pre-flight errors (malformed document, empty selection, storage setup,
//! DataLink unavailability) abort an invocation synchronously; the remaining
//! variants are recorded per downloaded item and never abort sibling items.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the spectra downloader library.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// The underlying XML tokenizer reported invalid syntax.
    #[error("Malformed VOTABLE document: {0}")]
    MalformedDocument(#[from] quick_xml::Error),

    /// An XML attribute could not be parsed.
    #[error("Malformed attribute in VOTABLE document: {0}")]
    MalformedAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// HTTP request failed (connection, timeout, protocol).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a status other than 200 OK.
    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// Download was requested with an empty record selection.
    #[error("At least one record must be selected for download")]
    EmptySelection,

    /// DataLink download requested but the protocol is not available.
    #[error("DataLink protocol is not available: {0}")]
    DatalinkUnavailable(String),

    /// Target directory could not be created.
    #[error("Failed to create target directory {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target file already exists; existing files are never overwritten.
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Record carries no access reference URL to download from.
    #[error("Record has no access reference URL")]
    MissingAccessReference,

    /// Record carries no publisher identifier to build a DataLink request
    /// from.
    #[error("Record has no publisher identifier")]
    MissingPublisherId,

    /// Row selection argument could not be resolved against the table.
    #[error("Invalid row selection: {0}")]
    InvalidSelection(String),

    /// Query parameter argument is not of the form `KEY=VALUE`.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// IO error while writing a downloaded file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Background download worker terminated abnormally.
    #[error("Download worker thread panicked")]
    WorkerPanicked,
}

/// Result type alias for downloader operations.
pub type Result<T> = std::result::Result<T, DownloaderError>;
