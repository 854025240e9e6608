//! Spectra Downloader - Parse SSAP query results and download spectra.
//!
//! This crate parses VOTABLE documents returned by Simple Spectral Access
//! (SSAP) services, indexes the result table, and downloads the referenced
//! spectra either directly through each record's access reference or through
//! the service's DataLink endpoint.
//!
//! # Example
//!
//! ```
//! use spectra_downloader::config;
//!
//! // Derive local file names from access reference URLs
//! assert_eq!(config::file_name_from_url("http://host/spectra/tg160037.fit?x=1"), "tg160037.fit");
//! assert_eq!(config::file_stem_from_url("http://host/spectra/tg160037.fit"), "tg160037");
//! ```
//!
//! # Architecture
//!
//! The downloader is organized into several modules:
//!
//! - [`config`]: Constants, URL helpers and MIME type mapping
//! - [`types`]: Core data types (Field, Record, Param, DownloadResult)
//! - [`error`]: Error types and Result alias
//! - [`parser`]: Streaming SSAP VOTABLE parser
//! - [`votable`]: Indexed parse result with DataLink activation
//! - [`http`]: HTTP client for SSAP and DataLink services
//! - [`downloader`]: Download orchestration (blocking or background)
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod parser;
pub mod types;
pub mod votable;

// Re-export main functions
pub use parser::parse_ssap;

// Re-export commonly used items
pub use downloader::{
    DownloadCallbacks, DownloadReport, DownloadRun, ExecutionMode, SpectraDownloader,
};
pub use error::{DownloaderError, Result};
pub use types::{DownloadResult, Field, Param, ParamOption, Record};
pub use votable::{DatalinkEndpoint, IndexedVotable};
