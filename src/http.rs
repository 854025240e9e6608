//! HTTP client wrapper for talking to SSAP and DataLink services.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::error::{DownloaderError, Result};

/// User agent string identifying this downloader.
const USER_AGENT: &str = concat!("spectra-downloader/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
///
/// # Arguments
/// * `timeout` - Per-request timeout, applied to every request made with the
///   returned client
///
/// # Returns
/// A `reqwest::blocking::Client` configured with the timeout and user agent.
pub fn create_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Fetch a VOTABLE document from an SSAP query URL.
///
/// # Arguments
/// * `client` - HTTP client to use
/// * `url` - Constructed SSAP query URL
///
/// # Returns
/// The response body as text. Any status other than 200 OK is an error:
/// SSAP services report query-level problems inside the VOTABLE itself, so a
/// non-200 answer means the request never reached the service proper.
pub fn fetch_votable(client: &Client, url: &str) -> Result<String> {
    tracing::debug!(url, "Fetching SSAP VOTABLE");
    let response = client.get(url).send()?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(DownloaderError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.text()?)
}
