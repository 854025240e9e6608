//! Download orchestrator for spectra listed in an SSAP query result.
//!
//! [`SpectraDownloader`] turns indexed records into concrete URLs (directly
//! via the access reference column, or through a DataLink service), fetches
//! them one at a time, classifies every per-item outcome, and aggregates the
//! outcomes into a single report. Per-item progress and the aggregate verdict
//! are reported through caller-supplied callbacks; the full report is
//! returned as an owned value from every invocation.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::config::{
    build_datalink_url, extension_for_mime, file_name_from_url, file_stem_from_url,
    DEFAULT_DOWNLOAD_TIMEOUT_SECS, DOWNLOAD_CHUNK_SIZE,
};
use crate::error::{DownloaderError, Result};
use crate::http::{create_client, fetch_votable};
use crate::parser::parse_ssap;
use crate::types::{DownloadResult, Record};
use crate::votable::IndexedVotable;

/// Per-item progress callback, invoked once per processed record in row
/// order, for failures as well as successes.
pub type ProgressFn = Box<dyn Fn(&DownloadResult) + Send + 'static>;

/// Completion callback, invoked once with the aggregate success flag after
/// every record has been processed.
pub type DoneFn = Box<dyn FnOnce(bool) + Send + 'static>;

/// Caller-supplied notification hooks for one download run.
#[derive(Default)]
pub struct DownloadCallbacks {
    on_progress: Option<ProgressFn>,
    on_done: Option<DoneFn>,
}

impl DownloadCallbacks {
    /// Create an empty callback set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-item progress callback.
    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(&DownloadResult) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Set the completion callback.
    #[must_use]
    pub fn on_done(mut self, callback: impl FnOnce(bool) + Send + 'static) -> Self {
        self.on_done = Some(Box::new(callback));
        self
    }
}

/// Where the per-item download loop runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run in the caller's thread; the entry point returns after the whole
    /// sequence (and the completion callback) has finished.
    Blocking,

    /// Run on one dedicated worker thread; the entry point returns
    /// immediately after scheduling. Items are still processed strictly
    /// sequentially; this is a single worker, never a pool.
    Background,
}

/// Aggregate result of one download invocation.
#[derive(Debug)]
pub struct DownloadReport {
    /// Per-record outcomes, in the order the records were passed.
    pub results: Vec<DownloadResult>,

    /// Logical AND of every item's success.
    pub success: bool,
}

/// Handle to one scheduled download invocation.
#[derive(Debug)]
pub enum DownloadRun {
    /// The run completed inline; the report is immediately available.
    Finished(DownloadReport),

    /// The run executes on a background worker thread.
    Background(thread::JoinHandle<DownloadReport>),
}

impl DownloadRun {
    /// Wait for the run to finish and take ownership of its report.
    ///
    /// # Errors
    /// `DownloaderError::WorkerPanicked` if the background worker terminated
    /// abnormally.
    pub fn wait(self) -> Result<DownloadReport> {
        match self {
            Self::Finished(report) => Ok(report),
            Self::Background(handle) => {
                handle.join().map_err(|_| DownloaderError::WorkerPanicked)
            }
        }
    }
}

/// One fully resolved download item. URL resolution is pure and happens
/// before any network activity; a record without an access reference keeps
/// `url: None` and fails at processing time without aborting its siblings.
struct PlanItem {
    name: String,
    url: Option<String>,
    datalink: bool,
}

/// Pre-flight output: everything the processing loop needs, owned, so the
/// loop can run on a worker thread without borrowing the downloader.
struct DownloadPlan {
    items: Vec<PlanItem>,
    target_dir: PathBuf,
}

/// Downloading utility for spectra listed in an SSAP query result.
///
/// Constructed from a parsed [`IndexedVotable`], or via the factory
/// constructors from VOTABLE text, a local file, or an SSAP query URL.
#[derive(Debug)]
pub struct SpectraDownloader {
    votable: Arc<IndexedVotable>,
    client: Client,
}

impl SpectraDownloader {
    /// Create a downloader with the default per-request timeout.
    pub fn new(votable: IndexedVotable) -> Result<Self> {
        Self::with_timeout(votable, Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))
    }

    /// Create a downloader with a custom per-request timeout.
    pub fn with_timeout(votable: IndexedVotable, timeout: Duration) -> Result<Self> {
        Ok(Self {
            votable: Arc::new(votable),
            client: create_client(timeout)?,
        })
    }

    /// Create a downloader by parsing VOTABLE text.
    pub fn from_string(document: &str) -> Result<Self> {
        Self::new(parse_ssap(document)?)
    }

    /// Create a downloader by parsing a VOTABLE file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = fs::read_to_string(path)?;
        Self::from_string(&document)
    }

    /// Create a downloader by issuing the SSAP query at `url` and parsing
    /// the response body.
    ///
    /// # Errors
    /// `DownloaderError::UnexpectedStatus` when the service answers with a
    /// status other than 200 OK.
    pub fn from_url(url: &str) -> Result<Self> {
        let client = create_client(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS))?;
        let document = fetch_votable(&client, url)?;
        Self::from_string(&document)
    }

    /// The parsed table this downloader serves.
    #[must_use]
    pub fn votable(&self) -> &IndexedVotable {
        &self.votable
    }

    /// Download the selected records via their access reference URLs.
    ///
    /// File names are the final path segment of each access reference, with
    /// any query string stripped.
    ///
    /// # Arguments
    /// * `records` - Non-empty selection of records from this table
    /// * `target_dir` - Directory to save into, created if missing
    /// * `callbacks` - Progress/completion hooks
    /// * `mode` - Inline or background execution
    ///
    /// # Errors
    /// `EmptySelection` for an empty selection; `Storage` when the target
    /// directory cannot be created. Per-item failures are reported through
    /// the returned [`DownloadRun`], never as an `Err`.
    pub fn download_direct(
        &self,
        records: &[Record],
        target_dir: &Path,
        callbacks: DownloadCallbacks,
        mode: ExecutionMode,
    ) -> Result<DownloadRun> {
        let plan = self.plan_direct(records, target_dir)?;
        self.execute(plan, callbacks, mode)
    }

    /// Download the selected records through the document's DataLink service.
    ///
    /// Each request URL is the DataLink resource URL plus the caller-supplied
    /// query parameters and the identity parameter bound to the record's
    /// publisher identifier. File names are the access-reference name without
    /// extension; the extension is resolved from the response `Content-Type`
    /// where the media type is known.
    ///
    /// # Arguments
    /// * `records` - Non-empty selection of records from this table
    /// * `parameters` - Query parameters, in order; a key case-insensitively
    ///   equal to `"id"` is discarded in favor of the identity binding
    /// * `target_dir` - Directory to save into, created if missing
    /// * `callbacks` - Progress/completion hooks
    /// * `mode` - Inline or background execution
    ///
    /// # Errors
    /// `DatalinkUnavailable` when the table has no activated DataLink
    /// configuration, plus the same pre-flight errors as
    /// [`download_direct`](Self::download_direct).
    pub fn download_via_datalink(
        &self,
        records: &[Record],
        parameters: &[(String, String)],
        target_dir: &Path,
        callbacks: DownloadCallbacks,
        mode: ExecutionMode,
    ) -> Result<DownloadRun> {
        let plan = self.plan_datalink(records, parameters, target_dir)?;
        self.execute(plan, callbacks, mode)
    }

    fn plan_direct(&self, records: &[Record], target_dir: &Path) -> Result<DownloadPlan> {
        validate_selection(records)?;
        ensure_target_dir(target_dir)?;

        let items = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let url = self.votable.accref(record).map(String::from);
                let name = url
                    .as_deref()
                    .map(file_name_from_url)
                    .unwrap_or_else(|| format!("record-{index}"));
                PlanItem {
                    name,
                    url,
                    datalink: false,
                }
            })
            .collect();

        Ok(DownloadPlan {
            items,
            target_dir: target_dir.to_path_buf(),
        })
    }

    fn plan_datalink(
        &self,
        records: &[Record],
        parameters: &[(String, String)],
        target_dir: &Path,
    ) -> Result<DownloadPlan> {
        validate_selection(records)?;
        ensure_target_dir(target_dir)?;

        let endpoint = self.votable.datalink().ok_or_else(|| {
            DownloaderError::DatalinkUnavailable(
                "document does not describe a DataLink service".to_string(),
            )
        })?;
        // Guaranteed by the activation invariant, but checked defensively.
        let id_param = endpoint.identity_param().ok_or_else(|| {
            DownloaderError::DatalinkUnavailable(
                "no identity input parameter declared".to_string(),
            )
        })?;

        let items = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let url = self.votable.pubdid(record).map(|pubdid| {
                    build_datalink_url(&endpoint.resource_url, parameters, &id_param.name, pubdid)
                });
                let name = self
                    .votable
                    .accref(record)
                    .map(file_stem_from_url)
                    .unwrap_or_else(|| format!("record-{index}"));
                PlanItem {
                    name,
                    url,
                    datalink: true,
                }
            })
            .collect();

        Ok(DownloadPlan {
            items,
            target_dir: target_dir.to_path_buf(),
        })
    }

    fn execute(
        &self,
        plan: DownloadPlan,
        callbacks: DownloadCallbacks,
        mode: ExecutionMode,
    ) -> Result<DownloadRun> {
        match mode {
            ExecutionMode::Blocking => Ok(DownloadRun::Finished(process_download(
                &self.client,
                plan,
                callbacks,
            ))),
            ExecutionMode::Background => {
                let client = self.client.clone();
                let handle = thread::Builder::new()
                    .name("spectra-download".to_string())
                    .spawn(move || process_download(&client, plan, callbacks))?;
                Ok(DownloadRun::Background(handle))
            }
        }
    }
}

fn validate_selection(records: &[Record]) -> Result<()> {
    if records.is_empty() {
        return Err(DownloaderError::EmptySelection);
    }
    Ok(())
}

fn ensure_target_dir(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir).map_err(|source| DownloaderError::Storage {
        path: target_dir.to_path_buf(),
        source,
    })
}

/// Shared processing loop of both download modes.
///
/// Items are processed strictly sequentially; every per-item error is caught,
/// recorded, and reported without aborting the remaining items.
fn process_download(
    client: &Client,
    plan: DownloadPlan,
    callbacks: DownloadCallbacks,
) -> DownloadReport {
    let DownloadCallbacks {
        on_progress,
        on_done,
    } = callbacks;

    let mut results = Vec::with_capacity(plan.items.len());
    for item in &plan.items {
        let result = match fetch_item(client, item, &plan.target_dir) {
            Ok(file_name) => {
                tracing::debug!(name = %file_name, "Downloaded spectrum");
                DownloadResult::ok(file_name, item.url.clone())
            }
            Err(error) => {
                tracing::warn!(name = %item.name, %error, "Spectrum download failed");
                DownloadResult::failed(item.name.clone(), item.url.clone(), error)
            }
        };
        if let Some(callback) = &on_progress {
            callback(&result);
        }
        results.push(result);
    }

    let success = results.iter().all(DownloadResult::success);
    tracing::info!(
        total = results.len(),
        failed = results.iter().filter(|r| !r.success()).count(),
        "Download sequence finished"
    );

    if let Some(callback) = on_done {
        callback(success);
    }

    DownloadReport { results, success }
}

/// Fetch one item and stream it to disk.
///
/// Returns the final file name (extension resolution included) on success.
fn fetch_item(client: &Client, item: &PlanItem, target_dir: &Path) -> Result<String> {
    let url = item.url.as_deref().ok_or(if item.datalink {
        DownloaderError::MissingPublisherId
    } else {
        DownloaderError::MissingAccessReference
    })?;

    let mut response = client.get(url).send()?;
    let status = response.status();
    if status != StatusCode::OK {
        return Err(DownloaderError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    let mut file_name = item.name.clone();
    if item.datalink {
        // DataLink names carry no extension; resolve one from the media type.
        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(extension_for_mime);
        if let Some(extension) = extension {
            file_name.push('.');
            file_name.push_str(extension);
        }
    }

    let path = target_dir.join(&file_name);
    if path.exists() {
        return Err(DownloaderError::AlreadyExists(path));
    }

    let mut file = File::create(&path)?;
    let mut chunk = [0u8; DOWNLOAD_CHUNK_SIZE];
    loop {
        let read = response.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        file.write_all(&chunk[..read])?;
    }

    Ok(file_name)
}
