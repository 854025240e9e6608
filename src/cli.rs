//! Command-line interface for the spectra downloader.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::DEFAULT_DOWNLOAD_TIMEOUT_SECS;
use crate::downloader::{DownloadCallbacks, ExecutionMode, SpectraDownloader};
use crate::error::{DownloaderError, Result};
use crate::http::{create_client, fetch_votable};
use crate::parser::parse_ssap;
use crate::types::Record;

/// Spectra Downloader - Parse SSAP query results and download spectra.
#[derive(Parser)]
#[command(name = "spectra-downloader")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse an SSAP VOTABLE and print its structure.
    Inspect {
        /// VOTABLE source: a local file path or an http(s) SSAP query URL
        source: String,
    },

    /// Download spectra listed in an SSAP VOTABLE.
    Download {
        /// VOTABLE source: a local file path or an http(s) SSAP query URL
        source: String,

        /// Target directory for downloaded spectra
        #[arg(short, long, default_value = "spectra")]
        output: PathBuf,

        /// 1-based rows to download, e.g. "1,3,5-8" (default: all rows)
        #[arg(short, long)]
        rows: Option<String>,

        /// Download through the DataLink service instead of access references
        #[arg(long)]
        datalink: bool,

        /// DataLink query parameter as KEY=VALUE (repeatable)
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
        timeout: u64,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { source } => inspect_command(&source),
        Commands::Download {
            source,
            output,
            rows,
            datalink,
            params,
            timeout,
        } => download_command(&source, &output, rows.as_deref(), datalink, &params, timeout),
    }
}

/// Build a downloader from a local file or an SSAP query URL.
fn load_downloader(source: &str, timeout: u64) -> Result<SpectraDownloader> {
    let timeout = Duration::from_secs(timeout);
    let document = if source.starts_with("http://") || source.starts_with("https://") {
        let client = create_client(timeout)?;
        fetch_votable(&client, source)?
    } else {
        std::fs::read_to_string(source)?
    };
    SpectraDownloader::with_timeout(parse_ssap(&document)?, timeout)
}

/// Parse a 1-based row selection like `1,3,5-8` into zero-based indices.
fn parse_row_selection(selection: &str, total: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for part in selection.split(',') {
        let part = part.trim();
        let (start, end) = match part.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (part, part),
        };
        let start: usize = start
            .parse()
            .map_err(|_| DownloaderError::InvalidSelection(format!("'{part}' is not a row number")))?;
        let end: usize = end
            .parse()
            .map_err(|_| DownloaderError::InvalidSelection(format!("'{part}' is not a row number")))?;
        if start == 0 || end < start || end > total {
            return Err(DownloaderError::InvalidSelection(format!(
                "'{part}' is out of range (1-{total})"
            )));
        }
        indices.extend(start - 1..end);
    }
    Ok(indices)
}

/// Parse repeated `KEY=VALUE` arguments into ordered pairs.
fn parse_parameters(params: &[String]) -> Result<Vec<(String, String)>> {
    params
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| {
                    DownloaderError::InvalidParameter(format!("'{raw}', expected KEY=VALUE"))
                })
        })
        .collect()
}

/// Execute the inspect command.
fn inspect_command(source: &str) -> Result<()> {
    let downloader = load_downloader(source, DEFAULT_DOWNLOAD_TIMEOUT_SECS)?;
    let votable = downloader.votable();

    let status = if votable.query_ok() {
        style(votable.query_status()).green()
    } else {
        style(votable.query_status()).red()
    };
    println!("{} {}", style("Query status:").bold(), status);
    println!("{} {}", style("Rows:").bold(), votable.records().len());

    println!("{}", style("Fields:").bold());
    for field in votable.fields() {
        println!("  {} ({})", field.name, style(&field.utype).dim());
    }

    match votable.datalink() {
        Some(endpoint) => {
            println!(
                "{} {}",
                style("DataLink:").bold(),
                style("available").green()
            );
            println!("  Service URL: {}", endpoint.resource_url);
            for param in &endpoint.input_params {
                let marker = if param.id_param { " [identity]" } else { "" };
                println!(
                    "  Param {}={}{}",
                    param.name,
                    param.value,
                    style(marker).cyan()
                );
                for option in &param.options {
                    println!("    option {} = {}", option.name, option.value);
                }
            }
        }
        None => {
            println!(
                "{} {}",
                style("DataLink:").bold(),
                style("not available").yellow()
            );
        }
    }

    Ok(())
}

/// Execute the download command.
fn download_command(
    source: &str,
    output: &std::path::Path,
    rows: Option<&str>,
    datalink: bool,
    params: &[String],
    timeout: u64,
) -> Result<()> {
    let parameters = parse_parameters(params)?;
    let downloader = load_downloader(source, timeout)?;
    let votable = downloader.votable();

    if !votable.query_ok() {
        println!(
            "{} query status is {}, results may be incomplete",
            style("Warning:").yellow().bold(),
            style(votable.query_status()).red()
        );
    }

    let records: Vec<Record> = match rows {
        Some(selection) => {
            let indices = parse_row_selection(selection, votable.records().len())?;
            indices
                .into_iter()
                .map(|i| votable.records()[i].clone())
                .collect()
        }
        None => votable.records().to_vec(),
    };

    println!(
        "{} {} spectra to {}",
        style("Downloading").bold(),
        style(records.len()).cyan(),
        style(output.display()).green()
    );

    let bar = ProgressBar::new(records.len() as u64);
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("valid template"),
    );

    let progress_bar = bar.clone();
    let callbacks = DownloadCallbacks::new().on_progress(move |result| {
        if let Some(error) = &result.error {
            progress_bar.println(format!("  {} {}: {}", style("✗").red(), result.name, error));
        }
        progress_bar.set_message(result.name.clone());
        progress_bar.inc(1);
    });

    let run = if datalink {
        downloader.download_via_datalink(
            &records,
            &parameters,
            output,
            callbacks,
            ExecutionMode::Blocking,
        )?
    } else {
        downloader.download_direct(&records, output, callbacks, ExecutionMode::Blocking)?
    };

    let report = run.wait()?;
    bar.finish_and_clear();

    let downloaded = report.results.iter().filter(|r| r.success()).count();
    let failed = report.results.len() - downloaded;
    if report.success {
        println!(
            "{} {} spectra saved to {}",
            style("Done:").green().bold(),
            downloaded,
            output.display()
        );
    } else {
        println!(
            "{} {} downloaded, {} failed",
            style("Finished with errors:").yellow().bold(),
            downloaded,
            style(failed).red()
        );
    }

    Ok(())
}
