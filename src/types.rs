//! Core data types for the spectra downloader.
//!
//! These types represent the parsed pieces of an SSAP VOTABLE response:
//! column metadata, data rows, DataLink parameter descriptions, and the
//! per-item outcome of a download run.

use std::collections::HashMap;

use crate::error::DownloaderError;

/// Name of the external parameter holding a DataLink service access URL.
pub const ACCESS_URL_PARAM: &str = "accessURL";

/// Static metadata about one column of the results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: String,

    /// Semantic tag (namespaced identifier) used to recognize special
    /// columns, compared case-insensitively.
    pub utype: String,
}

impl Field {
    /// Create a new field.
    #[must_use]
    pub fn new(name: impl Into<String>, utype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            utype: utype.into(),
        }
    }
}

/// One permitted discrete value of a DataLink input parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamOption {
    /// Display name of the choice.
    pub name: String,

    /// Value submitted to the service.
    pub value: String,
}

impl ParamOption {
    /// Create a new option.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One DataLink protocol parameter parsed from a PARAM tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name as declared by the service.
    pub name: String,

    /// Default or fixed value.
    pub value: String,

    /// Permitted discrete values, in document order.
    pub options: Vec<ParamOption>,

    /// Whether this parameter must be bound to a record's publisher
    /// identifier at request time.
    pub id_param: bool,
}

impl Param {
    /// Create a new parameter without options.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            options: Vec::new(),
            id_param: false,
        }
    }

    /// Append a permitted value.
    pub fn add_option(&mut self, option: ParamOption) {
        self.options.push(option);
    }

    /// Mark this parameter as the identity parameter.
    pub fn set_id(&mut self) {
        self.id_param = true;
    }
}

/// One parsed data row; column order matches the field order of the same
/// parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Cell values, in field order.
    pub columns: Vec<String>,
}

impl Record {
    /// Create a new record from its cell values.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

/// A tentative DataLink service descriptor found in one auxiliary RESOURCE
/// block.
///
/// Several of these can occur in one document; the parser collects every
/// proper candidate and selects the best match afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PossibleDatalink {
    /// Parameters declared inside the `inputParams` GROUP, in document order.
    pub input_params: Vec<Param>,

    /// Remaining parameters of the resource, keyed by name. Later
    /// declarations overwrite earlier ones with the same name.
    pub external_params: HashMap<String, Param>,
}

impl PossibleDatalink {
    /// Whether this candidate has the shape of a DataLink descriptor: an
    /// `accessURL` external parameter and at least one input parameter.
    #[must_use]
    pub fn is_proper(&self) -> bool {
        self.external_params.contains_key(ACCESS_URL_PARAM) && !self.input_params.is_empty()
    }

    /// The service access URL, if declared.
    #[must_use]
    pub fn access_url(&self) -> Option<&str> {
        self.external_params
            .get(ACCESS_URL_PARAM)
            .map(|p| p.value.as_str())
    }
}

/// Outcome of one attempted spectrum download.
#[derive(Debug)]
pub struct DownloadResult {
    /// File name the spectrum was (or would have been) saved under.
    pub name: String,

    /// Resolved download URL, absent when no access reference was available.
    pub url: Option<String>,

    /// The error that failed this item, if any.
    pub error: Option<DownloaderError>,
}

impl DownloadResult {
    /// Create a successful outcome.
    #[must_use]
    pub fn ok(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            error: None,
        }
    }

    /// Create a failed outcome.
    #[must_use]
    pub fn failed(name: impl Into<String>, url: Option<String>, error: DownloaderError) -> Self {
        Self {
            name: name.into(),
            url,
            error: Some(error),
        }
    }

    /// Whether this item downloaded successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}
