//! Indexed SSAP VOTABLE, the result of a parse.
//!
//! Wraps the parsed field list and rows with column-name-to-index resolution
//! for the two semantically significant columns (access reference, publisher
//! identifier) and the activated DataLink configuration, if any.

use crate::config::{file_name_from_url, ACCREF_COLUMN_UTYPE, PUBDID_COLUMN_UTYPE};
use crate::types::{Field, Param, Record};

/// Activated DataLink configuration of a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct DatalinkEndpoint {
    /// Access URL of the DataLink service.
    pub resource_url: String,

    /// Declared input parameters, in document order.
    pub input_params: Vec<Param>,
}

impl DatalinkEndpoint {
    /// The input parameter that must be bound to a record's publisher
    /// identifier at request time.
    #[must_use]
    pub fn identity_param(&self) -> Option<&Param> {
        self.input_params.iter().find(|p| p.id_param)
    }
}

/// Parse result of an SSAP VOTABLE document.
///
/// Constructed once by the parser; [`setup_datalink`](Self::setup_datalink)
/// may activate the DataLink configuration at most once, afterwards the
/// table is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVotable {
    query_status: String,
    fields: Vec<Field>,
    records: Vec<Record>,
    accref_index: Option<usize>,
    pubdid_index: Option<usize>,
    datalink: Option<DatalinkEndpoint>,
}

impl IndexedVotable {
    /// Create a new indexed table from the accumulated parse state.
    ///
    /// The access-reference and publisher-identifier column indices are
    /// resolved here, once, by case-insensitive utype match.
    #[must_use]
    pub fn new(query_status: String, fields: Vec<Field>, records: Vec<Record>) -> Self {
        let mut accref_index = None;
        let mut pubdid_index = None;
        for (index, field) in fields.iter().enumerate() {
            let utype = field.utype.to_lowercase();
            if utype == ACCREF_COLUMN_UTYPE {
                accref_index = Some(index);
            } else if utype == PUBDID_COLUMN_UTYPE {
                pubdid_index = Some(index);
            }
        }

        Self {
            query_status,
            fields,
            records,
            accref_index,
            pubdid_index,
            datalink: None,
        }
    }

    /// Query status string reported by the service.
    #[must_use]
    pub fn query_status(&self) -> &str {
        &self.query_status
    }

    /// Whether the query status is `OK` (case-insensitive).
    #[must_use]
    pub fn query_ok(&self) -> bool {
        self.query_status.eq_ignore_ascii_case("OK")
    }

    /// Column metadata, in document order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Parsed data rows, in document order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Whether DataLink downloads are available for this table.
    #[must_use]
    pub fn datalink_available(&self) -> bool {
        self.datalink.is_some()
    }

    /// The activated DataLink configuration, if any.
    #[must_use]
    pub fn datalink(&self) -> Option<&DatalinkEndpoint> {
        self.datalink.as_ref()
    }

    /// Try to activate DataLink on this table.
    ///
    /// Activation is skipped silently (not an error) when no publisher
    /// identifier column was found in the results table, when the candidate
    /// parameters carry no identity parameter, or when DataLink was already
    /// activated.
    pub fn setup_datalink(&mut self, resource_url: String, input_params: Vec<Param>) {
        if self.datalink.is_some() {
            return;
        }
        if self.pubdid_index.is_none() {
            tracing::debug!("DataLink not activated: no publisher identifier column");
            return;
        }
        if !input_params.iter().any(|p| p.id_param) {
            tracing::debug!("DataLink not activated: no identity input parameter");
            return;
        }
        self.datalink = Some(DatalinkEndpoint {
            resource_url,
            input_params,
        });
    }

    /// Access reference (direct download URL) of a record, or `None` if the
    /// document has no access reference column.
    #[must_use]
    pub fn accref<'a>(&self, record: &'a Record) -> Option<&'a str> {
        self.accref_index
            .and_then(|i| record.columns.get(i))
            .map(String::as_str)
    }

    /// Publisher identifier of a record, or `None` if the document has no
    /// publisher identifier column.
    ///
    /// Guaranteed to be `Some` for in-table records whenever
    /// [`datalink_available`](Self::datalink_available) is true.
    #[must_use]
    pub fn pubdid<'a>(&self, record: &'a Record) -> Option<&'a str> {
        self.pubdid_index
            .and_then(|i| record.columns.get(i))
            .map(String::as_str)
    }

    /// File name derived from a record's access reference URL, or `None`
    /// if the record has no access reference.
    #[must_use]
    pub fn reference_file_name(&self, record: &Record) -> Option<String> {
        self.accref(record).map(file_name_from_url)
    }
}
