//! Streaming SSAP VOTABLE parser.
//!
//! Reduces the start-tag/end-tag/text event stream of a quick-xml reader
//! into an [`IndexedVotable`]. The reducer recognizes the single RESOURCE
//! element typed `results` (query status, FIELD metadata, TR/TD rows) and
//! treats every other RESOURCE as a potential DataLink service descriptor,
//! collecting proper candidates and selecting the best match after the
//! document ends.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::DATALINK_ID_REF;
use crate::error::Result;
use crate::types::{Field, Param, ParamOption, PossibleDatalink, Record};
use crate::votable::IndexedVotable;

/// Query status assumed when the document carries no QUERY_STATUS info.
const UNDEFINED_STATUS: &str = "UNDEFINED";

/// Parse an SSAP VOTABLE document into an indexed table.
///
/// # Arguments
/// * `document` - Complete VOTABLE XML text
///
/// # Returns
/// The indexed table, with DataLink activated when the document describes a
/// usable DataLink service.
///
/// # Errors
/// `DownloaderError::MalformedDocument` when the tokenizer reports a syntax
/// error; parsing is never resumed after one.
pub fn parse_ssap(document: &str) -> Result<IndexedVotable> {
    let mut reader = Reader::from_str(document);
    let mut reducer = VotableReducer::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => reducer.handle_start(&e)?,
            Event::Empty(e) => {
                // Self-closing tag: synthesize the matching end event.
                reducer.handle_start(&e)?;
                reducer.handle_end(e.name().as_ref());
            }
            Event::End(e) => reducer.handle_end(e.name().as_ref()),
            Event::Text(t) => reducer.handle_text(&t.unescape()?),
            Event::CData(t) => reducer.handle_text(&String::from_utf8_lossy(t.as_ref())),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(reducer.into_votable())
}

/// Fetch the value of one attribute by exact (case-sensitive) name.
fn attr_value(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Stateful event reducer for one VOTABLE document.
///
/// Holds the tag-nesting state machine as plain fields; the accumulators are
/// `Option`s so that "not currently open" is distinguishable from "open but
/// empty".
struct VotableReducer {
    /// Inside the RESOURCE element whose `type` attribute is `results`.
    in_results_resource: bool,

    /// Inside any other RESOURCE element (DataLink candidate).
    in_extra_resource: bool,

    /// Inside a GROUP named `inputParams` of an extra resource.
    in_input_param_group: bool,

    /// Between a TD start and its matching end.
    in_cell: bool,

    /// Text accumulated for the currently open cell. `None` means no text
    /// event fired yet; normalized to an empty column value on TD close.
    cell_text: Option<String>,

    /// Columns of the row currently being read.
    current_columns: Option<Vec<String>>,

    /// DataLink candidate under construction for the current extra resource,
    /// created lazily on its first PARAM.
    current_datalink: Option<PossibleDatalink>,

    /// Parameter under construction between a PARAM start and its end.
    current_param: Option<Param>,

    /// Every proper candidate closed so far, in document order.
    candidates: Vec<PossibleDatalink>,

    query_status: String,
    fields: Vec<Field>,
    records: Vec<Record>,
}

impl VotableReducer {
    fn new() -> Self {
        Self {
            in_results_resource: false,
            in_extra_resource: false,
            in_input_param_group: false,
            in_cell: false,
            cell_text: None,
            current_columns: None,
            current_datalink: None,
            current_param: None,
            candidates: Vec::new(),
            query_status: UNDEFINED_STATUS.to_string(),
            fields: Vec::new(),
            records: Vec::new(),
        }
    }

    fn handle_start(&mut self, element: &BytesStart<'_>) -> Result<()> {
        let tag = element.name();
        let tag = tag.as_ref();

        if tag == b"RESOURCE" {
            if attr_value(element, b"type")?.as_deref() == Some("results") {
                self.in_results_resource = true;
            } else {
                self.in_extra_resource = true;
            }
        }

        if self.in_results_resource {
            match tag {
                b"INFO" => {
                    // Only the QUERY_STATUS info is significant.
                    if attr_value(element, b"name")?.as_deref() == Some("QUERY_STATUS") {
                        self.query_status = attr_value(element, b"value")?
                            .unwrap_or_else(|| UNDEFINED_STATUS.to_string());
                    }
                }
                b"FIELD" => {
                    let name =
                        attr_value(element, b"name")?.unwrap_or_else(|| "undefined".to_string());
                    let utype =
                        attr_value(element, b"utype")?.unwrap_or_else(|| "undefined".to_string());
                    self.fields.push(Field::new(name, utype));
                }
                b"TR" => {
                    // An unterminated previous row is discarded.
                    self.current_columns = Some(Vec::new());
                }
                b"TD" => {
                    self.in_cell = true;
                }
                _ => {}
            }
        }

        if self.in_extra_resource {
            match tag {
                b"GROUP" => {
                    // Still does not have to be a DataLink descriptor; the
                    // proper-format check happens when the resource closes.
                    if attr_value(element, b"name")?.as_deref() == Some("inputParams") {
                        self.in_input_param_group = true;
                    }
                }
                b"PARAM" => {
                    if self.current_datalink.is_none() {
                        self.current_datalink = Some(PossibleDatalink::default());
                    }
                    let name = attr_value(element, b"name")?;
                    let value = attr_value(element, b"value")?;
                    if let (Some(name), Some(value)) = (name, value) {
                        self.current_param = Some(Param::new(name, value));
                    }
                    if self.in_input_param_group
                        && attr_value(element, b"ref")?.as_deref() == Some(DATALINK_ID_REF)
                    {
                        if let Some(param) = self.current_param.as_mut() {
                            param.set_id();
                        }
                    }
                }
                _ => {}
            }
        }

        if tag == b"OPTION" && self.in_input_param_group {
            if let Some(param) = self.current_param.as_mut() {
                let name = attr_value(element, b"name")?;
                let value = attr_value(element, b"value")?;
                if let (Some(name), Some(value)) = (name, value) {
                    param.add_option(ParamOption::new(name, value));
                }
            }
        }

        Ok(())
    }

    fn handle_end(&mut self, tag: &[u8]) {
        match tag {
            b"RESOURCE" => {
                if self.in_results_resource {
                    self.in_results_resource = false;
                } else {
                    self.in_extra_resource = false;
                    if let Some(candidate) = self.current_datalink.take() {
                        if candidate.is_proper() {
                            self.candidates.push(candidate);
                        }
                    }
                }
            }
            b"TR" => {
                if let Some(columns) = self.current_columns.take() {
                    self.records.push(Record::new(columns));
                }
            }
            b"TD" => {
                if self.in_cell {
                    self.in_cell = false;
                    let value = self.cell_text.take().unwrap_or_default();
                    if let Some(columns) = self.current_columns.as_mut() {
                        columns.push(value.trim().to_string());
                    }
                }
            }
            b"GROUP" => {
                self.in_input_param_group = false;
            }
            b"PARAM" => {
                if self.in_extra_resource {
                    if let (Some(candidate), Some(param)) =
                        (self.current_datalink.as_mut(), self.current_param.take())
                    {
                        if self.in_input_param_group {
                            candidate.input_params.push(param);
                        } else {
                            candidate.external_params.insert(param.name.clone(), param);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Text is only significant inside TD elements. Streaming parsers may
    /// split one cell into several text events; successive events
    /// concatenate verbatim.
    fn handle_text(&mut self, content: &str) {
        if self.in_cell {
            match self.cell_text.as_mut() {
                Some(text) => text.push_str(content),
                None => self.cell_text = Some(content.to_string()),
            }
        }
    }

    /// Build the indexed table and activate the best DataLink candidate.
    ///
    /// The candidate with the most input parameters wins; the first seen
    /// wins ties. Activation itself can still be skipped by the table's own
    /// checks.
    fn into_votable(self) -> IndexedVotable {
        let mut votable = IndexedVotable::new(self.query_status, self.fields, self.records);

        let best = self
            .candidates
            .into_iter()
            .reduce(|best, candidate| {
                if candidate.input_params.len() > best.input_params.len() {
                    candidate
                } else {
                    best
                }
            });

        if let Some(best) = best {
            if let Some(url) = best.access_url() {
                let url = url.to_string();
                votable.setup_datalink(url, best.input_params);
            }
        }

        tracing::debug!(
            rows = votable.records().len(),
            fields = votable.fields().len(),
            datalink = votable.datalink_available(),
            status = votable.query_status(),
            "Parsed SSAP VOTABLE"
        );

        votable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Minimal results-only document with the given TABLEDATA body.
    fn results_document(tabledata: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<VOTABLE>
  <RESOURCE type="results">
    <INFO name="QUERY_STATUS" value="OK"/>
    <TABLE>
      <FIELD name="accref" utype="ssa:Access.Reference"/>
      <FIELD name="pubdid" utype="ssa:Curation.PublisherDID"/>
      <DATA><TABLEDATA>{tabledata}</TABLEDATA></DATA>
    </TABLE>
  </RESOURCE>
</VOTABLE>"#
        )
    }

    /// Document with a results resource and one DataLink descriptor carrying
    /// the given input params XML.
    fn datalink_document(input_params: &str) -> String {
        format!(
            r#"<VOTABLE>
  <RESOURCE type="results">
    <INFO name="QUERY_STATUS" value="OK"/>
    <TABLE>
      <FIELD name="accref" utype="ssa:access.reference"/>
      <FIELD name="pubdid" utype="ssa:curation.publisherdid"/>
      <DATA><TABLEDATA>
        <TR><TD>http://host/spectra/tg160037.fit</TD><TD>ivo://host/tg160037</TD></TR>
      </TABLEDATA></DATA>
    </TABLE>
  </RESOURCE>
  <RESOURCE type="meta" utype="adhoc:service">
    <PARAM name="accessURL" value="http://host/q/sdl/dlget"/>
    <GROUP name="inputParams">{input_params}</GROUP>
  </RESOURCE>
</VOTABLE>"#
        )
    }

    #[test]
    fn test_rows_and_columns_in_document_order() {
        let xml = results_document(
            "<TR><TD>a1</TD><TD>a2</TD></TR>\
             <TR><TD>b1</TD><TD>b2</TD></TR>\
             <TR><TD>c1</TD><TD>c2</TD></TR>",
        );
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert_eq!(votable.records().len(), 3);
        assert_eq!(votable.fields().len(), 2);
        assert_eq!(votable.records()[0].columns, vec!["a1", "a2"]);
        assert_eq!(votable.records()[2].columns, vec!["c1", "c2"]);
    }

    #[test]
    fn test_cell_text_trimmed_and_empty_cells_normalized() {
        let xml = results_document("<TR><TD>  spaced  </TD><TD></TD></TR>");
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert_eq!(votable.records()[0].columns, vec!["spaced", ""]);
    }

    #[test]
    fn test_cell_text_concatenates_split_events() {
        // CDATA forces the tokenizer to split the cell into several events.
        let xml = results_document("<TR><TD>pre<![CDATA[&mid]]>post</TD><TD>x</TD></TR>");
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert_eq!(votable.records()[0].columns[0], "pre&midpost");
    }

    #[test]
    fn test_entity_unescaped_in_cells() {
        let xml = results_document("<TR><TD>a &amp; b</TD><TD>x</TD></TR>");
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert_eq!(votable.records()[0].columns[0], "a & b");
    }

    #[test]
    fn test_query_status_defaults_to_undefined() {
        let xml = r#"<VOTABLE><RESOURCE type="results"><TABLE/></RESOURCE></VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert_eq!(votable.query_status(), "UNDEFINED");
        assert!(!votable.query_ok());
    }

    #[test]
    fn test_query_status_error() {
        let xml = r#"<VOTABLE><RESOURCE type="results">
            <INFO name="QUERY_STATUS" value="ERROR"/><TABLE/>
        </RESOURCE></VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert_eq!(votable.query_status(), "ERROR");
        assert!(!votable.query_ok());
    }

    #[test]
    fn test_other_info_tags_ignored() {
        let xml = r#"<VOTABLE><RESOURCE type="results">
            <INFO name="SERVICE_PROTOCOL" value="1.1"/>
            <INFO name="QUERY_STATUS" value="OK"/><TABLE/>
        </RESOURCE></VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert!(votable.query_ok());
    }

    #[test]
    fn test_field_attributes_default_to_undefined() {
        let xml = r#"<VOTABLE><RESOURCE type="results"><TABLE>
            <FIELD name="only-name"/>
            <FIELD utype="only:utype"/>
        </TABLE></RESOURCE></VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert_eq!(votable.fields()[0].utype, "undefined");
        assert_eq!(votable.fields()[1].name, "undefined");
    }

    #[test]
    fn test_datalink_activation() {
        let xml = datalink_document(
            r#"<PARAM name="ID" value="" ref="ssa_pubDID"/>
               <PARAM name="FORMAT" value="application/fits">
                 <OPTION name="FITS" value="application/fits"/>
                 <OPTION name="CSV" value="text/csv"/>
               </PARAM>"#,
        );
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert!(votable.datalink_available());
        let endpoint = votable.datalink().expect("datalink endpoint");
        assert_eq!(endpoint.resource_url, "http://host/q/sdl/dlget");
        assert_eq!(endpoint.input_params.len(), 2);
        assert_eq!(
            endpoint.identity_param().map(|p| p.name.as_str()),
            Some("ID")
        );
        assert_eq!(endpoint.input_params[1].options.len(), 2);
        assert_eq!(endpoint.input_params[1].options[1].value, "text/csv");
    }

    #[test]
    fn test_datalink_skipped_without_identity_param() {
        let xml = datalink_document(r#"<PARAM name="FORMAT" value="application/fits"/>"#);
        let votable = parse_ssap(&xml).expect("parse should succeed");

        assert!(!votable.datalink_available());
    }

    #[test]
    fn test_datalink_skipped_without_pubdid_column() {
        let xml = r#"<VOTABLE>
  <RESOURCE type="results">
    <TABLE><FIELD name="accref" utype="ssa:access.reference"/></TABLE>
  </RESOURCE>
  <RESOURCE type="meta">
    <PARAM name="accessURL" value="http://host/dlget"/>
    <GROUP name="inputParams"><PARAM name="ID" value="" ref="ssa_pubDID"/></GROUP>
  </RESOURCE>
</VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert!(!votable.datalink_available());
    }

    #[test]
    fn test_improper_candidate_without_access_url_skipped() {
        let xml = r#"<VOTABLE>
  <RESOURCE type="results">
    <TABLE>
      <FIELD name="accref" utype="ssa:access.reference"/>
      <FIELD name="pubdid" utype="ssa:curation.publisherdid"/>
    </TABLE>
  </RESOURCE>
  <RESOURCE type="meta">
    <GROUP name="inputParams"><PARAM name="ID" value="" ref="ssa_pubDID"/></GROUP>
  </RESOURCE>
</VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        assert!(!votable.datalink_available());
    }

    #[test]
    fn test_candidate_with_most_input_params_wins() {
        let xml = r#"<VOTABLE>
  <RESOURCE type="results">
    <TABLE>
      <FIELD name="accref" utype="ssa:access.reference"/>
      <FIELD name="pubdid" utype="ssa:curation.publisherdid"/>
    </TABLE>
  </RESOURCE>
  <RESOURCE type="meta">
    <PARAM name="accessURL" value="http://host/small"/>
    <GROUP name="inputParams"><PARAM name="ID" value="" ref="ssa_pubDID"/></GROUP>
  </RESOURCE>
  <RESOURCE type="meta">
    <PARAM name="accessURL" value="http://host/large"/>
    <GROUP name="inputParams">
      <PARAM name="ID" value="" ref="ssa_pubDID"/>
      <PARAM name="FORMAT" value="application/fits"/>
    </GROUP>
  </RESOURCE>
</VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        let endpoint = votable.datalink().expect("datalink endpoint");
        assert_eq!(endpoint.resource_url, "http://host/large");
    }

    #[test]
    fn test_candidate_tie_keeps_first_in_document_order() {
        let xml = r#"<VOTABLE>
  <RESOURCE type="results">
    <TABLE>
      <FIELD name="accref" utype="ssa:access.reference"/>
      <FIELD name="pubdid" utype="ssa:curation.publisherdid"/>
    </TABLE>
  </RESOURCE>
  <RESOURCE type="meta">
    <PARAM name="accessURL" value="http://host/first"/>
    <GROUP name="inputParams"><PARAM name="ID" value="" ref="ssa_pubDID"/></GROUP>
  </RESOURCE>
  <RESOURCE type="meta">
    <PARAM name="accessURL" value="http://host/second"/>
    <GROUP name="inputParams"><PARAM name="ID" value="" ref="ssa_pubDID"/></GROUP>
  </RESOURCE>
</VOTABLE>"#;
        let votable = parse_ssap(xml).expect("parse should succeed");

        let endpoint = votable.datalink().expect("datalink endpoint");
        assert_eq!(endpoint.resource_url, "http://host/first");
    }

    #[test]
    fn test_param_outside_group_becomes_external() {
        let xml = datalink_document(r#"<PARAM name="ID" value="" ref="ssa_pubDID"/>"#);
        let votable = parse_ssap(&xml).expect("parse should succeed");

        // accessURL was declared outside the inputParams group.
        let endpoint = votable.datalink().expect("datalink endpoint");
        assert_eq!(endpoint.input_params.len(), 1);
    }

    #[test]
    fn test_malformed_document_fails() {
        let err = parse_ssap("<VOTABLE><RESOURCE type=").expect_err("should fail");
        assert!(matches!(
            err,
            crate::error::DownloaderError::MalformedDocument(_)
                | crate::error::DownloaderError::MalformedAttribute(_)
        ));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let err =
            parse_ssap("<VOTABLE><RESOURCE type=\"results\"></TABLE></VOTABLE>")
                .expect_err("should fail");
        assert!(matches!(
            err,
            crate::error::DownloaderError::MalformedDocument(_)
        ));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let xml = datalink_document(
            r#"<PARAM name="ID" value="" ref="ssa_pubDID"/>
               <PARAM name="FORMAT" value="application/fits"/>"#,
        );
        let first = parse_ssap(&xml).expect("parse should succeed");
        let second = parse_ssap(&xml).expect("parse should succeed");

        assert_eq!(first, second);
    }
}
