//! Configuration constants and URL/filename helpers for the downloader.

/// Default timeout for spectra download requests, in seconds.
///
/// Kept short because SSAP services answer interactively; callers with slow
/// mirrors can override it on the downloader.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 5;

/// Chunk size in bytes used when streaming a response body to disk.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024;

/// Utype marking the access reference (direct download URL) column.
pub const ACCREF_COLUMN_UTYPE: &str = "ssa:access.reference";

/// Utype marking the publisher identifier column.
pub const PUBDID_COLUMN_UTYPE: &str = "ssa:curation.publisherdid";

/// `ref` attribute value marking the DataLink identity input parameter.
pub const DATALINK_ID_REF: &str = "ssa_pubDID";

/// Derive a file name from a download URL.
///
/// Strips everything from the first `?` on, then takes the substring after
/// the last `/`.
///
/// # Examples
/// ```
/// use spectra_downloader::config::file_name_from_url;
///
/// assert_eq!(
///     file_name_from_url("http://host/path/tg160037.fit?X=1"),
///     "tg160037.fit"
/// );
/// ```
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .to_string()
}

/// Derive a file name without extension from a download URL.
///
/// Same as [`file_name_from_url`] but additionally truncates at the first `.`
/// of the derived name. Used for DataLink downloads, where the extension is
/// resolved from the response `Content-Type` instead.
///
/// # Examples
/// ```
/// use spectra_downloader::config::file_stem_from_url;
///
/// assert_eq!(
///     file_stem_from_url("http://host/path/tg160037.fit?X=1"),
///     "tg160037"
/// );
/// ```
#[must_use]
pub fn file_stem_from_url(url: &str) -> String {
    let name = file_name_from_url(url);
    name.split('.').next().unwrap_or(&name).to_string()
}

/// Map a response `Content-Type` to a file extension.
///
/// Any parameter suffix (text after `;`) is stripped before the lookup.
/// Returns `None` for media types outside the fixed table.
#[must_use]
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or(content_type).trim();
    match mime {
        "application/fits" => Some("fits"),
        "image/fits" => Some("fit"),
        "text/csv" => Some("csv"),
        "application/x-votable+xml" => Some("vot"),
        "text/plain" => Some("txt"),
        "application/xml" => Some("xml"),
        _ => None,
    }
}

/// Build a DataLink request URL for one record.
///
/// Starts from the service resource URL, forces it to end with `?`, appends
/// each caller-supplied `key=value` pair (values percent-encoded) joined by
/// `&`, and finally appends the identity pair binding the declared identity
/// parameter name to the record's publisher identifier. A caller-supplied key
/// case-insensitively equal to `"id"` is discarded; the identity binding
/// always comes from the table.
///
/// # Arguments
/// * `resource_url` - DataLink service access URL from the parsed document
/// * `parameters` - Caller-supplied query parameters, in order
/// * `id_param_name` - Declared name of the identity input parameter
/// * `pubdid` - Publisher identifier of the record being requested
#[must_use]
pub fn build_datalink_url(
    resource_url: &str,
    parameters: &[(String, String)],
    id_param_name: &str,
    pubdid: &str,
) -> String {
    let mut url = String::from(resource_url);
    if !url.ends_with('?') {
        url.push('?');
    }

    let mut first = true;
    for (key, value) in parameters {
        // The identity binding is never caller-controlled.
        if key.eq_ignore_ascii_case("id") {
            continue;
        }
        if !first {
            url.push('&');
        }
        url.push_str(key);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
        first = false;
    }

    if !first {
        url.push('&');
    }
    url.push_str(id_param_name);
    url.push('=');
    url.push_str(&urlencoding::encode(pubdid));

    url
}
