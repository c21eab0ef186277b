//! Folder paths and PROPFIND multistatus parsing.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::TransferError;

/// Extension identifying archives worth downloading.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// A file seen in a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Server-absolute, still percent-encoded path as returned in `<d:href>`.
    pub href: String,
    pub is_archive: bool,
}

impl RemoteFile {
    pub fn from_href(href: &str) -> Self {
        let href = href.trim().to_string();
        let is_archive = is_archive_name(&href);
        Self { href, is_archive }
    }

    /// Last path segment exactly as the server encoded it.
    pub fn encoded_name(&self) -> &str {
        self.href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// Decoded basename, safe to use as a local file name.
    pub fn file_name(&self) -> String {
        let raw = self.encoded_name();
        let decoded = urlencoding::decode(raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        decoded.replace(['/', '\\'], "_")
    }
}

/// Make a folder path start and end with `/`.
///
/// `"Fitness"` and `"/Fitness/"` both become `"/Fitness/"`; applying it twice
/// changes nothing.
pub fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim();
    let mut normalized = String::with_capacity(trimmed.len() + 2);
    if !trimmed.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(trimmed);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

pub fn is_archive_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION)
}

/// Collect every `href` in a WebDAV multistatus document, in document order.
///
/// Matching is on the local element name so `d:`, `D:` or default-namespace
/// responses all work.
pub fn parse_hrefs(xml: &str) -> Result<Vec<String>, TransferError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut hrefs = Vec::new();
    let mut current: Option<String> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"href" => {
                current = Some(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let Some(href) = current.as_mut() {
                    href.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if let Some(href) = current.as_mut() {
                    href.push_str(&resolve_entity(&String::from_utf8_lossy(e)));
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"href" => {
                if let Some(href) = current.take() {
                    hrefs.push(href);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(TransferError::InvalidListing(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(hrefs)
}

/// Keep archive entries only, preserving listing order.
pub fn select_archives(hrefs: &[String]) -> Vec<RemoteFile> {
    hrefs
        .iter()
        .map(|h| RemoteFile::from_href(h))
        .filter(|f| f.is_archive)
        .collect()
}

fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x") {
                u32::from_str_radix(hex, 16).ok()
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok()
            } else {
                None
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| format!("&{};", name))
        }
    }
}
