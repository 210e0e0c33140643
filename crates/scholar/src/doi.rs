//! DOI extraction from free text, URLs, and PDF documents.
//!
//! A DOI is matched by the grammar `10.<4-9 digits>/<suffix>` where the
//! suffix runs until whitespace, quoting, or bracketing characters. Matches
//! are normalized by stripping trailing punctuation and one trailing
//! file-extension suffix that publishers commonly leave on landing-page URLs
//! (`.pdf`, `.html`, `.full`, `.xml`).
//!
//! # Examples
//!
//! ```
//! use scholar::doi::{extract_doi, extract_doi_from_url};
//!
//! assert_eq!(extract_doi("see 10.1234/abc.pdf for details").as_deref(), Some("10.1234/abc"));
//! assert_eq!(
//!   extract_doi_from_url("https://doi.org/10.1038/s41586-020-2649-2").as_deref(),
//!   Some("10.1038/s41586-020-2649-2")
//! );
//! ```

use std::{collections::HashSet, path::Path};

use lazy_static::lazy_static;
use lopdf::{Document, Object};
use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Result, ScholarError};

lazy_static! {
  /// The DOI grammar: registrant prefix `10.` plus 4-9 digits, a slash, and
  /// a suffix token free of whitespace, quotes, and brackets.
  static ref DOI_REGEX: Regex =
    Regex::new(r#"(?i)10\.\d{4,9}/[^\s"'<>\]\)\}\{,]+"#).expect("invalid DOI regex");

  /// arXiv preprint-registration DOIs, e.g. `10.48550/arXiv.2301.07041`.
  static ref ARXIV_DOI_REGEX: Regex =
    Regex::new(r"(?i)^10\.48550/arXiv\.(.+)$").expect("invalid arXiv DOI regex");
}

/// File-extension suffixes stripped from an extracted DOI.
const KNOWN_EXTENSIONS: [&str; 4] = [".pdf", ".html", ".full", ".xml"];

/// PDF metadata dictionary keys that commonly carry a DOI.
const PDF_METADATA_KEYS: [&str; 4] = ["doi", "Subject", "Title", "WPS-ARTICLEDOI"];

/// Extracts the first DOI from arbitrary text, or `None` if no match.
///
/// Trailing `.,;:` punctuation is stripped, then one trailing known
/// extension (case-insensitive). Extracting from an already-canonical DOI
/// returns that same string.
pub fn extract_doi(text: &str) -> Option<String> {
  let m = DOI_REGEX.find(text)?;
  let mut doi = m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string();
  let lower = doi.to_lowercase();
  for ext in KNOWN_EXTENSIONS {
    if lower.ends_with(ext) {
      doi.truncate(doi.len() - ext.len());
      break;
    }
  }
  Some(doi)
}

/// Extracts a DOI from a URL.
///
/// The URL is percent-decoded first. If it contains `doi.org/`, extraction
/// runs on the text following that substring; otherwise the whole URL is
/// treated as free text.
pub fn extract_doi_from_url(url: &str) -> Option<String> {
  let decoded = percent_decode_str(url).decode_utf8_lossy();
  match decoded.split_once("doi.org/") {
    Some((_, tail)) => extract_doi(tail),
    None => extract_doi(&decoded),
  }
}

/// Extracts a DOI from a PDF document, best-effort.
///
/// Two phases: (1) scan the document's metadata dictionary for known keys
/// and run text extraction on each value; (2) if nothing hit, extract plain
/// text from the first three pages and scan that. Corrupt or unreadable
/// documents are not fatal and yield `Ok(None)`; a missing file path is a
/// hard [`ScholarError::FileNotFound`].
pub fn extract_doi_from_pdf(path: impl AsRef<Path>) -> Result<Option<String>> {
  let path = path.as_ref();
  if !path.exists() {
    return Err(ScholarError::FileNotFound(path.to_path_buf()));
  }

  let doc = match Document::load(path) {
    Ok(doc) => doc,
    Err(e) => {
      debug!("failed to parse PDF {}: {}", path.display(), e);
      return Ok(None);
    },
  };

  if let Some(doi) = doi_from_pdf_metadata(&doc) {
    debug!("found DOI in PDF metadata: {}", doi);
    return Ok(Some(doi));
  }

  let pages: Vec<u32> = doc.get_pages().keys().take(3).copied().collect();
  match doc.extract_text(&pages) {
    Ok(text) => Ok(extract_doi(&text)),
    Err(e) => {
      debug!("failed to extract text from {}: {}", path.display(), e);
      Ok(None)
    },
  }
}

/// Scans the trailer `Info` dictionary for a DOI under known key names.
fn doi_from_pdf_metadata(doc: &Document) -> Option<String> {
  let info = doc
    .trailer
    .get(b"Info")
    .ok()
    .and_then(|obj| obj.as_reference().ok())
    .and_then(|id| doc.get_object(id).ok())
    .and_then(|obj| obj.as_dict().ok())?;

  for key in PDF_METADATA_KEYS {
    if let Some(value) = info.get(key.as_bytes()).ok().and_then(decode_pdf_string) {
      trace!("PDF metadata {}: {}", key, value);
      if let Some(doi) = extract_doi(&value) {
        return Some(doi);
      }
    }
  }
  None
}

/// Decodes a PDF string object, handling the UTF-16BE BOM variant.
fn decode_pdf_string(obj: &Object) -> Option<String> {
  let bytes = obj.as_str().ok()?;
  if bytes.starts_with(&[0xFE, 0xFF]) {
    let (cow, ..) = encoding_rs::UTF_16BE.decode(&bytes[2..]);
    Some(cow.into_owned())
  } else {
    Some(String::from_utf8_lossy(bytes).into_owned())
  }
}

/// Returns the arXiv token embedded in a preprint-registration DOI, if any.
///
/// ```
/// use scholar::doi::arxiv_token;
///
/// assert_eq!(arxiv_token("10.48550/arXiv.2301.07041"), Some("2301.07041"));
/// assert_eq!(arxiv_token("10.1038/s41586-020-2649-2"), None);
/// ```
pub fn arxiv_token(doi: &str) -> Option<&str> {
  ARXIV_DOI_REGEX.captures(doi).and_then(|cap| cap.get(1)).map(|m| m.as_str())
}

/// Collapses duplicate DOIs, preserving first-seen order.
///
/// Comparison is case-sensitive: `10.1/a` and `10.1/A` are distinct keys.
pub fn dedupe(dois: Vec<String>) -> Vec<String> {
  let mut seen = HashSet::new();
  dois.into_iter().filter(|doi| seen.insert(doi.clone())).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extraction_is_idempotent() {
    let doi = "10.1038/s41586-020-2649-2";
    assert_eq!(extract_doi(doi).as_deref(), Some(doi));
  }

  #[test]
  fn strips_known_extensions() {
    assert_eq!(extract_doi("10.1234/abc.pdf").as_deref(), Some("10.1234/abc"));
    assert_eq!(extract_doi("10.1234/abc.HTML").as_deref(), Some("10.1234/abc"));
    assert_eq!(extract_doi("10.1234/abc.full").as_deref(), Some("10.1234/abc"));
    // Only a trailing match is an extension, not one mid-suffix.
    assert_eq!(extract_doi("10.1234/abc.xml.v2").as_deref(), Some("10.1234/abc.xml.v2"));
  }

  #[test]
  fn strips_trailing_punctuation() {
    assert_eq!(extract_doi("cited as 10.1234/abc;").as_deref(), Some("10.1234/abc"));
    assert_eq!(extract_doi("(see 10.1234/abc.)").as_deref(), Some("10.1234/abc"));
  }

  #[test]
  fn finds_first_match_in_free_text() {
    let text = "compare 10.1000/first and 10.2000/second";
    assert_eq!(extract_doi(text).as_deref(), Some("10.1000/first"));
  }

  #[test]
  fn rejects_text_without_doi() {
    assert_eq!(extract_doi("no identifier here"), None);
    assert_eq!(extract_doi("10.12/too-few-digits"), None);
  }

  #[test]
  fn url_extraction_strips_resolver_prefix() {
    assert_eq!(
      extract_doi_from_url("https://doi.org/10.1038/s41586-020-2649-2").as_deref(),
      Some("10.1038/s41586-020-2649-2")
    );
  }

  #[test]
  fn url_extraction_percent_decodes() {
    assert_eq!(
      extract_doi_from_url("https://doi.org/10.1000%2Fabc%3Adef").as_deref(),
      Some("10.1000/abc:def")
    );
  }

  #[test]
  fn url_extraction_falls_back_to_full_text() {
    assert_eq!(
      extract_doi_from_url("https://journals.example.com/article/10.5555/xyz123").as_deref(),
      Some("10.5555/xyz123")
    );
  }

  #[test]
  fn arxiv_token_matches_case_insensitively() {
    assert_eq!(arxiv_token("10.48550/ARXIV.2301.07041"), Some("2301.07041"));
  }

  #[test]
  fn dedupe_is_case_sensitive_and_order_preserving() {
    let dois = vec!["10.1/a".to_string(), "10.1/A".to_string(), "10.1/a".to_string()];
    assert_eq!(dedupe(dois), vec!["10.1/a".to_string(), "10.1/A".to_string()]);
  }

  #[test]
  fn missing_pdf_is_a_hard_error() {
    match extract_doi_from_pdf("/definitely/not/a/file.pdf") {
      Err(ScholarError::FileNotFound(_)) => (),
      other => panic!("expected FileNotFound, got {other:?}"),
    }
  }

  #[test]
  fn corrupt_pdf_is_a_soft_miss() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("garbage.pdf");
    std::fs::write(&path, b"not a pdf at all")?;
    assert_eq!(extract_doi_from_pdf(&path)?, None);
    Ok(())
  }
}
