//! One adapter per remote bibliographic API.
//!
//! Each adapter is a thin async function over the governed transport:
//! `(identifier or derived key) -> data or a defined absence`. Adapters own
//! the quirks of their remote schema (envelope unwrapping, keyed retries,
//! nested link-set walks) and uphold one shared contract: they never raise.
//! A source that cannot answer simply contributes nothing to the report.

pub mod crossref;
pub mod europepmc;
pub mod hypothesis;
pub mod openalex;
pub mod pubmed;
pub mod pubpeer;
pub mod semantic_scholar;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

/// Everything outside the URL-unreserved set, notably the slash between a
/// DOI's registrant and suffix.
const RESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'.').remove(b'-').remove(b'~');

/// Percent-encodes a DOI for use as a single URL path segment.
fn encode(doi: &str) -> String { utf8_percent_encode(doi, RESERVED).to_string() }

/// Renders a JSON scalar as an identifier string.
///
/// NCBI link lists carry ids as numbers in some responses and strings in
/// others; both shapes are accepted.
fn id_string(value: &Value) -> Option<String> {
  match value {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encode_escapes_the_doi_slash() {
    assert_eq!(encode("10.1038/s41586-020-2649-2"), "10.1038%2Fs41586-020-2649-2");
    assert_eq!(encode("10.1000/abc:def"), "10.1000%2Fabc%3Adef");
  }

  #[test]
  fn id_string_accepts_numbers_and_strings() {
    assert_eq!(id_string(&serde_json::json!(7514952)).as_deref(), Some("7514952"));
    assert_eq!(id_string(&serde_json::json!("7514952")).as_deref(), Some("7514952"));
    assert_eq!(id_string(&serde_json::json!(null)), None);
  }
}
