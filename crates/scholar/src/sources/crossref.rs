//! CrossRef works API.
//!
//! Two operations: direct lookup by DOI, which unwraps the response
//! envelope's `message` field, and title search, which returns the raw list
//! of candidate items. An empty search result is an empty list, not an
//! absence.

use serde_json::Value;

use super::encode;
use crate::governor::Governor;

/// Base URL of the CrossRef works API.
const WORKS_URL: &str = "https://api.crossref.org/works";

/// Fields requested from title search, keeping responses small.
const SEARCH_SELECT: &str =
  "DOI,title,author,issued,container-title,is-referenced-by-count,publisher,type";

/// Fetches the CrossRef work record for a DOI.
pub async fn fetch(governor: &Governor, doi: &str) -> Option<Value> {
  let url = format!("{}/{}", WORKS_URL, encode(doi));
  governor
    .get_json(&url, &[])
    .await
    .data()
    .and_then(|mut data| data.get_mut("message").map(Value::take))
}

/// Searches CrossRef by title, returning up to `rows` candidate items.
pub async fn search_title(governor: &Governor, title: &str, rows: usize) -> Vec<Value> {
  let rows = rows.to_string();
  let query = [("query.title", title), ("rows", rows.as_str()), ("select", SEARCH_SELECT)];
  governor
    .get_json(WORKS_URL, &query)
    .await
    .data()
    .and_then(|data| data.pointer("/message/items").and_then(Value::as_array).cloned())
    .unwrap_or_default()
}
