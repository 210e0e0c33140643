//! Hypothesis annotation search.
//!
//! Only the total count is wanted, so the search is issued with a zero-item
//! page size against the canonical `https://doi.org/<doi>` URI.

use serde_json::Value;

use crate::governor::Governor;

/// The Hypothesis search endpoint.
const SEARCH_URL: &str = "https://hypothes.is/api/search";

/// Returns the number of annotations on the paper, zero on any failure.
pub async fn count(governor: &Governor, doi: &str) -> u64 {
  let uri = format!("https://doi.org/{doi}");
  let query = [("uri", uri.as_str()), ("limit", "0")];
  governor
    .get_json(SEARCH_URL, &query)
    .await
    .data()
    .and_then(|data| data.get("total").and_then(Value::as_u64))
    .unwrap_or(0)
}
