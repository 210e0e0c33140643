//! Europe PMC search API.
//!
//! A quoted-DOI search with the `core` result type, taking the first result.

use serde_json::Value;

use crate::governor::Governor;

/// The Europe PMC REST search endpoint.
const SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

/// Fetches the Europe PMC record for a DOI.
pub async fn fetch(governor: &Governor, doi: &str) -> Option<Value> {
  let query_term = format!("DOI:\"{doi}\"");
  let query = [("query", query_term.as_str()), ("format", "json"), ("resultType", "core")];
  governor
    .get_json(SEARCH_URL, &query)
    .await
    .data()
    .and_then(|data| data.pointer("/resultList/result/0").cloned())
}
