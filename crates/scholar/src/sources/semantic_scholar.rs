//! Semantic Scholar graph and recommendations APIs.
//!
//! The primary lookup is by DOI with an explicit field list. When that
//! fails for an arXiv preprint-registration DOI, a second lookup keyed by
//! the embedded arXiv token is attempted, since Semantic Scholar often
//! indexes the preprint under its native id before the DOI link lands.

use serde_json::Value;

use super::encode;
use crate::{doi::arxiv_token, governor::Governor};

/// Base URL of the paper lookup endpoint.
const PAPER_URL: &str = "https://api.semanticscholar.org/graph/v1/paper";

/// Base URL of the recommendations endpoint.
const RECOMMENDATIONS_URL: &str =
  "https://api.semanticscholar.org/recommendations/v1/papers/forpaper";

/// Fields requested for a full paper record.
const PAPER_FIELDS: &str = "paperId,title,citationCount,influentialCitationCount,isOpenAccess,\
                            openAccessPdf,tldr,publicationTypes,publicationDate,journal,authors";

/// Fetches the Semantic Scholar record for a DOI, with an arXiv-keyed retry.
pub async fn fetch(governor: &Governor, doi: &str) -> Option<Value> {
  let url = format!("{}/DOI:{}", PAPER_URL, encode(doi));
  if let Some(data) = governor.get_json(&url, &[("fields", PAPER_FIELDS)]).await.data() {
    return Some(data);
  }
  let token = arxiv_token(doi)?;
  lookup_arxiv(governor, token, PAPER_FIELDS).await
}

/// Fetches a record keyed by a bare arXiv token with the given field list.
///
/// Also used by canonicalization, which only needs `externalIds,title`.
pub async fn lookup_arxiv(governor: &Governor, token: &str, fields: &str) -> Option<Value> {
  let url = format!("{}/ArXiv:{}", PAPER_URL, token);
  governor.get_json(&url, &[("fields", fields)]).await.data()
}

/// Fetches up to `limit` recommended papers for an internal paper id.
pub async fn recommendations(governor: &Governor, paper_id: &str, limit: usize) -> Vec<Value> {
  let url = format!("{}/{}", RECOMMENDATIONS_URL, paper_id);
  let limit = limit.to_string();
  let query = [("fields", "title,authors,year,citationCount"), ("limit", limit.as_str())];
  governor
    .get_json(&url, &query)
    .await
    .data()
    .and_then(|data| data.get("recommendedPapers").and_then(Value::as_array).cloned())
    .unwrap_or_default()
}
