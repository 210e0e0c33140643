//! PubPeer publications API.
//!
//! A POST carrying a fixed client-version/browser identity and the DOI in a
//! list. The response's `feedbacks` list is scanned for the entry whose id
//! matches the queried DOI case-insensitively.

use serde_json::{json, Value};

use crate::governor::Governor;

/// The publications endpoint.
const PUBLICATIONS_URL: &str = "https://pubpeer.com/v3/publications";

/// Fetches the PubPeer feedback entry for a DOI, if comments exist.
pub async fn fetch(governor: &Governor, doi: &str) -> Option<Value> {
  let body = json!({
    "version": "1.6.2",
    "browser": "Chrome",
    "dois": [doi],
  });
  let data = governor.post_json(PUBLICATIONS_URL, &[("devkey", "PubMedChrome")], &body).await.data()?;

  let wanted = doi.to_lowercase();
  data
    .get("feedbacks")
    .and_then(Value::as_array)?
    .iter()
    .find(|feedback| {
      feedback.get("id").and_then(Value::as_str).is_some_and(|id| id.to_lowercase() == wanted)
    })
    .cloned()
}
