//! OpenAlex works API.
//!
//! Lookup is keyed by a constructed `https://doi.org/<doi>` pseudo-URL used
//! as the work's external identifier path segment.

use serde_json::Value;

use super::encode;
use crate::governor::Governor;

/// Fetches the OpenAlex work record for a DOI.
pub async fn fetch(governor: &Governor, doi: &str) -> Option<Value> {
  let url = format!("https://api.openalex.org/works/https://doi.org/{}", encode(doi));
  governor.get_json(&url, &[]).await.data()
}
