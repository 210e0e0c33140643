//! PubMed / NCBI E-utilities.
//!
//! Two chained lookups: `esearch` resolves a DOI to a PubMed id, and
//! `elink` walks the nested link-set structure to find a PubMed Central id
//! for that article, if one exists.

use serde_json::Value;

use super::id_string;
use crate::governor::Governor;

/// The esearch endpoint for DOI-to-PMID resolution.
const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";

/// The elink endpoint for PMID-to-PMC linkage.
const ELINK_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/elink.fcgi";

/// Looks up the PubMed id for a DOI, taking the first search hit.
pub async fn fetch_id(governor: &Governor, doi: &str) -> Option<String> {
  let term = format!("{doi}[doi]");
  let query = [("db", "pubmed"), ("term", term.as_str()), ("retmode", "json")];
  governor
    .get_json(ESEARCH_URL, &query)
    .await
    .data()
    .and_then(|data| data.pointer("/esearchresult/idlist/0").and_then(id_string))
}

/// Finds the PubMed Central id linked to a PubMed id, if any.
///
/// The elink response nests `linksets` → `linksetdbs`; the entry whose
/// target database is `pmc` carries the linked ids.
pub async fn fetch_pmc(governor: &Governor, pmid: &str) -> Option<String> {
  let query = [("dbfrom", "pubmed"), ("db", "pmc"), ("id", pmid), ("retmode", "json")];
  let data = governor.get_json(ELINK_URL, &query).await.data()?;

  for linkset in data.get("linksets").and_then(Value::as_array)? {
    for db in linkset.get("linksetdbs").and_then(Value::as_array).into_iter().flatten() {
      if db.get("dbto").and_then(Value::as_str) == Some("pmc") {
        if let Some(id) = db.pointer("/links/0").and_then(id_string) {
          return Some(id);
        }
      }
    }
  }
  None
}
