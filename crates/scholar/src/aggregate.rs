//! Orchestration of all source fetchers into one report.
//!
//! One aggregation pass drives the adapters in a fixed sequence with a
//! politeness jitter between each call. Sources that return nothing are
//! simply absent from the report's source map; downstream reconciliation
//! treats "key absent" as the sole absence signal. No fetcher failure can
//! abort a pass.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
  governor::Governor,
  sources::{crossref, europepmc, hypothesis, openalex, pubmed, pubpeer, semantic_scholar},
};

/// Source-map key for CrossRef.
pub const CROSSREF: &str = "crossref";
/// Source-map key for OpenAlex.
pub const OPENALEX: &str = "openalex";
/// Source-map key for Semantic Scholar.
pub const SEMANTIC_SCHOLAR: &str = "semantic_scholar";
/// Source-map key for Europe PMC.
pub const EUROPEPMC: &str = "europepmc";
/// Source-map key for PubPeer.
pub const PUBPEER: &str = "pubpeer";

/// How many recommended papers to request.
const RECOMMENDATION_LIMIT: usize = 5;

/// Everything learned about one paper during a single aggregation pass.
///
/// The report is assembled once and never mutated afterwards: it is a pure
/// function of the outbound calls made during the pass.
#[derive(Debug, Serialize)]
pub struct AggregateReport {
  /// The canonical DOI this report describes.
  pub doi: String,
  /// Raw per-source records, keyed by source name. Only sources that
  /// returned data are present.
  pub sources: BTreeMap<String, Value>,
  /// PubMed id discovered via NCBI esearch.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pmid: Option<String>,
  /// PubMed Central id discovered via NCBI elink, only looked up when a
  /// PubMed id was found.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pmc_id: Option<String>,
  /// Annotation count reported by Hypothesis.
  pub hypothesis_annotations: u64,
  /// Recommended-paper stubs from Semantic Scholar, only fetched when the
  /// primary record carried an internal paper id.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recommendations: Option<Vec<Value>>,
}

impl AggregateReport {
  /// Returns the raw record for a source, or `None` if it contributed
  /// nothing.
  pub fn source(&self, name: &str) -> Option<&Value> { self.sources.get(name) }
}

/// Observer for per-source progress during a pass.
///
/// The library reports through [`tracing`] by default; the CLI plugs in a
/// console implementation to show inline "CrossRef... done" lines.
pub trait Progress {
  /// A source fetch is starting.
  fn started(&self, source: &str);
  /// The fetch finished (with or without data).
  fn finished(&self, source: &str);
}

/// Default [`Progress`] sink that logs through `tracing`.
pub struct LogProgress;

impl Progress for LogProgress {
  fn started(&self, source: &str) { debug!("fetching {}", source); }

  fn finished(&self, source: &str) { debug!("{} done", source); }
}

/// Fetches from every source for one DOI and assembles the report.
///
/// Sequence: CrossRef, OpenAlex, Semantic Scholar, PubMed id (with a chained
/// PubMed Central lookup), Europe PMC, PubPeer, Hypothesis, and finally
/// recommendations when Semantic Scholar yielded a paper id. A politeness
/// jitter separates successive sources.
pub async fn aggregate(governor: &Governor, doi: &str, progress: &dyn Progress) -> AggregateReport {
  let mut sources = BTreeMap::new();

  progress.started("CrossRef");
  if let Some(record) = crossref::fetch(governor, doi).await {
    sources.insert(CROSSREF.to_string(), record);
  }
  progress.finished("CrossRef");

  governor.polite_delay().await;
  progress.started("OpenAlex");
  if let Some(record) = openalex::fetch(governor, doi).await {
    sources.insert(OPENALEX.to_string(), record);
  }
  progress.finished("OpenAlex");

  governor.polite_delay().await;
  progress.started("Semantic Scholar");
  let semantic = semantic_scholar::fetch(governor, doi).await;
  let paper_id = semantic
    .as_ref()
    .and_then(|record| record.get("paperId"))
    .and_then(Value::as_str)
    .map(str::to_owned);
  if let Some(record) = semantic {
    sources.insert(SEMANTIC_SCHOLAR.to_string(), record);
  }
  progress.finished("Semantic Scholar");

  governor.polite_delay().await;
  progress.started("PubMed");
  let pmid = pubmed::fetch_id(governor, doi).await;
  let mut pmc_id = None;
  if let Some(pmid) = &pmid {
    pmc_id = pubmed::fetch_pmc(governor, pmid).await;
  }
  progress.finished("PubMed");

  governor.polite_delay().await;
  progress.started("Europe PMC");
  if let Some(record) = europepmc::fetch(governor, doi).await {
    sources.insert(EUROPEPMC.to_string(), record);
  }
  progress.finished("Europe PMC");

  governor.polite_delay().await;
  progress.started("PubPeer");
  if let Some(record) = pubpeer::fetch(governor, doi).await {
    sources.insert(PUBPEER.to_string(), record);
  }
  progress.finished("PubPeer");

  governor.polite_delay().await;
  progress.started("Hypothesis");
  let hypothesis_annotations = hypothesis::count(governor, doi).await;
  progress.finished("Hypothesis");

  let mut recommendations = None;
  if let Some(paper_id) = paper_id {
    governor.polite_delay().await;
    progress.started("Recommendations");
    let recs = semantic_scholar::recommendations(governor, &paper_id, RECOMMENDATION_LIMIT).await;
    if !recs.is_empty() {
      recommendations = Some(recs);
    }
    progress.finished("Recommendations");
  }

  AggregateReport { doi: doi.to_string(), sources, pmid, pmc_id, hypothesis_annotations, recommendations }
}

#[cfg(test)]
pub(crate) mod test_support {
  use super::*;

  /// Builds an empty report for a DOI; tests fill in sources as needed.
  pub fn bare_report(doi: &str) -> AggregateReport {
    AggregateReport {
      doi: doi.to_string(),
      sources: BTreeMap::new(),
      pmid: None,
      pmc_id: None,
      hypothesis_annotations: 0,
      recommendations: None,
    }
  }
}
