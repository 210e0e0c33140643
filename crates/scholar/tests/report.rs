//! End-to-end report assembly tests over the public API: a hand-built
//! aggregate report flows through reconciliation and rendering exactly as a
//! fetched one would.

use chrono::NaiveDate;
use scholar::{
  aggregate::{AggregateReport, CROSSREF, SEMANTIC_SCHOLAR},
  reconcile, render,
};
use serde_json::json;

fn report_with(sources: Vec<(&str, serde_json::Value)>) -> AggregateReport {
  AggregateReport {
    doi: "10.1038/s41586-020-2649-2".to_string(),
    sources: sources.into_iter().map(|(name, value)| (name.to_string(), value)).collect(),
    pmid: None,
    pmc_id: None,
    hypothesis_annotations: 0,
    recommendations: None,
  }
}

#[test]
fn conflicting_titles_resolve_by_priority() {
  let report = report_with(vec![
    (CROSSREF, json!({"title": ["Array programming with NumPy"]})),
    (SEMANTIC_SCHOLAR, json!({"title": "Array Programming With NumPy (S2)"})),
  ]);
  assert_eq!(reconcile::title(&report), "Array programming with NumPy");

  let report = report_with(vec![(SEMANTIC_SCHOLAR, json!({"title": "S2 Only"}))]);
  assert_eq!(reconcile::title(&report), "S2 Only");
}

#[test]
fn a_source_may_contribute_zero_fields() {
  // Present but useless record: every reconciler must fall through it.
  let report = report_with(vec![(CROSSREF, json!({"unrelated": true}))]);
  assert_eq!(reconcile::title(&report), report.doi);
  assert!(reconcile::authors(&report).is_empty());
  assert_eq!(reconcile::journal(&report), None);
}

#[test]
fn full_report_renders_every_present_section_in_order() {
  let mut report = report_with(vec![
    (
      CROSSREF,
      json!({
        "title": ["Array programming with NumPy"],
        "author": [{"given": "Charles", "family": "Harris"}],
        "container-title": ["Nature"],
        "volume": "585",
        "issued": {"date-parts": [[2020, 9, 16]]},
        "type": "journal-article",
        "is-referenced-by-count": 14000,
        "abstract": "<jats:p>Array  programming</jats:p>",
        "reference": [{"DOI": "10.1/a"}, {"key": "no-doi"}],
        "updated-by": [{"label": "Correction"}],
      }),
    ),
    (SEMANTIC_SCHOLAR, json!({"tldr": {"text": "NumPy is the array standard."}})),
  ]);
  report.pmid = Some("32939066".to_string());
  report.pmc_id = Some("7759461".to_string());
  report.hypothesis_annotations = 2;

  let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
  let md = render::render_on(&report, date);

  let expected_order = [
    "# Array programming with NumPy",
    "**DOI:**",
    "**Authors:** Charles Harris",
    "**Journal:** Nature, vol. 585",
    "**Published:** 2020-09-16",
    "**Type:** journal-article",
    "**PubMed:**",
    "**PMC:**",
    "## TL;DR",
    "## Abstract",
    "## Citation Counts",
    "## Open Access",
    "## Editorial Notices",
    "## Hypothesis Annotations",
    "## References",
    "*Generated by scholar on 2024-06-01*",
  ];
  let mut cursor = 0;
  for needle in expected_order {
    let at = md[cursor..].find(needle).unwrap_or_else(|| panic!("missing `{needle}`"));
    cursor += at + needle.len();
  }

  assert!(md.contains("- **Has correction/erratum**"));
  assert!(md.contains("**2 references** (1 with DOI)"));
  // PMC id resolved, so the PubMed Central link leads the open access list.
  assert!(md.contains("- [PubMed Central](https://www.ncbi.nlm.nih.gov/pmc/articles/PMC7759461/)"));
}

#[test]
fn raw_report_serializes_without_absent_keys() {
  let report = report_with(vec![(CROSSREF, json!({"title": ["t"]}))]);
  let raw = serde_json::to_value(&report).expect("report serializes");
  assert_eq!(raw["doi"], "10.1038/s41586-020-2649-2");
  assert!(raw.get("pmid").is_none());
  assert!(raw.get("recommendations").is_none());
  assert!(raw["sources"]["crossref"]["title"][0] == json!("t"));
}
