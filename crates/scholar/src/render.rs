//! Deterministic Markdown rendering of an aggregate report.
//!
//! Sections appear in a fixed order and are omitted entirely, header
//! included, when their underlying reconciled value is empty. The output is
//! a pure function of the report and the generation date.

use chrono::{Local, NaiveDate};
use serde_json::Value;

use crate::{
  aggregate::{AggregateReport, CROSSREF, EUROPEPMC, OPENALEX, PUBPEER, SEMANTIC_SCHOLAR},
  reconcile,
};

/// At most this many authors are listed before `et al.`.
const AUTHOR_DISPLAY_LIMIT: usize = 10;

/// OpenAlex concepts below this relevance score are dropped.
const CONCEPT_SCORE_THRESHOLD: f64 = 0.3;

/// At most this many topics are listed.
const CONCEPT_LIMIT: usize = 8;

/// At most this many recommended papers are listed.
const RECOMMENDATION_DISPLAY_LIMIT: usize = 5;

/// Renders the report as Markdown, dated today.
pub fn to_markdown(report: &AggregateReport) -> String {
  render_on(report, Local::now().date_naive())
}

/// Renders the report as Markdown with an explicit generation date.
///
/// Exposed so callers (and tests) can produce byte-identical documents.
pub fn render_on(report: &AggregateReport, date: NaiveDate) -> String {
  let mut lines: Vec<String> = Vec::new();
  let doi = &report.doi;
  let cr = report.source(CROSSREF);
  let oa = report.source(OPENALEX);
  let ss = report.source(SEMANTIC_SCHOLAR);

  lines.push(format!("# {}", reconcile::title(report)));
  lines.push(String::new());

  lines.push(format!("**DOI:** [{doi}](https://doi.org/{doi})"));

  let authors = reconcile::authors(report);
  if !authors.is_empty() {
    let mut display = authors[..authors.len().min(AUTHOR_DISPLAY_LIMIT)].join(", ");
    if authors.len() > AUTHOR_DISPLAY_LIMIT {
      display.push_str(" *et al.*");
    }
    lines.push(format!("**Authors:** {display}"));
  }

  if let Some(journal) = reconcile::journal(report) {
    lines.push(format!("**Journal:** {journal}"));
  }

  if let Some(date) = reconcile::date(report) {
    lines.push(format!("**Published:** {date}"));
  }

  if let Some(kind) = reconcile::publication_type(report) {
    lines.push(format!("**Type:** {kind}"));
  }

  if let Some(pmid) = &report.pmid {
    lines.push(format!("**PubMed:** [{pmid}](https://pubmed.ncbi.nlm.nih.gov/{pmid}/)"));
  }
  if let Some(pmc) = &report.pmc_id {
    lines.push(format!(
      "**PMC:** [PMC{pmc}](https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{pmc}/)"
    ));
  }

  lines.push(String::new());
  lines.push("---".to_string());
  lines.push(String::new());

  if let Some(tldr) = ss.and_then(|ss| ss.pointer("/tldr/text")).and_then(Value::as_str) {
    if !tldr.is_empty() {
      lines.push("## TL;DR".to_string());
      lines.push(String::new());
      lines.push(format!("*{tldr}*"));
      lines.push(String::new());
    }
  }

  if let Some(abstract_text) = reconcile::abstract_text(report) {
    lines.push("## Abstract".to_string());
    lines.push(String::new());
    lines.push(abstract_text);
    lines.push(String::new());
  }

  let citation_rows = citation_rows(report);
  if !citation_rows.is_empty() {
    lines.push("## Citation Counts".to_string());
    lines.push(String::new());
    lines.push("| Source | Citations | Notes |".to_string());
    lines.push("|--------|-----------|-------|".to_string());
    lines.extend(citation_rows);
    lines.push(String::new());
  }

  let oa_links = reconcile::oa_links(report);
  if !oa_links.is_empty() {
    lines.push("## Open Access".to_string());
    lines.push(String::new());
    for (label, url) in oa_links {
      lines.push(format!("- [{label}]({url})"));
    }
    lines.push(String::new());
  }

  let notices = reconcile::notices(report);
  if !notices.is_empty() {
    lines.push("## Editorial Notices".to_string());
    lines.push(String::new());
    for notice in notices {
      lines.push(format!("- **{notice}**"));
    }
    lines.push(String::new());
  }

  if let Some(section) = pubpeer_section(report) {
    lines.extend(section);
  }

  if report.hypothesis_annotations > 0 {
    let count = report.hypothesis_annotations;
    let noun = if count == 1 { "annotation" } else { "annotations" };
    lines.push("## Hypothesis Annotations".to_string());
    lines.push(String::new());
    lines.push(format!(
      "**{count} {noun}** — [View](https://hypothes.is/search?q=doi%3A{doi})"
    ));
    lines.push(String::new());
  }

  let topics = topic_lines(oa);
  if !topics.is_empty() {
    lines.push("## Topics".to_string());
    lines.push(String::new());
    lines.extend(topics);
    lines.push(String::new());
  }

  let funding = funding_lines(cr);
  if !funding.is_empty() {
    lines.push("## Funding".to_string());
    lines.push(String::new());
    lines.extend(funding);
    lines.push(String::new());
  }

  if let Some(references) = cr.and_then(|cr| cr.get("reference")).and_then(Value::as_array) {
    if !references.is_empty() {
      let with_doi = references.iter().filter(|r| r.get("DOI").is_some()).count();
      lines.push("## References".to_string());
      lines.push(String::new());
      lines.push(format!("**{} references** ({} with DOI)", references.len(), with_doi));
      lines.push(String::new());
    }
  }

  let recommendations = recommendation_lines(report);
  if !recommendations.is_empty() {
    lines.push("## Recommended Papers".to_string());
    lines.push(String::new());
    lines.extend(recommendations);
    lines.push(String::new());
  }

  lines.push("---".to_string());
  lines.push(format!("*Generated by scholar on {}*", date.format("%Y-%m-%d")));
  lines.join("\n")
}

/// Citation-count table rows for whichever sources report a count.
fn citation_rows(report: &AggregateReport) -> Vec<String> {
  let mut rows = Vec::new();

  if let Some(count) =
    report.source(CROSSREF).and_then(|cr| cr.get("is-referenced-by-count")).and_then(Value::as_i64)
  {
    rows.push(format!("| CrossRef | {} | - |", with_commas(count)));
  }

  if let Some(oa) = report.source(OPENALEX) {
    if let Some(count) = oa.get("cited_by_count").and_then(Value::as_i64) {
      let note = oa
        .pointer("/cited_by_percentile_year/min")
        .and_then(Value::as_i64)
        .map_or_else(|| "-".to_string(), |p| format!("{p}th percentile for year"));
      rows.push(format!("| OpenAlex | {} | {} |", with_commas(count), note));
    }
  }

  if let Some(ss) = report.source(SEMANTIC_SCHOLAR) {
    if let Some(count) = ss.get("citationCount").and_then(Value::as_i64) {
      let influential = ss.get("influentialCitationCount").and_then(Value::as_i64).unwrap_or(0);
      let note =
        if influential > 0 { format!("{influential} influential") } else { "-".to_string() };
      rows.push(format!("| Semantic Scholar | {} | {} |", with_commas(count), note));
    }
  }

  if let Some(count) =
    report.source(EUROPEPMC).and_then(|epmc| epmc.get("citedByCount")).and_then(Value::as_i64)
  {
    rows.push(format!("| Europe PMC | {} | - |", with_commas(count)));
  }

  rows
}

/// PubPeer summary, rendered only when the comment count is positive.
///
/// The `users` field arrives as a number from some client versions and a
/// pre-joined string from others; both shapes are handled.
fn pubpeer_section(report: &AggregateReport) -> Option<Vec<String>> {
  let pp = report.source(PUBPEER)?;
  let comments = pp.get("total_comments").and_then(Value::as_i64).unwrap_or(0);
  if comments <= 0 {
    return None;
  }

  let user_str = match pp.get("users") {
    Some(Value::Number(n)) => {
      let users = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0);
      let noun = if users == 1 { "user" } else { "users" };
      Some(format!("{users} {noun}"))
    },
    Some(Value::String(s)) if !s.is_empty() => Some(format!("{s} users")),
    _ => None,
  };

  let url = pp
    .get("url")
    .and_then(Value::as_str)
    .map_or_else(|| format!("https://pubpeer.com/search?q={}", report.doi), str::to_owned);

  let noun = if comments == 1 { "comment" } else { "comments" };
  let mut summary = format!("**{comments} {noun}**");
  if let Some(user_str) = user_str {
    summary.push_str(&format!(" from {user_str}"));
  }

  Some(vec![
    "## PubPeer".to_string(),
    String::new(),
    format!("{summary} — [View on PubPeer]({url})"),
    String::new(),
  ])
}

/// Topic lines from OpenAlex concepts above the relevance threshold.
fn topic_lines(oa: Option<&Value>) -> Vec<String> {
  let concepts = match oa.and_then(|oa| oa.get("concepts")).and_then(Value::as_array) {
    Some(concepts) => concepts,
    None => return Vec::new(),
  };
  concepts
    .iter()
    .filter(|c| c.get("score").and_then(Value::as_f64).unwrap_or(0.0) > CONCEPT_SCORE_THRESHOLD)
    .take(CONCEPT_LIMIT)
    .map(|c| {
      let name = c.get("display_name").and_then(Value::as_str).unwrap_or("?");
      let score = c.get("score").and_then(Value::as_f64).unwrap_or(0.0);
      format!("- {} ({:.0}%)", name, score * 100.0)
    })
    .collect()
}

/// Funding lines from CrossRef's funder list.
fn funding_lines(cr: Option<&Value>) -> Vec<String> {
  let funders = match cr.and_then(|cr| cr.get("funder")).and_then(Value::as_array) {
    Some(funders) => funders,
    None => return Vec::new(),
  };
  funders
    .iter()
    .map(|f| {
      let name = f.get("name").and_then(Value::as_str).unwrap_or("Unknown");
      let awards: Vec<&str> = f
        .get("award")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_str)
        .collect();
      if awards.is_empty() {
        format!("- {name}")
      } else {
        format!("- {} (grants: {})", name, awards.join(", "))
      }
    })
    .collect()
}

/// Recommended-paper lines: title, first author (`et al.` if more), year,
/// and citation count, each part omitted when missing.
fn recommendation_lines(report: &AggregateReport) -> Vec<String> {
  let recs = match &report.recommendations {
    Some(recs) => recs,
    None => return Vec::new(),
  };
  recs
    .iter()
    .take(RECOMMENDATION_DISPLAY_LIMIT)
    .map(|rec| {
      let mut parts =
        vec![rec.get("title").and_then(Value::as_str).unwrap_or("Untitled").to_string()];

      if let Some(authors) = rec.get("authors").and_then(Value::as_array) {
        if let Some(first) = authors.first().and_then(|a| a.get("name")).and_then(Value::as_str) {
          let mut author = first.to_string();
          if authors.len() > 1 {
            author.push_str(" et al.");
          }
          parts.push(author);
        }
      }

      if let Some(year) = rec.get("year").and_then(Value::as_i64) {
        parts.push(year.to_string());
      }

      if let Some(citations) = rec.get("citationCount").and_then(Value::as_i64) {
        if citations > 0 {
          parts.push(format!("{} citations", with_commas(citations)));
        }
      }

      format!("- {}", parts.join(" — "))
    })
    .collect()
}

/// Formats an integer with thousands separators.
fn with_commas(n: i64) -> String {
  let digits = n.abs().to_string();
  let mut grouped = String::new();
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  if n < 0 {
    format!("-{grouped}")
  } else {
    grouped
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::aggregate::test_support::bare_report;

  fn test_date() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date") }

  #[test]
  fn minimal_report_renders_header_link_separator_footer_only() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(CROSSREF.into(), json!({"title": ["Only a Title"]}));

    let md = render_on(&report, test_date());
    let lines: Vec<&str> = md.lines().collect();
    assert_eq!(lines, vec![
      "# Only a Title",
      "",
      "**DOI:** [10.1/x](https://doi.org/10.1/x)",
      "",
      "---",
      "",
      "---",
      "*Generated by scholar on 2024-06-01*",
    ]);
  }

  #[test]
  fn empty_sections_are_omitted_but_order_is_preserved() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(CROSSREF.into(), json!({
      "title": ["Paper"],
      "is-referenced-by-count": 12,
      "funder": [{"name": "NSF", "award": ["123", "456"]}],
    }));
    // No PubPeer, zero annotations: neither section may appear.
    let md = render_on(&report, test_date());
    assert!(!md.contains("## PubPeer"));
    assert!(!md.contains("## Hypothesis Annotations"));

    let citations = md.find("## Citation Counts").expect("citation section");
    let funding = md.find("## Funding").expect("funding section");
    assert!(citations < funding);
    assert!(md.contains("- NSF (grants: 123, 456)"));
  }

  #[test]
  fn author_list_truncates_at_ten_with_et_al() {
    let mut report = bare_report("10.1/x");
    let authors: Vec<Value> =
      (1..=12).map(|i| json!({"given": "A", "family": format!("Author{i}")})).collect();
    report.sources.insert(CROSSREF.into(), json!({"title": ["t"], "author": authors}));

    let md = render_on(&report, test_date());
    assert!(md.contains("A Author10 *et al.*"));
    assert!(!md.contains("Author11"));
  }

  #[test]
  fn citation_table_lists_each_reporting_source() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(CROSSREF.into(), json!({"is-referenced-by-count": 1234}));
    report.sources.insert(OPENALEX.into(), json!({
      "cited_by_count": 1300,
      "cited_by_percentile_year": {"min": 99},
    }));
    report.sources.insert(SEMANTIC_SCHOLAR.into(), json!({
      "citationCount": 1280,
      "influentialCitationCount": 55,
    }));

    let md = render_on(&report, test_date());
    assert!(md.contains("| CrossRef | 1,234 | - |"));
    assert!(md.contains("| OpenAlex | 1,300 | 99th percentile for year |"));
    assert!(md.contains("| Semantic Scholar | 1,280 | 55 influential |"));
    assert!(!md.contains("| Europe PMC |"));
  }

  #[test]
  fn pubpeer_section_handles_numeric_and_string_users() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(PUBPEER.into(), json!({"total_comments": 1, "users": 1}));
    let md = render_on(&report, test_date());
    assert!(md.contains("**1 comment** from 1 user —"));

    report
      .sources
      .insert(PUBPEER.into(), json!({"total_comments": 3, "users": "Peer One, Peer Two"}));
    let md = render_on(&report, test_date());
    assert!(md.contains("**3 comments** from Peer One, Peer Two users —"));
  }

  #[test]
  fn pubpeer_section_absent_when_no_comments() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(PUBPEER.into(), json!({"total_comments": 0, "users": 4}));
    assert!(!render_on(&report, test_date()).contains("## PubPeer"));
  }

  #[test]
  fn topics_filter_by_score_and_cap_at_eight() {
    let mut report = bare_report("10.1/x");
    let concepts: Vec<Value> = (0..12)
      .map(|i| json!({"display_name": format!("Concept{i}"), "score": 0.9 - 0.05 * i as f64}))
      .collect();
    report.sources.insert(OPENALEX.into(), json!({"concepts": concepts}));

    let md = render_on(&report, test_date());
    // Scores 0.9 down to 0.35 pass the 0.3 threshold; the cap keeps eight.
    assert!(md.contains("- Concept0 (90%)"));
    assert!(md.contains("- Concept7 (55%)"));
    assert!(!md.contains("Concept8"));
  }

  #[test]
  fn recommendations_cap_at_five_and_omit_missing_parts() {
    let mut report = bare_report("10.1/x");
    let mut recs: Vec<Value> = (0..6)
      .map(|i| {
        json!({
          "title": format!("Rec{i}"),
          "authors": [{"name": "First"}, {"name": "Second"}],
          "year": 2020,
          "citationCount": 10,
        })
      })
      .collect();
    recs[1] = json!({"title": "Sparse", "citationCount": 0});
    report.recommendations = Some(recs);

    let md = render_on(&report, test_date());
    assert!(md.contains("- Rec0 — First et al. — 2020 — 10 citations"));
    assert!(md.contains("- Sparse\n"));
    assert!(!md.contains("Rec5"));
  }

  #[test]
  fn hypothesis_section_uses_singular_noun() {
    let mut report = bare_report("10.1/x");
    report.hypothesis_annotations = 1;
    assert!(render_on(&report, test_date()).contains("**1 annotation** —"));
  }

  #[test]
  fn with_commas_groups_digits() {
    assert_eq!(with_commas(0), "0");
    assert_eq!(with_commas(999), "999");
    assert_eq!(with_commas(1000), "1,000");
    assert_eq!(with_commas(1234567), "1,234,567");
  }

  #[test]
  fn rendering_is_deterministic() {
    let mut report = bare_report("10.1/x");
    report.sources.insert(CROSSREF.into(), json!({"title": ["Paper"]}));
    assert_eq!(render_on(&report, test_date()), render_on(&report, test_date()));
  }
}
