//! Per-field reconciliation across sources.
//!
//! Each logical field has its own fixed source-priority order; the first
//! source with a non-empty answer wins in its entirety. There is no merging
//! of partial answers across sources within one field. Every function here
//! is total: all-sources-absent yields an empty result, and a present record
//! missing an expected sub-key is treated as absent for that field only.
//!
//! Open-access links are the one accumulation rather than a priority chain:
//! each present source contributes at most one link, in a fixed order.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::aggregate::{AggregateReport, CROSSREF, EUROPEPMC, OPENALEX, SEMANTIC_SCHOLAR};

lazy_static! {
  /// HTML tags stripped out of abstracts.
  static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("invalid tag regex");
  /// Whitespace runs collapsed to single spaces.
  static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("invalid whitespace regex");
}

/// CrossRef date-kind keys, tried in order of authority.
const DATE_KEYS: [&str; 4] = ["published-print", "published-online", "issued", "created"];

/// A non-empty string at a JSON pointer.
fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
  value.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// CrossRef titles arrive as a one-element list; tolerate a bare string too.
fn first_title(value: &Value) -> Option<&str> {
  match value.get("title")? {
    Value::Array(items) => items.first().and_then(Value::as_str),
    Value::String(s) => Some(s.as_str()),
    _ => None,
  }
  .filter(|s| !s.is_empty())
}

/// Reconciled title: CrossRef, then Semantic Scholar, then OpenAlex, then
/// Europe PMC, falling back to the DOI itself.
pub fn title(report: &AggregateReport) -> String {
  report
    .source(CROSSREF)
    .and_then(first_title)
    .or_else(|| report.source(SEMANTIC_SCHOLAR).and_then(|ss| str_at(ss, "/title")))
    .or_else(|| report.source(OPENALEX).and_then(|oa| str_at(oa, "/title")))
    .or_else(|| report.source(EUROPEPMC).and_then(|epmc| str_at(epmc, "/title")))
    .unwrap_or(&report.doi)
    .to_string()
}

/// Reconciled author names.
///
/// CrossRef structured given/family names win, then OpenAlex authorship
/// display names, then Semantic Scholar names, then Europe PMC's single
/// pre-joined author string (one element). The first source with at least
/// one non-empty name wins entirely.
pub fn authors(report: &AggregateReport) -> Vec<String> {
  if let Some(list) = report.source(CROSSREF).and_then(|cr| cr.get("author")).and_then(Value::as_array)
  {
    let names: Vec<String> = list
      .iter()
      .filter_map(|author| {
        let given = str_at(author, "/given").unwrap_or_default();
        let family = str_at(author, "/family").unwrap_or_default();
        let name = format!("{given} {family}").trim().to_string();
        (!name.is_empty()).then_some(name)
      })
      .collect();
    if !names.is_empty() {
      return names;
    }
  }

  if let Some(list) =
    report.source(OPENALEX).and_then(|oa| oa.get("authorships")).and_then(Value::as_array)
  {
    let names: Vec<String> = list
      .iter()
      .filter_map(|authorship| str_at(authorship, "/author/display_name"))
      .map(str::to_owned)
      .collect();
    if !names.is_empty() {
      return names;
    }
  }

  if let Some(list) =
    report.source(SEMANTIC_SCHOLAR).and_then(|ss| ss.get("authors")).and_then(Value::as_array)
  {
    let names: Vec<String> =
      list.iter().filter_map(|author| str_at(author, "/name")).map(str::to_owned).collect();
    if !names.is_empty() {
      return names;
    }
  }

  if let Some(joined) = report.source(EUROPEPMC).and_then(|epmc| str_at(epmc, "/authorString")) {
    return vec![joined.to_string()];
  }

  Vec::new()
}

/// Reconciled journal line.
///
/// CrossRef contributes container title plus whichever of volume, issue, and
/// page are non-empty, comma-joined; otherwise Semantic Scholar's named
/// journal; otherwise Europe PMC's journal title.
pub fn journal(report: &AggregateReport) -> Option<String> {
  if let Some(cr) = report.source(CROSSREF) {
    let container = match cr.get("container-title") {
      Some(Value::Array(items)) => items.first().and_then(Value::as_str),
      Some(Value::String(s)) => Some(s.as_str()),
      _ => None,
    };
    if let Some(container) = container.filter(|s| !s.is_empty()) {
      let mut parts = vec![container.to_string()];
      if let Some(volume) = str_at(cr, "/volume") {
        parts.push(format!("vol. {volume}"));
      }
      if let Some(issue) = str_at(cr, "/issue") {
        parts.push(format!("no. {issue}"));
      }
      if let Some(page) = str_at(cr, "/page") {
        parts.push(format!("pp. {page}"));
      }
      return Some(parts.join(", "));
    }
  }

  if let Some(name) = report.source(SEMANTIC_SCHOLAR).and_then(|ss| str_at(ss, "/journal/name")) {
    return Some(name.to_string());
  }

  report.source(EUROPEPMC).and_then(|epmc| str_at(epmc, "/journalTitle")).map(str::to_owned)
}

/// Reconciled publication date.
///
/// CrossRef's `date-parts` are tried across the four date kinds in fixed
/// order, formatted `YYYY-MM-DD` with three components or bare `YYYY` with
/// one; then Semantic Scholar's date string, OpenAlex's publication year,
/// and Europe PMC's publication year.
pub fn date(report: &AggregateReport) -> Option<String> {
  if let Some(cr) = report.source(CROSSREF) {
    for key in DATE_KEYS {
      let parts = match cr.pointer(&format!("/{key}/date-parts/0")).and_then(Value::as_array) {
        Some(parts) => parts,
        None => continue,
      };
      let numbers: Vec<i64> = parts.iter().filter_map(Value::as_i64).collect();
      match numbers.as_slice() {
        [year, month, day, ..] => return Some(format!("{year}-{month:02}-{day:02}")),
        [year, ..] => return Some(year.to_string()),
        [] => continue,
      }
    }
  }

  if let Some(date) = report.source(SEMANTIC_SCHOLAR).and_then(|ss| str_at(ss, "/publicationDate")) {
    return Some(date.to_string());
  }

  if let Some(year) =
    report.source(OPENALEX).and_then(|oa| oa.get("publication_year")).and_then(Value::as_i64)
  {
    return Some(year.to_string());
  }

  report.source(EUROPEPMC).and_then(|epmc| str_at(epmc, "/pubYear")).map(str::to_owned)
}

/// Reconciled publication type: CrossRef's `type`, then the first Semantic
/// Scholar publication type.
pub fn publication_type(report: &AggregateReport) -> Option<String> {
  report
    .source(CROSSREF)
    .and_then(|cr| str_at(cr, "/type"))
    .or_else(|| report.source(SEMANTIC_SCHOLAR).and_then(|ss| str_at(ss, "/publicationTypes/0")))
    .map(str::to_owned)
}

/// Reconciled abstract, HTML tags stripped and whitespace collapsed.
///
/// CrossRef's `abstract` wins over Europe PMC's `abstractText`.
pub fn abstract_text(report: &AggregateReport) -> Option<String> {
  let raw = report
    .source(CROSSREF)
    .and_then(|cr| str_at(cr, "/abstract"))
    .or_else(|| report.source(EUROPEPMC).and_then(|epmc| str_at(epmc, "/abstractText")))?;
  let stripped = HTML_TAG.replace_all(raw, "");
  let collapsed = WHITESPACE.replace_all(&stripped, " ");
  let text = collapsed.trim().to_string();
  (!text.is_empty()).then_some(text)
}

/// Accumulated open-access links as `(label, url)` pairs.
///
/// Fixed contribution order regardless of source-map ordering: PubMed
/// Central (when a PMC id was resolved), Semantic Scholar's open-access PDF,
/// OpenAlex's open-access URL with its status label, Europe PMC's PDF-typed
/// full-text URL (only when its open-access flag is exactly `"Y"`), and the
/// first Creative-Commons license URL from CrossRef.
pub fn oa_links(report: &AggregateReport) -> Vec<(String, String)> {
  let mut links = Vec::new();

  if let Some(pmc) = &report.pmc_id {
    links.push((
      "PubMed Central".to_string(),
      format!("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC{pmc}/"),
    ));
  }

  if let Some(url) = report.source(SEMANTIC_SCHOLAR).and_then(|ss| str_at(ss, "/openAccessPdf/url"))
  {
    links.push(("Semantic Scholar PDF".to_string(), url.to_string()));
  }

  if let Some(oa) = report.source(OPENALEX) {
    if let Some(url) = str_at(oa, "/open_access/oa_url") {
      let status = str_at(oa, "/open_access/oa_status").unwrap_or("open");
      links.push((format!("OpenAlex ({status})"), url.to_string()));
    }
  }

  if let Some(epmc) = report.source(EUROPEPMC) {
    if str_at(epmc, "/isOpenAccess") == Some("Y") {
      let urls = epmc
        .pointer("/fullTextUrlList/fullTextUrl")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
      if let Some(url) = urls
        .iter()
        .find(|entry| str_at(entry, "/documentStyle") == Some("pdf"))
        .and_then(|entry| str_at(entry, "/url"))
      {
        links.push(("Europe PMC PDF".to_string(), url.to_string()));
      }
    }
  }

  if let Some(licenses) =
    report.source(CROSSREF).and_then(|cr| cr.get("license")).and_then(Value::as_array)
  {
    if let Some(url) = licenses
      .iter()
      .filter_map(|license| str_at(license, "/URL"))
      .find(|url| url.contains("creativecommons.org"))
    {
      links.push(("License".to_string(), url.to_string()));
    }
  }

  links
}

/// Editorial notices derived from CrossRef's relation graph and update
/// history.
///
/// Detection order is stable: relation entries first (`is-retracted-by`,
/// then `has-expression-of-concern`), then `update-to` and `updated-by`
/// entries in list order with their labels scanned case-insensitively for
/// `retract`, `correction`/`erratum`, and `concern`. Duplicates keep only
/// their first occurrence.
pub fn notices(report: &AggregateReport) -> Vec<String> {
  let mut notices: Vec<String> = Vec::new();
  let Some(cr) = report.source(CROSSREF) else { return notices };

  if cr.pointer("/relation/is-retracted-by").is_some() {
    push_unique(&mut notices, "RETRACTED");
  }
  if cr.pointer("/relation/has-expression-of-concern").is_some() {
    push_unique(&mut notices, "Expression of concern");
  }

  let updates = ["update-to", "updated-by"]
    .into_iter()
    .filter_map(|key| cr.get(key).and_then(Value::as_array))
    .flatten();
  for update in updates {
    let label = str_at(update, "/label").unwrap_or_default().to_lowercase();
    if label.contains("retract") {
      push_unique(&mut notices, "RETRACTED");
    } else if label.contains("correction") || label.contains("erratum") {
      push_unique(&mut notices, "Has correction/erratum");
    } else if label.contains("concern") {
      push_unique(&mut notices, "Expression of concern");
    }
  }

  notices
}

/// Appends a notice only if it is not already present.
fn push_unique(notices: &mut Vec<String>, notice: &str) {
  if !notices.iter().any(|existing| existing == notice) {
    notices.push(notice.to_string());
  }
}
