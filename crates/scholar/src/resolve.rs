//! Input resolution and identifier canonicalization.
//!
//! [`resolve_input`] dispatches on the shape of a user-supplied string
//! (bare DOI, URL, PDF path, or free text) and funnels every extracted DOI
//! through [`resolve_arxiv_doi`], which upgrades an arXiv
//! preprint-registration DOI to its canonical published form when one can be
//! found. Canonicalization uses the same governed transport as every other
//! outbound call, so it shares the retry, header, and proxy discipline.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
  doi::{arxiv_token, extract_doi, extract_doi_from_pdf, extract_doi_from_url},
  error::Result,
  governor::Governor,
  sources::{crossref, semantic_scholar},
};

/// Resolves an arXiv DOI (`10.48550/arXiv.*`) to its published DOI.
///
/// Two chances, both non-fatal on failure:
///
/// 1. Semantic Scholar's record for the arXiv token may link the published
///    DOI directly under `externalIds`.
/// 2. Failing that, the preprint's title is searched on CrossRef, and the
///    first candidate whose DOI differs (case-insensitively) and whose title
///    contains the queried title wins.
///
/// Any DOI that is not an arXiv registration, and any lookup that comes up
/// empty, returns the input unchanged.
pub async fn resolve_arxiv_doi(governor: &Governor, doi: &str) -> String {
  let Some(token) = arxiv_token(doi) else { return doi.to_string() };
  let wanted = doi.to_lowercase();

  let mut title = None;
  if let Some(record) = semantic_scholar::lookup_arxiv(governor, token, "externalIds,title").await {
    if let Some(published) = record.pointer("/externalIds/DOI").and_then(Value::as_str) {
      if !published.is_empty() && published.to_lowercase() != wanted {
        info!("resolved arXiv DOI {} -> {}", doi, published);
        return published.to_string();
      }
    }
    title = record.get("title").and_then(Value::as_str).map(str::to_owned);
  }

  if let Some(title) = title {
    let wanted_title = title.to_lowercase();
    for item in crossref::search_title(governor, &title, 3).await {
      let candidate = item.get("DOI").and_then(Value::as_str).unwrap_or_default();
      let candidate_title =
        item.pointer("/title/0").and_then(Value::as_str).unwrap_or_default().to_lowercase();
      if !candidate.is_empty()
        && candidate.to_lowercase() != wanted
        && candidate_title.contains(&wanted_title)
      {
        info!("resolved arXiv DOI {} -> {} (via CrossRef title match)", doi, candidate);
        return candidate.to_string();
      }
    }
  }

  doi.to_string()
}

/// Resolves arbitrary input into a canonical DOI, or `None` if none found.
///
/// Dispatch order: a string starting with `10.` is a DOI; `http://` or
/// `https://` is a URL; an existing `.pdf` path goes through document
/// extraction; anything else is scanned as free text. A missing file path is
/// the one fatal case, surfaced as
/// [`ScholarError::FileNotFound`](crate::error::ScholarError::FileNotFound).
pub async fn resolve_input(governor: &Governor, input: &str) -> Result<Option<String>> {
  if input.starts_with("10.") {
    return Ok(Some(resolve_arxiv_doi(governor, input).await));
  }

  if input.starts_with("http://") || input.starts_with("https://") {
    return Ok(match extract_doi_from_url(input) {
      Some(doi) => Some(resolve_arxiv_doi(governor, &doi).await),
      None => None,
    });
  }

  // A .pdf input is always treated as a file path; a missing file is fatal
  // rather than a silent "no identifier".
  let path = Path::new(input);
  if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) {
    debug!("extracting DOI from PDF: {}", path.display());
    return Ok(match extract_doi_from_pdf(path)? {
      Some(doi) => Some(resolve_arxiv_doi(governor, &doi).await),
      None => None,
    });
  }

  Ok(match extract_doi(input) {
    Some(doi) => Some(resolve_arxiv_doi(governor, &doi).await),
    None => None,
  })
}
