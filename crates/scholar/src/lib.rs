//! Multi-source citation aggregation for academic papers.
//!
//! `scholar` resolves an academic-paper identifier (a DOI, a URL containing
//! one, or a PDF document) and assembles a single unified citation report by
//! querying several independent public APIs and reconciling their partial and
//! conflicting answers. No authentication is required by any source.
//!
//! # Data sources
//!
//! - CrossRef (metadata, references, funding, editorial notices)
//! - OpenAlex (citations, open access, concepts)
//! - Semantic Scholar (citations, TL;DR, recommendations)
//! - PubMed / PubMed Central (cross-referenced identifiers)
//! - Europe PMC (metadata, full-text links)
//! - PubPeer (post-publication commentary)
//! - Hypothesis (annotation counts)
//!
//! # Getting started
//!
//! ```no_run
//! use scholar::{aggregate::aggregate, prelude::*, render::to_markdown, resolve::resolve_input};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let governor = Governor::new(GovernorConfig::default())?;
//!
//!   // Normalize arbitrary input into a canonical DOI
//!   let doi = resolve_input(&governor, "https://doi.org/10.1038/s41586-020-2649-2")
//!     .await?
//!     .expect("no DOI found");
//!
//!   // One gate per invocation, then fetch from every source
//!   governor.check_rate_limit().await?;
//!   governor.record_request()?;
//!   let report = aggregate(&governor, &doi, &scholar::aggregate::LogProgress).await;
//!
//!   println!("{}", to_markdown(&report));
//!   Ok(())
//! }
//! ```
//!
//! # Module organization
//!
//! - [`doi`]: DOI extraction from text, URLs, and PDF documents
//! - [`resolve`]: input dispatch and arXiv-to-published canonicalization
//! - [`governor`]: rate limiting, retry/backoff, and proxy rotation
//! - [`sources`]: one adapter per remote API
//! - [`aggregate`]: orchestration of all sources into one report
//! - [`reconcile`]: per-field priority merging across sources
//! - [`render`]: deterministic Markdown rendering
//!
//! # Design notes
//!
//! Every outbound call, including identifier canonicalization, goes through a
//! single [`governor::Governor`] so the politeness and retry discipline is
//! uniform. Individual source failures never propagate: an adapter returns
//! data or a defined absence, and a source that never succeeds simply
//! contributes nothing to the report. Only the rate-limit quota check and the
//! caller's "no identifiers resolved" check are fatal.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

pub mod aggregate;
pub mod doi;
pub mod error;
pub mod governor;
pub mod reconcile;
pub mod render;
pub mod resolve;
pub mod sources;

/// Common types for ergonomic imports.
///
/// ```no_run
/// use scholar::prelude::*;
///
/// fn example() -> Result<Governor> {
///   Governor::new(GovernorConfig::default())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    error::{Result, ScholarError},
    governor::{Governor, GovernorConfig},
  };
}
