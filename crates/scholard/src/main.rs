//! Command line interface for the scholar citation aggregator.
//!
//! Resolves DOIs, URLs, and PDF paths into canonical identifiers, fetches
//! citation data, metadata, open access links, editorial notices, and
//! community feedback from multiple public APIs, and writes one unified
//! Markdown report. No authentication required.
//!
//! # Usage
//!
//! ```bash
//! scholar 10.1038/s41586-020-2649-2
//! scholar https://doi.org/10.1038/s41586-020-2649-2
//! scholar paper.pdf
//! scholar --title "Attention is All You Need" --author Vaswani
//! ```

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  io::Write,
  path::{Path, PathBuf},
};

use clap::{builder::ArgAction, Parser};
use console::style;
use scholar::{
  aggregate::{aggregate, AggregateReport, Progress, CROSSREF},
  doi::dedupe,
  governor::{Governor, GovernorConfig},
  render::to_markdown,
  resolve::resolve_input,
  sources::crossref,
};
use serde_json::Value;
use tracing::trace;
use tracing_subscriber::EnvFilter;

pub mod error;

use crate::error::{Result, ScholardError};

/// How many candidates to request from a title search.
const TITLE_SEARCH_ROWS: usize = 5;

/// Command line interface configuration and argument parsing.
#[derive(Parser)]
#[command(author, version, about = "Aggregate citation data from multiple academic APIs")]
pub struct Cli {
  /// DOIs, URLs, or PDF file paths
  inputs: Vec<String>,

  /// Paper title (for CrossRef search when DOI is unknown)
  #[arg(long, short)]
  title: Option<String>,

  /// First author last name (used with --title to narrow search)
  #[arg(long, short)]
  author: Option<String>,

  /// Output file path (default: auto-generated under ./output)
  #[arg(long, short)]
  output: Option<PathBuf>,

  /// Output raw JSON instead of Markdown
  #[arg(long)]
  json: bool,

  /// Force proxy usage (overrides ~/.scholar-proxies.json)
  #[arg(long, conflicts_with = "no_proxy")]
  proxy: bool,

  /// Disable proxy (overrides ~/.scholar-proxies.json)
  #[arg(long)]
  no_proxy: bool,

  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(short, long, action = ArgAction::Count, help = "Increase logging verbosity")]
  verbose: u8,
}

/// Configures the logging system based on the verbosity level.
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Inline per-source progress, matching the shape of a long-running fetch:
/// `  CrossRef...` then ` done` on the same line.
struct ConsoleProgress;

impl Progress for ConsoleProgress {
  fn started(&self, source: &str) {
    print!("  {source}...");
    let _ = std::io::stdout().flush();
  }

  fn finished(&self, _source: &str) { println!(" done"); }
}

/// Entry point for the scholar CLI.
///
/// Exit code is 1 when no identifiers resolve or the invocation quota is
/// exceeded, 0 otherwise.
#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  if let Err(e) = run(cli).await {
    eprintln!("{} {}", style("✗").red(), e);
    std::process::exit(1);
  }
}

/// Resolves inputs, gates the invocation, and produces the report(s).
async fn run(cli: Cli) -> Result<()> {
  let proxy_override = if cli.proxy {
    Some(true)
  } else if cli.no_proxy {
    Some(false)
  } else {
    None
  };
  let config = GovernorConfig { proxy_override, ..GovernorConfig::default() };
  let governor = Governor::new(config)?;

  let mut dois = Vec::new();

  if let Some(title) = &cli.title {
    dois.extend(search_by_title(&governor, title, cli.author.as_deref()).await?);
  }

  for input in &cli.inputs {
    match resolve_input(&governor, input).await? {
      Some(doi) => dois.push(doi),
      None => eprintln!(
        "{} Could not extract DOI from: {}",
        style("✗").red(),
        input
      ),
    }
  }

  if dois.is_empty() {
    return Err(ScholardError::NoIdentifiers);
  }
  let dois = dedupe(dois);

  governor.check_rate_limit().await?;
  governor.record_request()?;

  let mut reports = Vec::with_capacity(dois.len());
  for (i, doi) in dois.iter().enumerate() {
    if i > 0 {
      println!();
      governor.cooldown().await;
    }
    println!("[{}/{}] Fetching data for {}...", i + 1, dois.len(), doi);
    reports.push(aggregate(&governor, doi, &ConsoleProgress).await);
  }

  if cli.json {
    let output = if reports.len() == 1 {
      serde_json::to_value(&reports[0])?
    } else {
      serde_json::to_value(&reports)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    return Ok(());
  }

  let markdown: Vec<String> = reports.iter().map(to_markdown).collect();
  let out_path = match cli.output {
    Some(path) => path,
    None => default_output_path(&reports)?,
  };
  std::fs::write(&out_path, markdown.join("\n\n"))?;
  println!("\n{} Report saved to: {}", style("✓").green(), out_path.display());
  Ok(())
}

/// Resolves `--title` (optionally narrowed by `--author`) to a DOI via
/// CrossRef title search.
async fn search_by_title(
  governor: &Governor,
  title: &str,
  author: Option<&str>,
) -> Result<Vec<String>> {
  println!("Searching CrossRef for: \"{title}\"...");
  let mut results = crossref::search_title(governor, title, TITLE_SEARCH_ROWS).await;
  if results.is_empty() {
    return Err(ScholardError::NoSearchResults(title.to_string()));
  }

  if let Some(author) = author {
    let wanted = author.to_lowercase();
    let filtered: Vec<Value> = results
      .iter()
      .filter(|item| {
        item.get("author").and_then(Value::as_array).is_some_and(|authors| {
          authors.iter().any(|a| {
            a.get("family")
              .and_then(Value::as_str)
              .is_some_and(|family| family.to_lowercase().contains(&wanted))
          })
        })
      })
      .cloned()
      .collect();
    if !filtered.is_empty() {
      results = filtered;
    }
  }

  let best = &results[0];
  trace!("best title-search candidate: {best}");
  let best_title = match best.get("title") {
    Some(Value::Array(items)) => items.first().and_then(Value::as_str).unwrap_or(""),
    Some(Value::String(s)) => s.as_str(),
    _ => "",
  };
  println!("  Found: {best_title}");

  match best.get("DOI").and_then(Value::as_str) {
    Some(doi) => {
      println!("  DOI: {doi}");
      Ok(vec![doi.to_string()])
    },
    None => Ok(Vec::new()),
  }
}

/// Picks the output path when `--output` is not given: `output/<slug>.md`,
/// slugged from the first report's CrossRef title, or a count-based name for
/// multi-paper runs.
fn default_output_path(reports: &[AggregateReport]) -> Result<PathBuf> {
  let output_dir = Path::new("output");
  std::fs::create_dir_all(output_dir)?;

  let name = if reports.len() == 1 {
    reports[0]
      .source(CROSSREF)
      .and_then(|cr| cr.pointer("/title/0"))
      .and_then(Value::as_str)
      .unwrap_or("report")
      .to_string()
  } else {
    format!("scholar-report-{}-papers", reports.len())
  };

  Ok(output_dir.join(format!("{}.md", slugify(&name))))
}

/// Lowercases and collapses non-alphanumeric runs to single hyphens,
/// truncated to 80 characters.
fn slugify(text: &str) -> String {
  let mut slug = String::new();
  let mut pending_hyphen = false;
  for c in text.to_lowercase().chars() {
    if c.is_ascii_alphanumeric() {
      if pending_hyphen && !slug.is_empty() {
        slug.push('-');
      }
      pending_hyphen = false;
      slug.push(c);
    } else {
      pending_hyphen = true;
    }
  }
  slug.truncate(80);
  let slug = slug.trim_end_matches('-').to_string();
  if slug.is_empty() {
    "report".to_string()
  } else {
    slug
  }
}
