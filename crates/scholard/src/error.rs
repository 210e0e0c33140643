//! Error types for the scholar CLI.

use thiserror::Error;

/// Error type alias used for the `scholard` binary.
pub type Result<T> = core::result::Result<T, ScholardError>;

/// Errors that terminate the CLI with a non-zero exit code.
#[derive(Error, Debug)]
pub enum ScholardError {
  /// An error bubbled up from the scholar library (quota, missing file,
  /// filesystem).
  #[error(transparent)]
  Scholar(#[from] scholar::error::ScholarError),

  /// Writing the report failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Serializing the raw report failed.
  #[error(transparent)]
  Serde(#[from] serde_json::Error),

  /// Nothing the user supplied could be resolved to a DOI.
  #[error("No DOIs found. Provide DOIs, URLs, PDFs, or use --title.")]
  NoIdentifiers,

  /// A title search matched nothing.
  #[error("No results found for title: \"{0}\"")]
  NoSearchResults(String),
}
