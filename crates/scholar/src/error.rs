//! Error types for the scholar library.
//!
//! The error surface here is deliberately small. Per-source network and parse
//! failures are *not* errors: adapters in [`crate::sources`] return data or a
//! defined absence and never raise past the transport boundary. What remains
//! is the handful of conditions that must terminate an invocation or be
//! surfaced to the user.

use std::path::PathBuf;

use thiserror::Error;

/// Error type alias used for the [`scholar`](crate) crate.
pub type Result<T> = core::result::Result<T, ScholarError>;

/// Errors that can terminate a scholar invocation.
#[derive(Error, Debug)]
pub enum ScholarError {
  /// An input file path was given but nothing exists there.
  ///
  /// Distinct from "no DOI found inside the file", which is a soft result:
  /// a present-but-unparseable PDF yields `Ok(None)` from extraction, while
  /// a missing path is a user error worth stopping for.
  #[error("File not found: {}", .0.display())]
  FileNotFound(PathBuf),

  /// The sliding-window invocation quota has been reached.
  ///
  /// Reported with the time until the oldest ledger entry ages out of the
  /// window. The invocation fails outright; there is no sleep-and-retry for
  /// quota exhaustion.
  #[error("Rate limit reached ({limit} lookups/hour). Try again in {retry_after_mins} minute(s).")]
  QuotaExceeded {
    /// The configured hourly ceiling that was hit.
    limit:            usize,
    /// Minutes until the oldest timestamp leaves the one-hour window.
    retry_after_mins: u64,
  },

  /// Building the shared HTTP client failed.
  ///
  /// This only occurs at [`Governor`](crate::governor::Governor)
  /// construction; per-call transport errors are swallowed into
  /// [`Unavailable`](crate::governor::Unavailable) instead.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A filesystem operation on the ledger or report output failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Serializing or deserializing persisted state failed.
  #[error(transparent)]
  Serde(#[from] serde_json::Error),
}
