//! Request governance: rate limiting, retry/backoff, and proxy rotation.
//!
//! Every outbound call the crate makes goes through one [`Governor`]. It
//! enforces two distinct disciplines:
//!
//! - **Per invocation**: a file-backed sliding-window ledger caps how often
//!   the tool may run (one entry per invocation, not per call), and a minimum
//!   inter-invocation interval smooths bursts. Checked once, before any
//!   fetch.
//! - **Per call**: uniform default headers, a fixed timeout, randomized
//!   backoff on HTTP 429, one short retry on any other failure, and an
//!   optional proxy chosen at random from a user-supplied pool.
//!
//! Transport failures never escape this module as errors. Each call returns
//! an [`Outcome`]: either parsed JSON or an [`Unavailable`] recording why the
//! source contributed nothing, so failure causes stay inspectable without
//! changing the never-throws contract.
//!
//! The ledger is read-modify-written without locking. That is a documented
//! single-writer assumption suitable for a single-user tool; concurrent
//! invocations sharing one ledger file can lose updates.

use std::{
  path::PathBuf,
  time::{Duration, SystemTime, UNIX_EPOCH},
};

use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{Result, ScholarError};

/// Sliding window for the invocation ledger, in seconds.
const WINDOW_SECONDS: f64 = 3600.0;

/// Browser User-Agent sent on every request.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/122.0.0.0 Safari/537.36";

/// Tunable policy for a [`Governor`].
///
/// All values are explicit so tests can instantiate independent governors
/// with their own ledger paths and proxy policies.
#[derive(Debug, Clone)]
pub struct GovernorConfig {
  /// Path of the persisted timestamp ledger.
  pub ledger_path:    PathBuf,
  /// Path of the proxy preference file, read fresh on every call.
  pub proxy_path:     PathBuf,
  /// Explicit proxy policy: `Some(true)` forces proxies on, `Some(false)`
  /// forces them off, `None` defers to the preference file.
  pub proxy_override: Option<bool>,
  /// Minimum spacing between invocations within the window.
  pub min_interval:   Duration,
  /// Maximum invocations per sliding hour.
  pub hourly_ceiling: usize,
  /// Politeness jitter bounds between source fetches, in seconds.
  pub jitter:         (f64, f64),
  /// Randomized backoff bounds after HTTP 429, in seconds.
  pub backoff:        (f64, f64),
  /// Retry budget per call (attempts beyond the first).
  pub retries:        usize,
  /// Fixed sleep before the retry of a non-429 failure.
  pub retry_sleep:    Duration,
  /// Per-call HTTP timeout.
  pub timeout:        Duration,
  /// Cooldown bounds between identifiers in one invocation, in seconds.
  pub cooldown:       (f64, f64),
}

impl Default for GovernorConfig {
  fn default() -> Self {
    let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    Self {
      ledger_path:    data_dir.join("scholar").join("rate_limit.json"),
      proxy_path:     home_dir.join(".scholar-proxies.json"),
      proxy_override: None,
      min_interval:   Duration::from_secs(5),
      hourly_ceiling: 10,
      jitter:         (0.5, 2.0),
      backoff:        (3.0, 8.0),
      retries:        2,
      retry_sleep:    Duration::from_secs(2),
      timeout:        Duration::from_secs(30),
      cooldown:       (3.0, 6.0),
    }
  }
}

/// Decision of the invocation gate for a given ledger state.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
  /// No constraint applies; proceed immediately.
  Proceed,
  /// The minimum inter-invocation interval has not elapsed; wait this long.
  Wait(Duration),
  /// The hourly ceiling is reached; fail with the time until the oldest
  /// ledger entry expires.
  QuotaExceeded(Duration),
}

/// Computes the gate decision for a ledger snapshot.
///
/// Pure so the two quota constraints are testable without sleeping. Entries
/// older than the window are ignored. Quota exhaustion wins over the
/// interval wait: a capped invocation fails without sleeping first.
pub fn gate(timestamps: &[f64], now: f64, config: &GovernorConfig) -> Gate {
  let live: Vec<f64> =
    timestamps.iter().copied().filter(|ts| now - ts < WINDOW_SECONDS).collect();

  if live.len() >= config.hourly_ceiling {
    let oldest = live.iter().copied().fold(f64::INFINITY, f64::min);
    let retry_after = (WINDOW_SECONDS - (now - oldest)).max(0.0);
    return Gate::QuotaExceeded(Duration::from_secs_f64(retry_after));
  }

  if !live.is_empty() {
    let newest = live.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let elapsed = now - newest;
    let min = config.min_interval.as_secs_f64();
    if elapsed < min {
      return Gate::Wait(Duration::from_secs_f64(min - elapsed));
    }
  }

  Gate::Proceed
}

/// Why a call produced no data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
  /// The server answered with a non-2xx status after retries were spent.
  Status(u16),
  /// The request itself failed (connect, timeout, TLS) after retries.
  Transport(String),
  /// The body arrived but was not valid JSON.
  Decode(String),
}

/// Result of one governed call: parsed JSON or a defined absence.
#[derive(Debug)]
pub enum Outcome {
  /// The call succeeded with a parsed body.
  Data(Value),
  /// The call contributed nothing; the reason is retained for diagnostics.
  Unavailable(Unavailable),
}

impl Outcome {
  /// Converts into the value, discarding the unavailability reason.
  pub fn data(self) -> Option<Value> {
    match self {
      Outcome::Data(value) => Some(value),
      Outcome::Unavailable(_) => None,
    }
  }
}

/// Proxy preference file shape: `{"enabled": bool, "proxies": [url, ...]}`.
#[derive(Debug, Default, Deserialize)]
struct ProxyConfig {
  #[serde(default)]
  enabled: bool,
  #[serde(default)]
  proxies: Vec<String>,
}

/// Gatekeeper for all outbound HTTP made during one invocation.
#[derive(Debug)]
pub struct Governor {
  /// The policy this governor enforces.
  config: GovernorConfig,
  /// Shared client used when no proxy applies.
  client: reqwest::Client,
}

impl Governor {
  /// Creates a governor enforcing the given policy.
  pub fn new(config: GovernorConfig) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(Self { config, client })
  }

  /// Read-only access to the active policy.
  pub fn config(&self) -> &GovernorConfig { &self.config }

  /// Checks the invocation gate, sleeping out any interval remainder.
  ///
  /// Called once per invocation, before any fetch. Quota exhaustion is fatal
  /// and reports how long until the window frees up.
  pub async fn check_rate_limit(&self) -> Result<()> {
    let now = unix_now();
    match gate(&self.load_ledger(), now, &self.config) {
      Gate::Proceed => Ok(()),
      Gate::Wait(wait) => {
        debug!("rate limit: waiting {:.1}s between invocations", wait.as_secs_f64());
        tokio::time::sleep(wait).await;
        Ok(())
      },
      Gate::QuotaExceeded(retry_after) => Err(ScholarError::QuotaExceeded {
        limit:            self.config.hourly_ceiling,
        retry_after_mins: (retry_after.as_secs() + 59) / 60,
      }),
    }
  }

  /// Appends one invocation timestamp and persists the pruned ledger.
  pub fn record_request(&self) -> Result<()> {
    let now = unix_now();
    let mut timestamps: Vec<f64> =
      self.load_ledger().into_iter().filter(|ts| now - ts < WINDOW_SECONDS).collect();
    timestamps.push(now);
    if let Some(parent) = self.config.ledger_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&self.config.ledger_path, serde_json::to_string(&timestamps)?)?;
    Ok(())
  }

  /// Loads the ledger, treating a missing or corrupt file as empty.
  fn load_ledger(&self) -> Vec<f64> {
    std::fs::read_to_string(&self.config.ledger_path)
      .ok()
      .and_then(|text| serde_json::from_str(&text).ok())
      .unwrap_or_default()
  }

  /// Sleeps a randomized politeness jitter between source fetches.
  pub async fn polite_delay(&self) {
    let (lo, hi) = self.config.jitter;
    sleep_uniform(lo, hi).await;
  }

  /// Sleeps the longer randomized cooldown between identifiers.
  pub async fn cooldown(&self) {
    let (lo, hi) = self.config.cooldown;
    sleep_uniform(lo, hi).await;
  }

  /// Governed GET returning parsed JSON or a defined absence.
  pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Outcome {
    self.request(Method::Get, url, query, None).await
  }

  /// Governed POST with a JSON body.
  pub async fn post_json(&self, url: &str, query: &[(&str, &str)], body: &Value) -> Outcome {
    self.request(Method::Post, url, query, Some(body)).await
  }

  /// Issues one call with retry/backoff. Never errors past this boundary.
  async fn request(
    &self,
    method: Method,
    url: &str,
    query: &[(&str, &str)],
    body: Option<&Value>,
  ) -> Outcome {
    let mut last = Unavailable::Transport("no attempt made".to_string());

    for attempt in 0..=self.config.retries {
      if attempt > 0 {
        trace!("retrying {} (attempt {})", url, attempt + 1);
      }

      let client = self.client_for_call();
      let mut request = match method {
        Method::Get => client.get(url),
        Method::Post => client.post(url),
      };
      request = request
        .query(query)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, "application/json");
      if let Some(body) = body {
        request = request.json(body);
      }

      match request.send().await {
        Ok(response) => {
          let status = response.status();
          if status.is_success() {
            match response.json::<Value>().await {
              Ok(value) => return Outcome::Data(value),
              Err(e) => {
                // A 2xx body that is not JSON gets the same short retry as a
                // transport failure.
                debug!("failed to decode body from {}: {}", url, e);
                last = Unavailable::Decode(e.to_string());
                if attempt < self.config.retries {
                  tokio::time::sleep(self.config.retry_sleep).await;
                  continue;
                }
              },
            }
          } else if status.as_u16() == 429 && attempt < self.config.retries {
            let (lo, hi) = self.config.backoff;
            debug!("429 from {}, backing off", url);
            last = Unavailable::Status(429);
            sleep_uniform(lo, hi).await;
            continue;
          } else {
            warn!("{} returned status {}", url, status);
            return Outcome::Unavailable(Unavailable::Status(status.as_u16()));
          }
        },
        Err(e) => {
          debug!("request to {} failed: {}", url, e);
          last = Unavailable::Transport(e.to_string());
          if attempt < self.config.retries {
            tokio::time::sleep(self.config.retry_sleep).await;
            continue;
          }
        },
      }
    }

    Outcome::Unavailable(last)
  }

  /// Picks the client for one call, honoring the proxy policy.
  ///
  /// The preference file is re-read on every call so edits made mid-run take
  /// effect on the next request. A proxy that fails to configure falls back
  /// to the direct client rather than failing the call.
  fn client_for_call(&self) -> reqwest::Client {
    let Some(url) = self.proxy_url() else { return self.client.clone() };
    match reqwest::Proxy::all(&url)
      .and_then(|proxy| reqwest::Client::builder().timeout(self.config.timeout).proxy(proxy).build())
    {
      Ok(client) => {
        trace!("routing call through proxy {}", url);
        client
      },
      Err(e) => {
        warn!("ignoring unusable proxy {}: {}", url, e);
        self.client.clone()
      },
    }
  }

  /// Chooses a proxy URL uniformly at random, or `None` when disabled.
  fn proxy_url(&self) -> Option<String> {
    let config: ProxyConfig = std::fs::read_to_string(&self.config.proxy_path)
      .ok()
      .and_then(|text| serde_json::from_str(&text).ok())
      .unwrap_or_default();
    let enabled = self.config.proxy_override.unwrap_or(config.enabled);
    if !enabled {
      return None;
    }
    config.proxies.choose(&mut rand::thread_rng()).cloned()
  }
}

/// HTTP verbs the governor issues.
#[derive(Debug, Clone, Copy)]
enum Method {
  /// GET request.
  Get,
  /// POST request with a JSON body.
  Post,
}

/// Sleeps a duration drawn uniformly from `[lo, hi)` seconds.
async fn sleep_uniform(lo: f64, hi: f64) {
  // ThreadRng is not Send, so draw before awaiting.
  let secs = rand::thread_rng().gen_range(lo..hi);
  tokio::time::sleep(Duration::from_secs_f64(secs)).await;
}

/// Current time as unix seconds.
fn unix_now() -> f64 {
  SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  fn test_config(dir: &std::path::Path) -> GovernorConfig {
    GovernorConfig {
      ledger_path: dir.join("rate_limit.json"),
      proxy_path: dir.join("proxies.json"),
      ..GovernorConfig::default()
    }
  }

  #[test]
  fn gate_proceeds_on_empty_ledger() {
    let config = GovernorConfig::default();
    assert_eq!(gate(&[], 1_000_000.0, &config), Gate::Proceed);
  }

  #[test]
  fn gate_waits_out_the_interval_remainder() {
    let config = GovernorConfig::default();
    let now = 1_000_000.0;
    // One entry two seconds old with a five second minimum interval.
    match gate(&[now - 2.0], now, &config) {
      Gate::Wait(wait) => assert!((wait.as_secs_f64() - 3.0).abs() < 0.01),
      other => panic!("expected Wait, got {other:?}"),
    }
  }

  #[test]
  fn gate_proceeds_once_interval_elapsed() {
    let config = GovernorConfig::default();
    let now = 1_000_000.0;
    assert_eq!(gate(&[now - 6.0], now, &config), Gate::Proceed);
  }

  #[test]
  fn gate_fails_at_the_ceiling_without_waiting() {
    let config = GovernorConfig::default();
    let now = 1_000_000.0;
    // Ceiling entries inside the window, the newest only a second old. The
    // quota failure must win over the interval wait.
    let timestamps: Vec<f64> =
      (0..config.hourly_ceiling).map(|i| now - 1.0 - i as f64 * 10.0).collect();
    match gate(&timestamps, now, &config) {
      Gate::QuotaExceeded(retry_after) => {
        let oldest_age = 1.0 + (config.hourly_ceiling - 1) as f64 * 10.0;
        assert!((retry_after.as_secs_f64() - (WINDOW_SECONDS - oldest_age)).abs() < 0.01);
      },
      other => panic!("expected QuotaExceeded, got {other:?}"),
    }
  }

  #[test]
  fn gate_ignores_entries_outside_the_window() {
    let config = GovernorConfig::default();
    let now = 1_000_000.0;
    let stale: Vec<f64> = (0..config.hourly_ceiling * 2).map(|i| now - 4000.0 - i as f64).collect();
    assert_eq!(gate(&stale, now, &config), Gate::Proceed);
  }

  #[test]
  fn ledger_roundtrips_and_prunes() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let path = config.ledger_path.clone();
    std::fs::write(&path, serde_json::to_string(&[unix_now() - 7200.0])?)?;

    let governor = Governor::new(config)?;
    governor.record_request()?;

    let persisted: Vec<f64> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(persisted.len(), 1, "stale entry should be pruned");
    assert!(unix_now() - persisted[0] < 5.0);
    Ok(())
  }

  #[test]
  fn corrupt_ledger_reads_as_empty() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    std::fs::write(&config.ledger_path, "{definitely not json")?;
    let governor = Governor::new(config)?;
    assert!(governor.load_ledger().is_empty());
    Ok(())
  }

  #[test]
  fn proxy_disabled_by_default_and_forced_off_by_override() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(dir.path());
    std::fs::write(
      &config.proxy_path,
      r#"{"enabled": true, "proxies": ["http://proxy.example:8080"]}"#,
    )?;

    config.proxy_override = Some(false);
    let governor = Governor::new(config.clone())?;
    assert_eq!(governor.proxy_url(), None);

    config.proxy_override = None;
    let governor = Governor::new(config)?;
    assert_eq!(governor.proxy_url().as_deref(), Some("http://proxy.example:8080"));
    Ok(())
  }

  #[test]
  fn proxy_force_on_with_empty_pool_yields_none() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let mut config = test_config(dir.path());
    config.proxy_override = Some(true);
    let governor = Governor::new(config)?;
    assert_eq!(governor.proxy_url(), None);
    Ok(())
  }

  #[tokio::test]
  async fn quota_exceeded_reports_minutes_until_expiry() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let config = test_config(dir.path());
    let now = unix_now();
    let timestamps: Vec<f64> = (0..config.hourly_ceiling).map(|i| now - 60.0 - i as f64).collect();
    std::fs::write(&config.ledger_path, serde_json::to_string(&timestamps)?)?;

    let governor = Governor::new(config)?;
    match governor.check_rate_limit().await {
      Err(ScholarError::QuotaExceeded { limit, retry_after_mins }) => {
        assert_eq!(limit, 10);
        assert!(retry_after_mins <= 60);
      },
      other => panic!("expected QuotaExceeded, got {other:?}"),
    }
    Ok(())
  }
}
