pub mod binance;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;

use crate::data::{self, ImporterKind};

/// Response that asks the client to slow down (HTTP 418/429).
#[derive(Debug, Error)]
#[error("rate limited (HTTP {status})")]
pub struct RateLimited {
    pub status: u16,
    pub retry_after: Option<Duration>,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based). A server-provided
    /// `Retry-After` wins over the backoff schedule.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Retry an async operation with exponential backoff.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if attempt < policy.max_attempts => {
                let retry_after = e.downcast_ref::<RateLimited>().and_then(|r| r.retry_after);
                let delay = policy.delay(attempt, retry_after);
                tracing::debug!(attempt, ?delay, error = %e, "retrying request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.context(format!("giving up after {attempt} attempts"))),
        }
    }
}

/// Run an import: fetch the pair's full 1-minute history and write it to
/// the importer's cache file under `data_dir`. Returns the bar count.
pub fn run(importer: ImporterKind, pair: &str, data_dir: &Path, start_ms: Option<i64>) -> Result<usize> {
    let rt = tokio::runtime::Runtime::new().context("creating async runtime")?;
    let bars = rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("amm-loss-sim/0.1")
            .build()
            .context("creating HTTP client")?;

        match importer {
            ImporterKind::Binance => {
                let mut source = binance::BinanceImporter::default();
                if let Some(start_ms) = start_ms {
                    source.start_ms = start_ms;
                }
                source.fetch(&client, pair).await
            }
        }
    })?;

    let path = data::cache_path(data_dir, pair, importer);
    data::write_csv(&path, &bars)?;
    tracing::info!(pair, bars = bars.len(), path = %path.display(), "saved price history");
    Ok(bars.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_honours_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(1, None), Duration::from_millis(500));
        assert_eq!(policy.delay(3, None), Duration::from_millis(2000));
        assert_eq!(policy.delay(3, Some(Duration::from_secs(7))), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let calls = std::sync::atomic::AtomicU32::new(0);
        let policy = RetryPolicy { max_attempts: 3, backoff_base: Duration::from_millis(10) };
        let result: Result<()> = retry(&policy, || {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(anyhow::anyhow!("boom")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
