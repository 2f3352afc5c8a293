use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::data::PriceBar;

use super::{RateLimited, RetryPolicy, retry};

const API_URL: &str = "https://api.binance.com/api/v3/klines";
/// 2021-11-01T00:00:00Z
const DEFAULT_START_MS: i64 = 1_635_724_800_000;
const MINUTE_MS: i64 = 60_000;

/// Binance spot kline importer. The time range is split into fixed
/// windows that are fetched concurrently, then merged by timestamp.
#[derive(Debug, Clone)]
pub struct BinanceImporter {
    pub url: String,
    pub interval: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub chunk_minutes: i64,
    pub limit: u32,
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for BinanceImporter {
    fn default() -> Self {
        Self {
            url: API_URL.to_string(),
            interval: "1m".to_string(),
            start_ms: DEFAULT_START_MS,
            end_ms: chrono::Utc::now().timestamp_millis(),
            chunk_minutes: 288,
            limit: 500,
            concurrency: 8,
            retry: RetryPolicy::default(),
        }
    }
}

impl BinanceImporter {
    /// Inclusive `(start_ms, end_ms)` request windows covering the range.
    pub fn windows(&self) -> Vec<(i64, i64)> {
        let step = self.chunk_minutes.max(1) * MINUTE_MS;
        let mut windows = Vec::new();
        let mut cur = self.start_ms;
        while cur < self.end_ms {
            let next = (cur + step).min(self.end_ms);
            windows.push((cur, next - 1));
            cur = next;
        }
        windows
    }

    /// Fetch every window for `pair`, at most `concurrency` at a time.
    /// The first window that exhausts its retries fails the whole import.
    pub async fn fetch(&self, client: &reqwest::Client, pair: &str) -> Result<Vec<PriceBar>> {
        let windows = self.windows();
        tracing::info!(pair, windows = windows.len(), "fetching binance klines");

        let pb = indicatif::ProgressBar::new(windows.len() as u64);
        if let Ok(style) =
            indicatif::ProgressStyle::default_bar().template("  {msg} [{bar:40}] {pos}/{len} ({eta})")
        {
            pb.set_style(style);
        }
        pb.set_message(pair.to_string());

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for (start_ms, end_ms) in windows {
            let semaphore = Arc::clone(&semaphore);
            let client = client.clone();
            let importer = self.clone();
            let pair = pair.to_string();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                importer
                    .fetch_window(&client, &pair, start_ms, end_ms)
                    .await
                    .with_context(|| format!("fetching {pair} window {start_ms}..={end_ms}"))
            });
        }

        let mut bars = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let chunk = joined.context("window task panicked")??;
            bars.extend(chunk);
            pb.inc(1);
        }
        pb.finish_and_clear();

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }

    async fn fetch_window(
        &self,
        client: &reqwest::Client,
        pair: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<PriceBar>> {
        let params = [
            ("symbol", pair.to_string()),
            ("interval", self.interval.clone()),
            ("limit", self.limit.to_string()),
            ("startTime", start_ms.to_string()),
            ("endTime", end_ms.to_string()),
        ];
        let body = retry(&self.retry, || {
            let request = client.get(&self.url).query(&params);
            async move {
                let resp = request.send().await?;
                let status = resp.status();
                if status.as_u16() == 418 || status.as_u16() == 429 {
                    let retry_after = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .filter(|secs| secs.is_finite() && *secs >= 0.0)
                        .map(Duration::from_secs_f64);
                    return Err(RateLimited { status: status.as_u16(), retry_after }.into());
                }
                let body = resp.error_for_status()?.json::<Value>().await?;
                if let Some(err) = api_error(&body) {
                    bail!(err);
                }
                Ok::<_, anyhow::Error>(body)
            }
        })
        .await?;

        let bars = parse_klines(&body)?;
        tracing::debug!(pair, start_ms, end_ms, bars = bars.len(), "fetched window");
        Ok(bars)
    }
}

/// Binance can report errors as `{"code": .., "msg": ..}` with a 200 status.
fn api_error(body: &Value) -> Option<String> {
    let obj = body.as_object()?;
    match (obj.get("code"), obj.get("msg")) {
        (Some(code), Some(msg)) => Some(format!("binance error {code}: {msg}")),
        _ => None,
    }
}

/// Kline rows are `[open_time_ms, "open", "high", "low", "close", "volume", ...]`.
pub fn parse_klines(body: &Value) -> Result<Vec<PriceBar>> {
    let rows = body
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array of klines"))?;
    rows.iter()
        .map(|row| {
            let open_time = row
                .get(0)
                .and_then(Value::as_u64)
                .ok_or_else(|| anyhow!("kline without open time: {row}"))?;
            Ok(PriceBar {
                timestamp: open_time / 1000,
                open: number(row, 1)?,
                high: number(row, 2)?,
                low: number(row, 3)?,
                close: number(row, 4)?,
                volume: number(row, 5)?,
            })
        })
        .collect()
}

fn number(row: &Value, idx: usize) -> Result<f64> {
    match row.get(idx) {
        Some(Value::String(s)) => s
            .parse()
            .with_context(|| format!("kline field {idx} is not a number: {s}")),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| anyhow!("kline field {idx} out of range")),
        _ => bail!("kline missing field {idx}: {row}"),
    }
}
