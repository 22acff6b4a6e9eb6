use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::currency::Currency;
use crate::error::{GatewayError, Result};

const RATE_TTL: Duration = Duration::from_secs(60);
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A frozen set of USD quotes. Prices are carried as integer cents for the
/// conversion arithmetic; the float ratio is only ever used in journal
/// metadata.
#[derive(Clone, Debug)]
pub struct RateSnapshot {
    price_cents: HashMap<Currency, u64>,
    price_usd: HashMap<Currency, f64>,
    fetched_at: Instant,
}

impl RateSnapshot {
    pub fn price_cents(&self, currency: Currency) -> Option<u64> {
        self.price_cents.get(&currency).copied()
    }

    pub fn ratio(&self, from: Currency, to: Currency) -> f64 {
        let from = self.price_usd.get(&from).copied().unwrap_or(0.0);
        let to = self.price_usd.get(&to).copied().unwrap_or(0.0);
        if to == 0.0 {
            0.0
        } else {
            from / to
        }
    }

    fn pinned() -> Self {
        let mut snapshot = Self {
            price_cents: HashMap::new(),
            price_usd: HashMap::new(),
            fetched_at: Instant::now(),
        };
        snapshot.insert(Currency::USD, 1.0);
        snapshot
    }

    fn insert(&mut self, currency: Currency, usd: f64) {
        self.price_usd.insert(currency, usd);
        self.price_cents.insert(currency, (usd * 100.0).round() as u64);
    }
}

/// Price oracle client with a 60 s snapshot TTL. On upstream failure the
/// last snapshot is served stale; only a cold cache propagates the error.
pub struct RateOracle {
    http: reqwest::Client,
    base_url: String,
    ttl: Duration,
    snapshot: Mutex<Option<RateSnapshot>>,
}

impl RateOracle {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into(),
            ttl: RATE_TTL,
            snapshot: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn snapshot(&self) -> Result<RateSnapshot> {
        let mut guard = self.snapshot.lock().await;
        if let Some(snapshot) = guard.as_ref() {
            if snapshot.fetched_at.elapsed() < self.ttl {
                return Ok(snapshot.clone());
            }
        }
        match self.fetch().await {
            Ok(snapshot) => {
                *guard = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(err) => match guard.as_ref() {
                Some(stale) => {
                    tracing::warn!("rate oracle fetch failed, serving stale snapshot: {err}");
                    Ok(stale.clone())
                }
                None => Err(err),
            },
        }
    }

    async fn fetch(&self) -> Result<RateSnapshot> {
        let symbols = Currency::ALL
            .iter()
            .filter(|&&currency| currency != Currency::USD)
            .map(|currency| currency.code())
            .collect::<Vec<_>>()
            .join(",");
        let url = format!(
            "{}/v1/prices?symbols={symbols}",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| GatewayError::Internal(format!("rate oracle request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(GatewayError::Internal(format!(
                "rate oracle returned status {}",
                response.status()
            )));
        }
        let prices: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Internal(format!("rate oracle body invalid: {err}")))?;

        let mut snapshot = RateSnapshot::pinned();
        for &currency in Currency::ALL.iter().filter(|&&c| c != Currency::USD) {
            let usd = prices
                .get(currency.code())
                .and_then(Value::as_f64)
                .filter(|price| price.is_finite() && *price > 0.0)
                .ok_or_else(|| {
                    GatewayError::Internal(format!(
                        "rate oracle omitted a price for {currency}"
                    ))
                })?;
            snapshot.insert(currency, usd);
        }
        Ok(snapshot)
    }
}
