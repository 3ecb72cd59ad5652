//! Price sample sync job
//!
//! Periodically fetches the top cryptocurrency listings from CoinMarketCap
//! and stores one price point per asset. Ingestion runs only here, decoupled
//! from the read endpoints, so query latency never waits on writes.
//! Supports graceful shutdown via ctrl-c.

use std::env;
use tokio::time::{Duration as TokioDuration, interval};
use tracing::{info, warn};

use crate::services::historical_data::HistoricalDataService;

/// Default sample interval in seconds (5 minutes)
const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 300;

/// Default number of top listings to sample per tick
const DEFAULT_SAMPLE_LIMIT: u32 = 100;

/// Currency the sampled quotes are converted to
const SAMPLE_CONVERT: &str = "USD";

/// Environment variable for the sample interval
const ENV_SAMPLE_INTERVAL: &str = "PRICE_SAMPLE_INTERVAL_SECS";

/// Environment variable for the listings limit
const ENV_SAMPLE_LIMIT: &str = "PRICE_SAMPLE_LIMIT";

/// Start the price sample sync job
///
/// Spawns a background task that polls the top listings at the configured
/// interval and stores one observation per asset. Individual store failures
/// are logged and skipped; the batch always completes.
///
/// # Environment Variables
///
/// * `PRICE_SAMPLE_INTERVAL_SECS` - Interval in seconds (default: 300)
/// * `PRICE_SAMPLE_LIMIT` - Number of top listings per tick (default: 100)
pub async fn start_price_sample_job(service: HistoricalDataService) {
    tokio::spawn(async move {
        let sample_interval_secs: u64 = env::var(ENV_SAMPLE_INTERVAL)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_INTERVAL_SECS);

        let limit: u32 = env::var(ENV_SAMPLE_LIMIT)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_LIMIT);

        info!(
            sample_interval_secs,
            limit, "Price sample job started"
        );

        let mut interval = interval(TokioDuration::from_secs(sample_interval_secs));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping price sample job gracefully");
                    break;
                }
                _ = interval.tick() => {
                    match service.market_data().get_top_cryptocurrencies(limit, SAMPLE_CONVERT).await {
                        Ok(listings) => {
                            let total = listings.len();
                            let mut stored = 0;
                            for coin in &listings {
                                if service.store_data_point(coin, SAMPLE_CONVERT).await.is_some() {
                                    stored += 1;
                                }
                            }
                            info!(stored, total, "Price sample batch completed");
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to fetch listings, will retry next interval");
                        }
                    }
                }
            }
        }

        info!("Price sample job stopped");
    });
}
