pub mod cleanup;
pub mod fetch;
pub mod run;
pub mod status;

use std::sync::Arc;

use crate::error::Result;
use crate::models::AppConfig;
use crate::services::{MarketOverviewAggregator, MarketStore, VciClient};
use crate::worker::DailyCacheJob;

/// Load configuration or exit with a message
pub(crate) fn load_config() -> AppConfig {
    match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            eprintln!("   Set DATABASE_URL (e.g. sqlite://vn30cache.db) in the environment or .env");
            std::process::exit(1);
        }
    }
}

pub(crate) async fn open_store(config: &AppConfig) -> Result<Arc<MarketStore>> {
    let store = MarketStore::connect(
        &config.database_url,
        config.db_min_pool_size,
        config.db_max_pool_size,
    )
    .await?;
    Ok(Arc::new(store))
}

/// Wire the VCI client, aggregator and store into a cache job
pub(crate) fn build_job(config: &AppConfig, store: Arc<MarketStore>) -> Result<DailyCacheJob<VciClient>> {
    let client = VciClient::new(
        &config.vci_base_url,
        config.request_timeout,
        config.rate_limit_per_minute,
    )?;
    let aggregator = MarketOverviewAggregator::new(
        Arc::new(client),
        config.price_multiplier,
        config.symbol_fetch_delay,
    );
    Ok(DailyCacheJob::new(aggregator, store, config.days_to_keep))
}
