pub mod intraday;
pub mod market_overview;
pub mod market_store;
pub mod provider;
pub mod symbol_fetcher;
pub mod vci;

pub use intraday::{fetch_intraday, TradingDay};
pub use market_overview::{AggregationError, MarketOverviewAggregator};
pub use market_store::{MarketStore, RetentionReport};
pub use provider::QuoteProvider;
pub use symbol_fetcher::SymbolFetcher;
pub use vci::{SharedRateLimiter, VciClient, VciError};
