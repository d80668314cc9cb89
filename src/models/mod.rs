mod app_config;
mod intraday_candle;
mod market_overview;
mod ohlcv;
mod stock_record;
mod timeframe;
pub mod indicators;

pub use app_config::{AppConfig, DEFAULT_VCI_BASE_URL};
pub use indicators::TechnicalIndicators;
pub use intraday_candle::IntradayCandle;
pub use market_overview::{IndexSnapshot, MarketOverview, MarketSnapshot};
pub use ohlcv::Ohlcv;
pub use stock_record::{PricePoint, StockRecord, StockSummary};
pub use timeframe::Timeframe;
