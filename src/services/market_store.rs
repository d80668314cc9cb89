use chrono::{Days, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{IntradayCandle, MarketOverview, StockRecord};

/// Rows removed by a retention sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub market_rows: u64,
    pub stock_rows: u64,
    pub intraday_rows: u64,
}

impl RetentionReport {
    pub fn total(&self) -> u64 {
        self.market_rows + self.stock_rows + self.intraday_rows
    }
}

/// SQLite cache of daily market overviews and per-symbol records
///
/// Overviews are keyed by `date`, stock records by `(symbol, date)` and
/// intraday candles by `(symbol, time)`. Every save replaces the row with
/// the same key.
#[derive(Debug, Clone)]
pub struct MarketStore {
    pool: SqlitePool,
}

impl MarketStore {
    /// Open (creating if needed) the database at `database_url` and ensure
    /// the schema exists
    pub async fn connect(database_url: &str, min_connections: u32, max_connections: u32) -> Result<Self> {
        info!(database_url, min_connections, max_connections, "Connecting to market store");

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections.max(1))
            .connect_with(connect_options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;

        info!("Market store ready");
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                vn30_index TEXT NOT NULL,
                top_gainers TEXT NOT NULL,
                top_losers TEXT NOT NULL,
                total_stocks INTEGER NOT NULL,
                source TEXT NOT NULL,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS stock_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                company_name TEXT NOT NULL,
                price REAL NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                previous_close REAL NOT NULL,
                change REAL NOT NULL,
                change_percent REAL NOT NULL,
                volume INTEGER NOT NULL,
                prices TEXT NOT NULL,
                indicators TEXT,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS market_intraday (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                time TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                fetched_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_market_data_date ON market_data(date)",
            "CREATE INDEX IF NOT EXISTS idx_market_data_timestamp ON market_data(timestamp DESC)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_stock_data_symbol_date ON stock_data(symbol, date)",
            "CREATE INDEX IF NOT EXISTS idx_stock_data_date ON stock_data(date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_market_intraday_symbol_time ON market_intraday(symbol, time)",
        ];
        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        debug!("Market store schema initialized");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Market store closed");
    }

    /// Upsert the overview for its date
    pub async fn save_market_overview(&self, overview: &MarketOverview) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO market_data
            (date, timestamp, vn30_index, top_gainers, top_losers, total_stocks, source, fetched_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(overview.date)
        .bind(overview.timestamp)
        .bind(serde_json::to_string(&overview.vn30_index)?)
        .bind(serde_json::to_string(&overview.top_gainers)?)
        .bind(serde_json::to_string(&overview.top_losers)?)
        .bind(overview.total_stocks as i64)
        .bind(&overview.source)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(date = %overview.date, "Saved market overview");
        Ok(())
    }

    /// Upsert records in one transaction. Returns the number written.
    pub async fn save_stock_records(&self, records: &[StockRecord]) -> Result<usize> {
        let mut transaction = self.pool.begin().await?;

        for record in records {
            let indicators = record
                .indicators
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO stock_data
                (symbol, date, company_name, price, open, high, low, close, previous_close,
                 change, change_percent, volume, prices, indicators, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                "#,
            )
            .bind(record.symbol.to_uppercase())
            .bind(record.date)
            .bind(&record.company_name)
            .bind(record.price)
            .bind(record.open)
            .bind(record.high)
            .bind(record.low)
            .bind(record.close)
            .bind(record.previous_close)
            .bind(record.change)
            .bind(record.change_percent)
            .bind(record.volume as i64)
            .bind(serde_json::to_string(&record.prices)?)
            .bind(indicators)
            .bind(record.fetched_at)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        info!(count = records.len(), "Saved stock records");
        Ok(records.len())
    }

    pub async fn get_market_overview(&self, date: NaiveDate) -> Result<Option<MarketOverview>> {
        let row = sqlx::query("SELECT * FROM market_data WHERE date = ?1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(overview_from_row).transpose()
    }

    pub async fn get_latest_market_overview(&self) -> Result<Option<MarketOverview>> {
        let row = sqlx::query("SELECT * FROM market_data ORDER BY date DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(overview_from_row).transpose()
    }

    pub async fn get_stock_record(&self, symbol: &str, date: NaiveDate) -> Result<Option<StockRecord>> {
        let row = sqlx::query("SELECT * FROM stock_data WHERE symbol = ?1 AND date = ?2")
            .bind(symbol.to_uppercase())
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(stock_from_row).transpose()
    }

    pub async fn get_latest_stock_record(&self, symbol: &str) -> Result<Option<StockRecord>> {
        let row = sqlx::query("SELECT * FROM stock_data WHERE symbol = ?1 ORDER BY date DESC LIMIT 1")
            .bind(symbol.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(stock_from_row).transpose()
    }

    /// Every record saved for `date`, ordered by symbol
    pub async fn get_all_stocks_by_date(&self, date: NaiveDate) -> Result<Vec<StockRecord>> {
        let rows = sqlx::query("SELECT * FROM stock_data WHERE date = ?1 ORDER BY symbol")
            .bind(date)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(stock_from_row).collect()
    }

    /// Dates with a saved overview, newest first
    pub async fn get_available_dates(&self, limit: u32) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query("SELECT date FROM market_data ORDER BY date DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<NaiveDate, _>("date").map_err(AppError::from))
            .collect()
    }

    pub async fn has_market_data(&self, date: NaiveDate) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_data WHERE date = ?1")
            .bind(date)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    /// Delete everything dated strictly before `cutoff`
    pub async fn delete_older_than(&self, cutoff: NaiveDate) -> Result<RetentionReport> {
        let market = sqlx::query("DELETE FROM market_data WHERE date < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let stocks = sqlx::query("DELETE FROM stock_data WHERE date < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        // `time` is "YYYY-MM-DD HH:MM:SS", so a bare date sorts before that day's candles
        let intraday = sqlx::query("DELETE FROM market_intraday WHERE time < ?1")
            .bind(cutoff.format("%Y-%m-%d").to_string())
            .execute(&self.pool)
            .await?;

        let report = RetentionReport {
            market_rows: market.rows_affected(),
            stock_rows: stocks.rows_affected(),
            intraday_rows: intraday.rows_affected(),
        };

        info!(
            cutoff = %cutoff,
            market_rows = report.market_rows,
            stock_rows = report.stock_rows,
            intraday_rows = report.intraday_rows,
            "Deleted old data"
        );
        Ok(report)
    }

    /// Keep the last `days_to_keep` days counted back from `today`
    pub async fn delete_old_data(&self, days_to_keep: u32, today: NaiveDate) -> Result<RetentionReport> {
        let cutoff = today
            .checked_sub_days(Days::new(days_to_keep as u64))
            .ok_or_else(|| AppError::Config(format!("Retention window of {} days is out of range", days_to_keep)))?;
        self.delete_older_than(cutoff).await
    }

    /// Upsert minute candles for `symbol`. Returns the number written.
    pub async fn save_intraday_candles(&self, symbol: &str, candles: &[IntradayCandle]) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let symbol = symbol.to_uppercase();
        let fetched_at = Utc::now();
        let mut transaction = self.pool.begin().await?;

        for candle in candles {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO market_intraday
                (symbol, time, open, high, low, close, volume, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&symbol)
            .bind(candle.time.format("%Y-%m-%d %H:%M:%S").to_string())
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume as i64)
            .bind(fetched_at)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        debug!(symbol = %symbol, count = candles.len(), "Saved intraday candles");
        Ok(candles.len())
    }

    /// The most recent `limit` candles for `symbol`, oldest first
    pub async fn get_intraday_candles(&self, symbol: &str, limit: u32) -> Result<Vec<IntradayCandle>> {
        let rows = sqlx::query(
            "SELECT time, open, high, low, close, volume FROM market_intraday
             WHERE symbol = ?1 ORDER BY time DESC LIMIT ?2",
        )
        .bind(symbol.to_uppercase())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut candles = rows
            .iter()
            .map(|row| -> Result<IntradayCandle> {
                let time: String = row.try_get("time")?;
                let time = chrono::NaiveDateTime::parse_from_str(&time, "%Y-%m-%d %H:%M:%S")
                    .map_err(|e| AppError::Parse(format!("Invalid candle time '{}': {}", time, e)))?;
                Ok(IntradayCandle {
                    time,
                    open: row.try_get("open")?,
                    high: row.try_get("high")?,
                    low: row.try_get("low")?,
                    close: row.try_get("close")?,
                    volume: row.try_get::<i64, _>("volume")?.max(0) as u64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        candles.reverse();
        Ok(candles)
    }
}

fn overview_from_row(row: &SqliteRow) -> Result<MarketOverview> {
    let vn30_index: String = row.try_get("vn30_index")?;
    let top_gainers: String = row.try_get("top_gainers")?;
    let top_losers: String = row.try_get("top_losers")?;

    Ok(MarketOverview {
        date: row.try_get("date")?,
        vn30_index: serde_json::from_str(&vn30_index)?,
        top_gainers: serde_json::from_str(&top_gainers)?,
        top_losers: serde_json::from_str(&top_losers)?,
        total_stocks: row.try_get::<i64, _>("total_stocks")?.max(0) as usize,
        timestamp: row.try_get("timestamp")?,
        source: row.try_get("source")?,
    })
}

fn stock_from_row(row: &SqliteRow) -> Result<StockRecord> {
    let prices: String = row.try_get("prices")?;
    let indicators: Option<String> = row.try_get("indicators")?;

    Ok(StockRecord {
        symbol: row.try_get("symbol")?,
        date: row.try_get("date")?,
        company_name: row.try_get("company_name")?,
        price: row.try_get("price")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        previous_close: row.try_get("previous_close")?,
        change: row.try_get("change")?,
        change_percent: row.try_get("change_percent")?,
        volume: row.try_get::<i64, _>("volume")?.max(0) as u64,
        prices: serde_json::from_str(&prices)?,
        indicators: indicators.as_deref().map(serde_json::from_str).transpose()?,
        fetched_at: row.try_get("fetched_at")?,
    })
}
