use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Default Vietcap trading API base URL
pub const DEFAULT_VCI_BASE_URL: &str = "https://trading.vietcap.com.vn/api/";

/// Longest retention window accepted from configuration
pub const MAX_DAYS_TO_KEEP: u32 = 3650;

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sqlx connection string, e.g. `sqlite://data/vn30.db`
    pub database_url: String,

    /// Connection pool lower bound
    pub db_min_pool_size: u32,

    /// Connection pool upper bound
    pub db_max_pool_size: u32,

    /// Retention window for cached records, in days
    pub days_to_keep: u32,

    /// Daily trigger time (Asia/Ho_Chi_Minh)
    pub schedule_hour: u32,
    pub schedule_minute: u32,

    /// Whether the daemon schedules the daily job at all
    pub scheduler_enabled: bool,

    /// Pause between constituent symbol fetches
    pub symbol_fetch_delay: Duration,

    pub vci_base_url: String,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    pub rate_limit_per_minute: u32,

    /// Applied to stock prices, never to index values
    pub price_multiplier: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            db_min_pool_size: 10,
            db_max_pool_size: 50,
            days_to_keep: 30,
            schedule_hour: 1,
            schedule_minute: 0,
            scheduler_enabled: true,
            symbol_fetch_delay: Duration::from_millis(2000),
            vci_base_url: DEFAULT_VCI_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            rate_limit_per_minute: 30,
            price_multiplier: 1000.0,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment
    ///
    /// `.env` should already be loaded (see `main`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("DB_URL"))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable not set".to_string()))?;

        let config = Self {
            database_url,
            db_min_pool_size: parse_or(&lookup, "DB_MIN_POOL_SIZE", defaults.db_min_pool_size)?,
            db_max_pool_size: parse_or(&lookup, "DB_MAX_POOL_SIZE", defaults.db_max_pool_size)?,
            days_to_keep: parse_or(&lookup, "DAYS_TO_KEEP", defaults.days_to_keep)?,
            schedule_hour: parse_or(&lookup, "CACHE_JOB_HOUR", defaults.schedule_hour)?,
            schedule_minute: parse_or(&lookup, "CACHE_JOB_MINUTE", defaults.schedule_minute)?,
            scheduler_enabled: parse_flag(&lookup, "SCHEDULER_ENABLED", defaults.scheduler_enabled)?,
            symbol_fetch_delay: Duration::from_millis(parse_or(
                &lookup,
                "SYMBOL_FETCH_DELAY_MS",
                defaults.symbol_fetch_delay.as_millis() as u64,
            )?),
            vci_base_url: lookup("VCI_BASE_URL").unwrap_or(defaults.vci_base_url),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "VCI_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            rate_limit_per_minute: parse_or(&lookup, "VCI_RATE_LIMIT_PER_MINUTE", defaults.rate_limit_per_minute)?,
            price_multiplier: parse_or(&lookup, "PRICE_MULTIPLIER", defaults.price_multiplier)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.schedule_hour > 23 || self.schedule_minute > 59 {
            return Err(AppError::Config(format!(
                "Invalid daily trigger time {:02}:{:02}",
                self.schedule_hour, self.schedule_minute
            )));
        }
        if self.db_min_pool_size > self.db_max_pool_size {
            return Err(AppError::Config(format!(
                "DB_MIN_POOL_SIZE ({}) exceeds DB_MAX_POOL_SIZE ({})",
                self.db_min_pool_size, self.db_max_pool_size
            )));
        }
        if self.days_to_keep == 0 || self.days_to_keep > MAX_DAYS_TO_KEEP {
            return Err(AppError::Config(format!(
                "DAYS_TO_KEEP must be between 1 and {}, got {}",
                MAX_DAYS_TO_KEEP, self.days_to_keep
            )));
        }
        if self.rate_limit_per_minute == 0 {
            return Err(AppError::Config("VCI_RATE_LIMIT_PER_MINUTE must be positive".to_string()));
        }
        if !(self.price_multiplier > 0.0) {
            return Err(AppError::Config("PRICE_MULTIPLIER must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        Some(v) if v == "true" || v == "1" || v == "yes" => Ok(true),
        Some(v) if v == "false" || v == "0" || v == "no" => Ok(false),
        Some(v) => Err(AppError::Config(format!("Invalid value for {}: {}", key, v))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite://vn30.db")])).unwrap();
        assert_eq!(config.database_url, "sqlite://vn30.db");
        assert_eq!(config.days_to_keep, 30);
        assert_eq!(config.schedule_hour, 1);
        assert_eq!(config.schedule_minute, 0);
        assert!(config.scheduler_enabled);
        assert_eq!(config.symbol_fetch_delay, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.price_multiplier, 1000.0);
    }

    #[test]
    fn test_missing_database_url_is_config_error() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_db_url_alias() {
        let config = AppConfig::from_lookup(lookup_from(&[("DB_URL", "sqlite://alias.db")])).unwrap();
        assert_eq!(config.database_url, "sqlite://alias.db");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://vn30.db"),
            ("DAYS_TO_KEEP", "7"),
            ("CACHE_JOB_HOUR", "16"),
            ("CACHE_JOB_MINUTE", "30"),
            ("SCHEDULER_ENABLED", "false"),
            ("SYMBOL_FETCH_DELAY_MS", "0"),
            ("PRICE_MULTIPLIER", "1"),
        ]))
        .unwrap();
        assert_eq!(config.days_to_keep, 7);
        assert_eq!(config.schedule_hour, 16);
        assert_eq!(config.schedule_minute, 30);
        assert!(!config.scheduler_enabled);
        assert_eq!(config.symbol_fetch_delay, Duration::ZERO);
        assert_eq!(config.price_multiplier, 1.0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_number = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://vn30.db"),
            ("DAYS_TO_KEEP", "thirty"),
        ]));
        assert!(matches!(bad_number, Err(AppError::Config(_))));

        let bad_hour = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://vn30.db"),
            ("CACHE_JOB_HOUR", "24"),
        ]));
        assert!(matches!(bad_hour, Err(AppError::Config(_))));

        let bad_pool = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://vn30.db"),
            ("DB_MIN_POOL_SIZE", "20"),
            ("DB_MAX_POOL_SIZE", "5"),
        ]));
        assert!(matches!(bad_pool, Err(AppError::Config(_))));
    }

    #[test]
    fn test_days_to_keep_bounds() {
        for days in ["0", "3651", "4294967295"] {
            let result = AppConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "sqlite://vn30.db"),
                ("DAYS_TO_KEEP", days),
            ]));
            assert!(matches!(result, Err(AppError::Config(_))), "accepted {}", days);
        }

        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://vn30.db"),
            ("DAYS_TO_KEEP", "3650"),
        ]))
        .unwrap();
        assert_eq!(config.days_to_keep, MAX_DAYS_TO_KEEP);
    }
}
