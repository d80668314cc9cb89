use chrono::Utc;
use chrono_tz::Asia::Ho_Chi_Minh;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

/// Log timestamps in Vietnam market time (UTC+7)
struct MarketTime;

impl FormatTime for MarketTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Utc::now().with_timezone(&Ho_Chi_Minh);
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Initialize tracing. `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    // try_init so a second call (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(MarketTime)
        .with_target(false)
        .try_init();
}
