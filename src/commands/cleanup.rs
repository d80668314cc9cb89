use crate::commands::{load_config, open_store};
use crate::error::Result;
use crate::services::RetentionReport;
use crate::utils::market_today;

pub async fn run(days: Option<u32>) {
    let config = load_config();
    let days_to_keep = days.unwrap_or(config.days_to_keep);

    println!("🧹 Removing data older than {} days...", days_to_keep);

    match cleanup(&config, days_to_keep).await {
        Ok(report) => {
            println!("✅ Deleted {} overviews, {} stock records, {} intraday candles",
                report.market_rows,
                report.stock_rows,
                report.intraday_rows
            );
        }
        Err(e) => {
            eprintln!("❌ Cleanup failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn cleanup(config: &crate::models::AppConfig, days_to_keep: u32) -> Result<RetentionReport> {
    let store = open_store(config).await?;
    let result = store.delete_old_data(days_to_keep, market_today()).await;
    store.close().await;
    result
}
