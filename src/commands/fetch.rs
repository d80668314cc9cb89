use crate::commands::{build_job, load_config, open_store};
use crate::error::Result;
use crate::worker::JobOutcome;

pub async fn run() {
    let config = load_config();

    println!("📥 Fetching VN30 market data...\n");

    match fetch_once(&config).await {
        Ok(outcome) => {
            println!("✅ Cached {} ({} stocks, {} records saved)",
                outcome.date,
                outcome.total_stocks,
                outcome.stocks_saved
            );
            if outcome.replaced_existing {
                println!("   Existing data for {} was replaced", outcome.date);
            }
            if let Some(report) = outcome.retention {
                if report.total() > 0 {
                    println!("   Removed {} old rows", report.total());
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Fetch failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn fetch_once(config: &crate::models::AppConfig) -> Result<JobOutcome> {
    let store = open_store(config).await?;
    let job = build_job(config, store.clone())?;
    let result = job.run().await;
    store.close().await;
    result
}
