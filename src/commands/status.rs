use crate::commands::{load_config, open_store};
use crate::error::Result;
use crate::models::MarketOverview;

pub async fn run(limit: u32) {
    let config = load_config();

    println!("📊 VN30 Cache Status\n");

    if let Err(e) = show_status(&config, limit).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn show_status(config: &crate::models::AppConfig, limit: u32) -> Result<()> {
    let store = open_store(config).await?;

    let dates = store.get_available_dates(limit).await?;
    if dates.is_empty() {
        println!("⚠️  No cached data found. Run 'fetch' first.");
        store.close().await;
        return Ok(());
    }

    println!("📅 Cached dates ({}):", dates.len());
    for date in &dates {
        let count = store.get_all_stocks_by_date(*date).await?.len();
        println!("   {}  {:>3} records", date, count);
    }

    if let Some(overview) = store.get_latest_market_overview().await? {
        println!("\n═══════════════════════════════════════════════════════════\n");
        show_overview(&overview);
    }

    store.close().await;
    Ok(())
}

fn show_overview(overview: &MarketOverview) {
    let index = &overview.vn30_index;
    println!("🔹 VN30 {} ({})", overview.date, overview.source);
    println!("   Index:  {:.2}  {:+.2} ({:+.2}%)", index.index, index.change, index.change_percent);
    println!("   Stocks: {}", overview.total_stocks);

    if !overview.top_gainers.is_empty() {
        println!("\n   Top gainers:");
        for stock in &overview.top_gainers {
            println!("     {:<5} {:>12.2}  {:+.2}%", stock.symbol, stock.price, stock.change_percent);
        }
    }
    if !overview.top_losers.is_empty() {
        println!("\n   Top losers:");
        for stock in &overview.top_losers {
            println!("     {:<5} {:>12.2}  {:+.2}%", stock.symbol, stock.price, stock.change_percent);
        }
    }
}
