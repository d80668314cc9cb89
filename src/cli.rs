use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "vn30cache")]
#[command(about = "Daily VN30 market data fetcher and cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduler (startup check + daily cron) until Ctrl-C
    Run,
    /// Run one cache cycle now
    Fetch,
    /// Show cached dates and the latest overview
    Status {
        /// Number of dates to list
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Delete cached data older than the retention window
    Cleanup {
        /// Days to keep (defaults to DAYS_TO_KEEP)
        #[arg(short, long)]
        days: Option<u32>,
    },
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            commands::run::run().await;
        }
        Commands::Fetch => {
            commands::fetch::run().await;
        }
        Commands::Status { limit } => {
            commands::status::run(limit).await;
        }
        Commands::Cleanup { days } => {
            commands::cleanup::run(days).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["vn30cache", "status", "--limit", "5"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { limit: 5 }));

        let cli = Cli::try_parse_from(["vn30cache", "cleanup"]).unwrap();
        assert!(matches!(cli.command, Commands::Cleanup { days: None }));

        assert!(Cli::try_parse_from(["vn30cache", "serve"]).is_err());
    }
}
