use vn30cache::{cli, utils};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    utils::logging::init_logging();

    cli::run().await;
}
