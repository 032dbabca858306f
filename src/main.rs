use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("POSTERN_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let data_dir = std::env::var("POSTERN_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let invite_ttl = std::env::var("POSTERN_INVITE_TTL_DAYS").unwrap_or_else(|_| "14".to_string());
    info!(
        target: "postern",
        "postern starting: RUST_LOG='{}', http_port={}, invite_ttl_days={}, data_dir='{}'",
        rust_log, http_port, invite_ttl, data_dir
    );

    postern::server::run().await
}
