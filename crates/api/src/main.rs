//! ACL Stress Service - Main Entry Point

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_logging(&settings.log_level, settings.log_json)?;

    info!("=== ACL Stress Service v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Model artifact: {}", settings.model_path.display());

    run_server(settings).await
}
