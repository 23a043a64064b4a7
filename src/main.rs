use tracing::{error, info};

use chs_archive::{ArchiveServer, Config};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // Load configuration
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = chs_archive::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        chs_archive::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("CHS Archive - file hosting service");
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );
    info!(
        retention_days = config.retention.retention_days,
        max_upload_size_mb = config.storage.max_upload_size_mb,
        "Storage at {}",
        config.storage.path
    );

    let result = match ArchiveServer::new(&config) {
        Ok(server) => server.run().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
