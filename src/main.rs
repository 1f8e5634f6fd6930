// datalab-server
// Optional dataset service for the analytics panel

use std::{
    fs::OpenOptions,
    io::Write,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Mutex,
    time::Duration,
};

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record};
use tokio::signal;

use datalab::models::ServiceConfig;
use datalab::services::{
    log_file_path, prune_logs, router, AppState, DatasetCache, DatasetLoader,
};

// ============================================================================
// Logging
// ============================================================================

struct ServerLogger {
    file: Mutex<std::fs::File>,
    level: LevelFilter,
}

impl ServerLogger {
    fn new(log_dir: &std::path::Path) -> Result<Self, Box<dyn std::error::Error>> {
        std::fs::create_dir_all(log_dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(log_dir))?;
        Ok(Self {
            file: Mutex::new(file),
            level: LevelFilter::Info,
        })
    }
}

impl Log for ServerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = Local::now();
        let date = timestamp.format("%Y-%m-%d");
        let time = timestamp.format("%H:%M:%S");
        let line = format!(
            "[{date}][{time}][{}][{}] {}",
            record.target(),
            record.level(),
            record.args()
        );

        if let Ok(mut file) = self.file.try_lock() {
            let _ = writeln!(file, "{line}");
        }
        eprintln!("{line}");
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn init_logger(log_dir: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let logger = ServerLogger::new(log_dir)?;
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}

fn parse_host(host: &str) -> IpAddr {
    host.parse().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Waits for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env();

    init_logger(&config.log_dir)?;
    match prune_logs(&config.log_dir, config.log_retention_days) {
        Ok(0) => {}
        Ok(removed) => log::info!("Pruned {removed} old log file(s)"),
        Err(e) => log::warn!("Log pruning failed: {e}"),
    }

    let loader = DatasetLoader::new(
        config.source.clone(),
        Duration::from_secs(config.fetch_timeout_secs),
    );
    let source = serde_json::to_string(loader.source());
    let state = AppState::new(&config.dataset_name, DatasetCache::new(loader));

    if config.eager_load {
        state.cache.preload().await;
    }

    let app = router(state, &config);

    let address = SocketAddr::new(parse_host(&config.host), config.port);
    log::info!("datalab-server listening on http://{address}");
    log::info!("  Dataset: /api/{} (summary at /api/{}/summary)", config.dataset_name, config.dataset_name);
    match source {
        Ok(source) => log::info!("  Source: {source}"),
        Err(e) => log::warn!("  Source: <unprintable: {e}>"),
    }

    let listener = tokio::net::TcpListener::bind(address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::logger().flush();
    Ok(())
}
