use std::sync::Arc;

use facelock::{
    capture::{NullMatcher, NullSource},
    utils::config::Config,
    Application,
};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::new().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize logging: stdout plus a daily-rotated file under the data
    // directory. The appender guard must outlive main.
    let file_appender =
        tracing_appender::rolling::daily(config.system.data_dir.join("logs"), "facelock.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.system.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(file_writer.and(std::io::stdout))
        .init();

    info!("Starting Facelock v{}", env!("CARGO_PKG_VERSION"));

    // The camera and matcher are external collaborators; the binary ships
    // with the headless null implementations wired in.
    let app = Application::new(config, Arc::new(NullSource), Arc::new(NullMatcher))
        .await
        .map_err(|e| {
            error!("Failed to initialize application: {}", e);
            e
        })?;

    app.start();
    info!("Application started successfully");

    // Handle shutdown signals
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }

    app.shutdown().await;
    Ok(())
}
