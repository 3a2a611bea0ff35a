use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};
use twcbus::config::Config;
use twcbus::driver::connect_first_available;
use twcbus::logging::init_logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "twcbus {} starting, hosts: {}",
        env!("APP_VERSION"),
        config.hosts.join(", ")
    );

    let mut bridge = connect_first_available(&config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to charger: {}", e))?;
    bridge
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start D-Bus services: {}", e))?;

    tokio::spawn(forward_shutdown_signals(bridge.shutdown_handle()));

    match bridge.run().await {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Bridge failed with error: {}", e);
            Err(anyhow::anyhow!("Bridge error: {}", e))
        }
    }
}

async fn forward_shutdown_signals(shutdown: mpsc::UnboundedSender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Termination requested");
    shutdown.send(()).ok();
}
