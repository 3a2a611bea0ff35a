//! Update scheduler
//!
//! [`Bridge`] owns the telemetry source and the two published services and
//! runs two cycles on one task: the fast cycle polls vitals (and lifetime)
//! and republishes everything, the slow cycle only refreshes the lifetime
//! counters. A cycle never returns an error; failures become observable
//! state on the bus instead.

mod cycles;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::metrics::HistorySnapshot;
use crate::publisher::DualServicePublisher;
use crate::twc::{TelemetrySource, TwcClient};

/// Bridge between one Wall Connector and its two bus services
pub struct Bridge<S: TelemetrySource> {
    config: Config,
    source: S,
    publisher: DualServicePublisher,
    /// Latest lifetime counters, used for the energy total
    history: Option<HistorySnapshot>,
    /// Consecutive failed fast cycles
    failures: u32,
    logger: StructuredLogger,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
}

impl<S: TelemetrySource> Bridge<S> {
    /// Read the charger identity, register both services and load the
    /// lifetime counters once. Any failure here aborts construction.
    pub async fn new(config: Config, source: S) -> Result<Self> {
        let logger = get_logger_with_context(
            LogContext::new("driver")
                .with_device_instance(config.effective_device_instance())
                .with_field("host", source.host().to_string()),
        );

        let version = source.fetch_version().await?;
        logger.info(&format!(
            "Charger {} firmware {} (part {})",
            version.serial_number, version.firmware_version, version.part_number
        ));

        let publisher = DualServicePublisher::register(&config, &version, source.host()).await?;
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();

        let mut bridge = Self {
            config,
            source,
            publisher,
            history: None,
            failures: 0,
            logger,
            shutdown_tx,
            shutdown_rx,
        };
        bridge.refresh_history().await?;
        Ok(bridge)
    }

    /// Claim the bus names and export all registered paths
    pub async fn start(&mut self) -> Result<()> {
        self.publisher.start().await
    }

    /// Run both cycles until a shutdown request arrives.
    ///
    /// The first tick of each cycle is one period after the call; the
    /// constructor has already published the lifetime counters.
    pub async fn run(&mut self) -> Result<()> {
        let fast_period = self.config.fast_interval();
        let slow_period = self.config.slow_interval();
        let mut fast = interval_at(Instant::now() + fast_period, fast_period);
        let mut slow = interval_at(Instant::now() + slow_period, slow_period);
        fast.set_missed_tick_behavior(MissedTickBehavior::Delay);
        slow.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.logger.info(&format!(
            "Polling {} every {:?}, lifetime every {:?}",
            self.source.host(),
            fast_period,
            slow_period
        ));

        loop {
            tokio::select! {
                _ = fast.tick() => {
                    self.fast_cycle().await;
                }
                _ = slow.tick() => {
                    self.slow_cycle().await;
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.publisher.stop().await?;
        self.logger.info("Bridge shutdown complete");
        Ok(())
    }

    /// Sender that stops [`Bridge::run`] when signalled
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }

    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    pub fn history(&self) -> Option<&HistorySnapshot> {
        self.history.as_ref()
    }

    pub fn publisher(&self) -> &DualServicePublisher {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut DualServicePublisher {
        &mut self.publisher
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Try each configured host in order and build a bridge on the first one
/// that answers.
///
/// Network failures move on to the next host after the configured delay;
/// any other failure is returned immediately.
pub async fn connect_first_available(config: &Config) -> Result<Bridge<TwcClient>> {
    let timeout = config.http_timeout();
    connect_first_available_with(config, |host| TwcClient::with_timeout(host, timeout)).await
}

pub async fn connect_first_available_with<S, F>(config: &Config, mut make_source: F) -> Result<Bridge<S>>
where
    S: TelemetrySource,
    F: FnMut(&str) -> Result<S>,
{
    let logger = get_logger("driver");
    for host in &config.hosts {
        let source = make_source(host)?;
        match Bridge::new(config.clone(), source).await {
            Ok(bridge) => {
                logger.info(&format!("Connected to charger on {}", host));
                return Ok(bridge);
            }
            Err(e) if e.is_network() => {
                logger.info(&format!("Failed to connect to charger on {}: {}", host, e));
                tokio::time::sleep(config.connect_retry_delay()).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(BridgeError::network(format!(
        "No charger reachable on {}",
        config.hosts.join(", ")
    )))
}
