use super::Bridge;
use crate::error::Result;
use crate::metrics::{DisplayReading, HistorySnapshot, derive};
use crate::twc::TelemetrySource;

impl<S: TelemetrySource> Bridge<S> {
    /// Poll vitals and republish both services.
    ///
    /// The first failure after a success marks the charger disconnected and
    /// shows the error reading; later failures only count. The first
    /// success after a failure marks it connected again.
    pub async fn fast_cycle(&mut self) {
        match self.update().await {
            Ok(()) => {
                if self.failures > 0 {
                    self.logger.info(&format!(
                        "Charger back after {} failed update(s)",
                        self.failures
                    ));
                    if let Err(e) = self.publisher.mark_connected().await {
                        self.logger
                            .error(&format!("Failed to publish reconnect: {}", e));
                    }
                }
                self.failures = 0;
            }
            Err(e) => {
                self.logger.error(&format!("Error running update: {}", e));
                if self.failures == 0 {
                    let name = self.config.name.clone();
                    if let Err(e) = self.publisher.mark_disconnected(&name).await {
                        self.logger
                            .error(&format!("Failed to publish disconnect: {}", e));
                    }
                }
                self.failures = self.failures.saturating_add(1);
            }
        }
    }

    /// Refresh the lifetime counters; failures are logged and otherwise
    /// ignored
    pub async fn slow_cycle(&mut self) {
        if let Err(e) = self.refresh_history().await {
            self.logger
                .error(&format!("Error running lifetime update: {}", e));
        }
    }

    async fn update(&mut self) -> Result<()> {
        let vitals = self.source.fetch_vitals().await?;
        let history = self.refresh_history().await?;
        let state = derive(&vitals, &history);
        let display = DisplayReading::from_state(self.config.display, &self.config.name, &state);
        self.publisher.publish_state(&state, &display).await?;
        self.logger.info(&format!(
            "Car Consumption: {}, State: {}",
            state.total_power,
            state.status.code()
        ));
        Ok(())
    }

    pub(crate) async fn refresh_history(&mut self) -> Result<HistorySnapshot> {
        let raw = self.source.fetch_lifetime().await?;
        let history = HistorySnapshot::from_raw(&raw);
        self.publisher.publish_history(&history).await?;
        self.history = Some(history.clone());
        Ok(history)
    }
}
