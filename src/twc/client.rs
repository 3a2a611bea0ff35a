use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::logging::get_logger;

use super::sanitize_nan_tokens;
use super::types::{LifetimeRaw, VersionInfo, VitalsRaw};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of charger telemetry; [`TwcClient`] is the HTTP implementation
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Host (or host:port) the source talks to
    fn host(&self) -> &str;

    async fn fetch_version(&self) -> Result<VersionInfo>;

    async fn fetch_lifetime(&self) -> Result<LifetimeRaw>;

    async fn fetch_vitals(&self) -> Result<VitalsRaw>;
}

#[async_trait::async_trait]
impl<T: TelemetrySource + ?Sized> TelemetrySource for std::sync::Arc<T> {
    fn host(&self) -> &str {
        (**self).host()
    }

    async fn fetch_version(&self) -> Result<VersionInfo> {
        (**self).fetch_version().await
    }

    async fn fetch_lifetime(&self) -> Result<LifetimeRaw> {
        (**self).fetch_lifetime().await
    }

    async fn fetch_vitals(&self) -> Result<VitalsRaw> {
        (**self).fetch_vitals().await
    }
}

/// HTTP client for a single Wall Connector
pub struct TwcClient {
    http: reqwest::Client,
    host: String,
    base_url: String,
    logger: crate::logging::StructuredLogger,
}

impl TwcClient {
    /// Create a client for `host` with the default 10 s timeout
    pub fn new(host: &str) -> Result<Self> {
        Self::with_timeout(host, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::config(format!("Failed to build HTTP client: {}", e)))?;
        let host = host.trim().to_string();
        let base_url = format!("http://{}/api/1", host);
        Ok(Self {
            http,
            host,
            base_url,
            logger: get_logger("twc"),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version_url(&self) -> String {
        format!("{}/version", self.base_url)
    }

    pub fn lifetime_url(&self) -> String {
        format!("{}/lifetime", self.base_url)
    }

    pub fn vitals_url(&self) -> String {
        format!("{}/vitals", self.base_url)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.logger.trace(&format!("GET {}", url));
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(BridgeError::protocol(format!(
                "GET {} returned HTTP {}",
                url, status
            )));
        }
        Ok(resp.text().await?)
    }

    fn parse<T: serde::de::DeserializeOwned>(url: &str, body: &str) -> Result<T> {
        serde_json::from_str(body)
            .map_err(|e| BridgeError::protocol(format!("Invalid response from {}: {}", url, e)))
    }

    /// Parse a lifetime body, tolerating the firmware's bare `nan` values
    pub fn parse_lifetime(body: &str) -> Result<LifetimeRaw> {
        Self::parse("lifetime", &sanitize_nan_tokens(body))
    }
}

#[async_trait::async_trait]
impl TelemetrySource for TwcClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn fetch_version(&self) -> Result<VersionInfo> {
        let url = self.version_url();
        let body = self.get_text(&url).await?;
        Self::parse(&url, &body)
    }

    async fn fetch_lifetime(&self) -> Result<LifetimeRaw> {
        let url = self.lifetime_url();
        let body = self.get_text(&url).await?;
        Self::parse(&url, &sanitize_nan_tokens(&body))
    }

    async fn fetch_vitals(&self) -> Result<VitalsRaw> {
        let url = self.vitals_url();
        let body = self.get_text(&url).await?;
        Self::parse(&url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_api_urls_from_host() {
        let c = TwcClient::new(" 192.168.1.40 ").unwrap();
        assert_eq!(c.host(), "192.168.1.40");
        assert_eq!(c.base_url(), "http://192.168.1.40/api/1");
        assert_eq!(c.version_url(), "http://192.168.1.40/api/1/version");
        assert_eq!(c.lifetime_url(), "http://192.168.1.40/api/1/lifetime");
        assert_eq!(c.vitals_url(), "http://192.168.1.40/api/1/vitals");
    }

    #[test]
    fn parse_lifetime_maps_nan_to_none() {
        let body = r#"{"contactor_cycles":120,"contactor_cycles_loaded":3,"alert_count":12,
            "thermal_foldbacks":0,"avg_startup_temp":nan,"charge_starts":118,
            "energy_wh":1234567,"connector_cycles":60,"uptime_s":98765,"charging_time_s":4321}"#;
        let lt = TwcClient::parse_lifetime(body).unwrap();
        assert_eq!(lt.avg_startup_temp, None);
        assert_eq!(lt.energy_wh, 1_234_567.0);
        assert_eq!(lt.charge_starts, 118.0);
    }

    #[test]
    fn parse_lifetime_missing_field_is_protocol_error() {
        let err = TwcClient::parse_lifetime(r#"{"energy_wh": 5}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol { .. }));
    }

    #[test]
    fn parse_lifetime_garbage_is_protocol_error() {
        let err = TwcClient::parse_lifetime("<html>busy</html>").unwrap_err();
        assert!(matches!(err, BridgeError::Protocol { .. }));
    }
}
