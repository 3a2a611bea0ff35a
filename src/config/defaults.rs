use super::*;

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/var/log/twcbus".to_string(),
            backup_count: 5,
            console_output: true,
            file_output: false,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: vec!["TeslaWallConnector.local".to_string()],
            service_name: "com.victronenergy.evcharger.twc3".to_string(),
            temperature_service_name: "com.victronenergy.temperature.twc3".to_string(),
            device_instance: 42,
            dryrun: false,
            dryrun_instance_offset: 100,
            name: "TWC3".to_string(),
            product_name: "Tesla Wall Connector 3".to_string(),
            custom_name: "Tesla Charger".to_string(),
            fast_interval_ms: 5000,
            slow_interval_ms: 60000,
            http_timeout_ms: 10000,
            connect_retry_delay_ms: 1000,
            display: DisplayMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}
