#![cfg(test)]

use super::config::*;

#[test]
fn test_config_serialization() {
    let config = Config {
        hosts: vec!["192.168.1.50".to_string(), "twc.local".to_string()],
        display: DisplayMode::ChargerStatus,
        ..Config::default()
    };
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(yaml.contains("charger_status"));
    let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(deserialized.hosts, config.hosts);
    assert_eq!(deserialized.display, DisplayMode::ChargerStatus);
}

#[test]
fn test_partial_yaml_uses_defaults() {
    let yaml = "hosts: [\"10.0.0.7\"]\ndryrun: true\n";
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.hosts, vec!["10.0.0.7".to_string()]);
    assert!(config.dryrun);
    assert_eq!(config.fast_interval_ms, 5000);
    assert_eq!(config.name, "TWC3");
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twcbus_config.yaml");
    let config = Config {
        device_instance: 7,
        name: "Garage".to_string(),
        ..Config::default()
    };
    config.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();
    assert_eq!(loaded.device_instance, 7);
    assert_eq!(loaded.name, "Garage");
}

#[test]
fn test_unknown_display_mode_rejected() {
    let yaml = "display: rainbow\n";
    assert!(serde_yaml::from_str::<Config>(yaml).is_err());
}
