use std::fs;
use twcbus::config::{Config, DisplayMode};

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.hosts = vec!["192.168.1.40".to_string(), "twc.local".to_string()];
    cfg.display = DisplayMode::ChargerStatus;
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.hosts, cfg.hosts);
    assert_eq!(loaded.display, DisplayMode::ChargerStatus);
    assert_eq!(loaded.logging.file, cfg.logging.file);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    assert!(cfg.validate().is_ok());

    cfg.hosts.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.hosts = vec!["  ".to_string()];
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.service_name.clear();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.fast_interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.slow_interval_ms = 0;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.http_timeout_ms = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn dryrun_renames_services() {
    let cfg = Config {
        dryrun: true,
        ..Config::default()
    };
    assert_eq!(
        cfg.effective_service_name(),
        "com.victronenergy.evcharger.twc3_dryrun"
    );
    assert_eq!(
        cfg.effective_temperature_service_name(),
        "com.victronenergy.temperature.twc3_dryrun"
    );
    assert_eq!(cfg.effective_device_instance(), 142);
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), b"hosts: [unclosed").unwrap();
    let err = Config::from_file(tmp.path()).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("Serialization error"));
}
