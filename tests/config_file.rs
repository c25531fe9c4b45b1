//! Config file loading through a temporary TOML file.

use std::io::Write;

use tradesim_backend::SimulatorConfig;

#[test]
fn test_load_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
endpoint = "ws://localhost:9000/book"
trade_size_usd = 250.0
max_retries = 3
retry_delay_ms = 1000
"#
    )
    .unwrap();

    let cfg = SimulatorConfig::load(file.path()).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.endpoint, "ws://localhost:9000/book");
    assert_eq!(cfg.trade_size_usd, 250.0);
    assert_eq!(cfg.max_retries, 3);
    assert_eq!(cfg.retry_delay().as_millis(), 1000);
    // Untouched keys keep their defaults
    assert_eq!(cfg.fee_tier, 0.001);
    assert_eq!(cfg.display_depth, 5);
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_retries = \"five\"").unwrap();

    let err = SimulatorConfig::load(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to parse config"));
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(SimulatorConfig::load(dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_loaded_values_are_validated() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cache_capacity = 0").unwrap();

    let cfg = SimulatorConfig::load(file.path()).unwrap();
    assert!(cfg.validate().is_err());
}
