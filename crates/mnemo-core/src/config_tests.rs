//! Tests for `config` module.

use super::config::{IndexConfig, StoreConfig};
use std::io::Write;

#[test]
fn test_defaults_are_valid() {
    let config = IndexConfig::default();
    config.validate().unwrap();
    assert_eq!(config.m, 16);
    assert_eq!(config.ef_construction, 200);
    assert_eq!(config.ef_search, 50);
}

#[test]
fn test_m_max_doubles_at_layer_zero() {
    let config = IndexConfig::new(4);
    assert_eq!(config.m_max(0), 32);
    assert_eq!(config.m_max(1), 16);
    assert_eq!(config.m_max(7), 16);
}

#[test]
fn test_level_mult() {
    let config = IndexConfig::new(4);
    assert!((config.level_mult() - 1.0 / 16.0f64.ln()).abs() < 1e-12);
}

#[test]
fn test_validation_bounds() {
    assert!(IndexConfig::new(0).validate().is_err());
    assert!(IndexConfig::new(4097).validate().is_err());
    assert!(IndexConfig::new(4096).validate().is_ok());

    let mut config = IndexConfig::new(8);
    config.m = 1;
    assert!(config.validate().is_err());
    config.m = 200;
    assert!(config.validate().is_err());

    let mut config = IndexConfig::new(8);
    config.ef_construction = config.m - 1;
    assert!(config.validate().is_err());

    let mut config = IndexConfig::new(8);
    config.ef_search = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_store_config_defaults() {
    let config = StoreConfig::default();
    assert_eq!(config.index.dimension, 768);
    assert_eq!(config.backend.max_batch_entries, 0);
}

#[test]
fn test_store_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mnemo.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[index]\ndimension = 384\nm = 24\n\n[backend]\nmax_batch_entries = 64"
    )
    .unwrap();

    let config = StoreConfig::from_file(&path).unwrap();
    assert_eq!(config.index.dimension, 384);
    assert_eq!(config.index.m, 24);
    // Unset fields keep their defaults.
    assert_eq!(config.index.ef_construction, 200);
    assert_eq!(config.backend.max_batch_entries, 64);
}

#[test]
fn test_store_config_missing_file() {
    let err = StoreConfig::from_file("/nonexistent/mnemo.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
