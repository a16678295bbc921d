//! Integration test for programmatic configuration
//!
//! Tests that batchers can be configured entirely in code, or from TOML,
//! without touching the process environment.

use dynbatch_core::{BatcherConfig, RetrySettings};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_programmatic_batcher_config() {
    let config = BatcherConfig {
        name: "reranker".to_string(),
        max_batch_size: 64,
        max_wait_ms: 25,
        max_concurrent_batches: 2,
        retry: RetrySettings {
            max_retries: 5,
            retry_backoff_ms: 200,
            max_backoff_ms: 10_000,
        },
        log_level: "debug".to_string(),
    };

    assert!(config.validate().is_ok());
    assert_eq!(config.name, "reranker");
    assert_eq!(config.max_wait_time(), Duration::from_millis(25));
    assert_eq!(config.max_concurrent_batches, 2);
    assert_eq!(config.retry.max_retries, 5);
}

#[test]
fn test_builder_style_config() {
    let config = BatcherConfig::new(16, Duration::from_millis(40))
        .with_name("embedder")
        .with_max_concurrent_batches(3)
        .with_log_level("warn");

    assert!(config.validate().is_ok());
    assert_eq!(config.max_batch_size, 16);
    assert_eq!(config.max_wait_ms, 40);
    assert_eq!(config.name, "embedder");
    assert_eq!(config.max_concurrent_batches, 3);
    assert_eq!(config.log_level, "warn");
}

#[test]
fn test_sub_millisecond_wait_rounds_down() {
    let config = BatcherConfig::new(4, Duration::from_micros(900));
    assert_eq!(config.max_wait_ms, 0);
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("dynbatch-config-{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
name = "classifier"
max_batch_size = 8
max_wait_ms = 0
max_concurrent_batches = 4

[retry]
max_retries = 0
"#
        )
        .unwrap();
    }

    let config = BatcherConfig::from_file(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert!(config.validate().is_ok());
    assert_eq!(config.name, "classifier");
    assert_eq!(config.max_batch_size, 8);
    assert_eq!(config.max_wait_time(), Duration::ZERO);
    assert_eq!(config.max_concurrent_batches, 4);
    assert_eq!(config.retry.max_retries, 0);
    assert_eq!(config.retry.retry_backoff_ms, 100);
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_config_toml_round_trip() {
    let original = BatcherConfig::new(12, Duration::from_millis(7)).with_name("ocr");
    let text = toml::to_string(&original).unwrap();
    let parsed = BatcherConfig::from_toml_str(&text).unwrap();

    assert_eq!(parsed.name, "ocr");
    assert_eq!(parsed.max_batch_size, 12);
    assert_eq!(parsed.max_wait_ms, 7);
}

#[test]
fn test_invalid_values_rejected() {
    let zero_batch = BatcherConfig::from_toml_str("max_batch_size = 0").unwrap();
    assert!(zero_batch.validate().is_err());

    let too_many_retries = BatcherConfig::default().with_retry(RetrySettings {
        max_retries: 1000,
        ..RetrySettings::default()
    });
    assert!(too_many_retries.validate().is_err());
}
