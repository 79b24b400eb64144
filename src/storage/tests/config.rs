use super::*;

#[test]
fn test_default_config_is_valid() {
    let config = StorageConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.partition_granularity, PartitionGranularity::Month);
    assert!(config.save_ts && config.save_latest);
}

#[test]
fn test_config_from_json_keeps_defaults() {
    let config: StorageConfig = serde_json::from_str(
        r#"{"partition_granularity": "days", "system_ttl_secs": 604800, "save_latest": false}"#,
    )
    .unwrap();
    assert_eq!(config.partition_granularity, PartitionGranularity::Day);
    assert_eq!(config.system_ttl_secs, 604_800);
    assert!(!config.save_latest);
    assert_eq!(config.max_aggregation_intervals, 700);
}

#[test]
fn test_config_rejects_unknown_granularity() {
    let result: std::result::Result<StorageConfig, _> =
        serde_json::from_str(r#"{"partition_granularity": "WEEKS"}"#);
    assert!(result.is_err());
    assert!(matches!("weeks".parse::<PartitionGranularity>(), Err(Error::Config(_))));
    assert_eq!("INDEFINITE".parse::<PartitionGranularity>().unwrap(), PartitionGranularity::Indefinite);
}

#[test]
fn test_invalid_config_values() {
    let config = StorageConfig {
        decode_threads: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));

    let config = StorageConfig {
        system_ttl_secs: -5,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}
