pub mod config;
pub mod statements;

use super::*;
use chrono::DateTime;

use crate::kv::{DataPoint, EntityId, EntityType};

pub fn test_entity() -> EntityId {
    EntityId::random(EntityType::Device)
}

/// Epoch millis of an RFC 3339 timestamp
pub fn ms(rfc3339: &str) -> i64 {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .timestamp_millis()
}

pub fn temp_points() -> Vec<DataPoint> {
    vec![
        DataPoint::new("temp", 100, 1.0),
        DataPoint::new("temp", 200, 2.0),
        DataPoint::new("temp", 300, 3.0),
    ]
}
