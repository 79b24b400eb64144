pub mod cache;

use super::*;

use crate::kv::{DataPoint, EntityId, EntityType};

pub fn device() -> EntityId {
    EntityId::random(EntityType::Device)
}

pub fn versioned(key: &str, ts: i64, value: f64, version: i64) -> DataPoint {
    DataPoint::new(key, ts, value).with_version(version)
}
