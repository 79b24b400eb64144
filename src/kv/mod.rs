//! Entity identifiers and typed telemetry points

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod scalar_value;

#[cfg(test)]
mod tests;

pub use scalar_value::{MAX_CHARS_PER_DATA_POINT, ScalarValue};

use crate::storage::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Tenant,
    Customer,
    Device,
    Asset,
    EntityView,
    Edge,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Tenant => "TENANT",
            EntityType::Customer => "CUSTOMER",
            EntityType::Device => "DEVICE",
            EntityType::Asset => "ASSET",
            EntityType::EntityView => "ENTITY_VIEW",
            EntityType::Edge => "EDGE",
        }
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TENANT" => Ok(EntityType::Tenant),
            "CUSTOMER" => Ok(EntityType::Customer),
            "DEVICE" => Ok(EntityType::Device),
            "ASSET" => Ok(EntityType::Asset),
            "ENTITY_VIEW" => Ok(EntityType::EntityView),
            "EDGE" => Ok(EntityType::Edge),
            other => Err(Error::InvalidQuery(format!("unknown entity type '{other}'"))),
        }
    }
}

/// Owner of a telemetry series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub entity_type: EntityType,
    pub id: Uuid,
}

impl EntityId {
    pub fn new(entity_type: EntityType, id: Uuid) -> Self {
        Self { entity_type, id }
    }

    pub fn random(entity_type: EntityType) -> Self {
        Self::new(entity_type, Uuid::new_v4())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type.as_str(), self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn random() -> Self {
        TenantId(Uuid::new_v4())
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Storage type of a value. Each type lives in its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    String,
    Long,
    Double,
    Json,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::Boolean,
        DataType::String,
        DataType::Long,
        DataType::Double,
        DataType::Json,
    ];

    /// Value column holding this type
    pub fn column(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool_v",
            DataType::String => "str_v",
            DataType::Long => "long_v",
            DataType::Double => "dbl_v",
            DataType::Json => "json_v",
        }
    }

    /// Count column of a pre-aggregated chunk
    pub fn count_column(&self) -> &'static str {
        match self {
            DataType::Boolean => "bool_cnt",
            DataType::String => "str_cnt",
            DataType::Long => "long_cnt",
            DataType::Double => "dbl_cnt",
            DataType::Json => "json_cnt",
        }
    }
}

/// A typed value recorded at a millisecond timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub key: String,
    pub ts: i64,
    pub value: ScalarValue,
    /// Set on latest values; raw history rows carry none
    pub version: Option<i64>,
}

impl DataPoint {
    pub fn new(key: impl Into<String>, ts: i64, value: impl Into<ScalarValue>) -> Self {
        Self {
            key: key.into(),
            ts,
            value: value.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn data_type(&self) -> DataType {
        self.value.data_type()
    }

    pub fn data_points(&self) -> u64 {
        self.value.data_points()
    }
}

/// Result of a latest-value lookup. A missing key yields `Absent` stamped
/// with the lookup time instead of nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum LatestEntry {
    Present(DataPoint),
    Absent { key: String, ts: i64 },
}

impl LatestEntry {
    pub fn key(&self) -> &str {
        match self {
            LatestEntry::Present(p) => &p.key,
            LatestEntry::Absent { key, .. } => key,
        }
    }

    pub fn ts(&self) -> i64 {
        match self {
            LatestEntry::Present(p) => p.ts,
            LatestEntry::Absent { ts, .. } => *ts,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, LatestEntry::Present(_))
    }

    pub fn into_point(self) -> Option<DataPoint> {
        match self {
            LatestEntry::Present(p) => Some(p),
            LatestEntry::Absent { .. } => None,
        }
    }
}
