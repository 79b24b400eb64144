pub mod write;

use std::sync::Arc;

use super::*;

use crate::kv::{DataPoint, EntityType, TenantId};
use crate::storage::{InMemoryDriver, PartitionGranularity};

pub const MINUTE: i64 = 60_000;

pub struct Fixture {
    pub driver: Arc<InMemoryDriver>,
    pub dao: TimeseriesDao,
    pub tenant: TenantId,
    pub entity: EntityId,
}

pub fn fixture_with(driver: InMemoryDriver, config: StorageConfig) -> Fixture {
    let driver = Arc::new(driver);
    let dao = TimeseriesDao::new(driver.clone(), config).unwrap();
    Fixture {
        driver,
        dao,
        tenant: TenantId::random(),
        entity: EntityId::random(EntityType::Device),
    }
}

pub fn fixture(config: StorageConfig) -> Fixture {
    fixture_with(InMemoryDriver::new(), config)
}

pub fn granular(granularity: PartitionGranularity) -> StorageConfig {
    StorageConfig {
        partition_granularity: granularity,
        ..Default::default()
    }
}

pub fn temp_points() -> Vec<DataPoint> {
    vec![
        DataPoint::new("temp", 100, 1.0),
        DataPoint::new("temp", 200, 2.0),
        DataPoint::new("temp", 300, 3.0),
    ]
}

impl Fixture {
    pub async fn save(&self, points: &[DataPoint]) -> SaveResult {
        self.dao
            .save_all(self.tenant, &self.entity, points, 0)
            .await
            .unwrap()
    }
}
