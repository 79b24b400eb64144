use futures_util::future::try_join_all;

use super::{TimeseriesDao, now_ms};
use crate::kv::{DataPoint, EntityId, LatestEntry, TenantId};
use crate::query::{DeleteQuery, LatestRemoval, Order, ReadQuery};
use crate::storage::{Error, Operation, Params, Result, StatementKey, rows};

impl TimeseriesDao {
    /// Upsert the latest value of `point.key`, returning the new version.
    /// Listeners hear about it once the write is durable.
    pub async fn save_latest(
        &self,
        tenant: TenantId,
        entity: &EntityId,
        point: &DataPoint,
    ) -> Result<i64> {
        let params = Params {
            ts: Some(point.ts),
            value: Some(point.value.clone()),
            ..Params::series(entity, &point.key)
        };
        let batch = self
            .execute(
                StatementKey::typed(Operation::UpsertLatest, point.data_type()),
                params,
            )
            .await?;
        let version = rows::decode_mutation(&batch)?
            .version
            .ok_or_else(|| Error::backend("latest upsert returned no version"))?;
        let stored = point.clone().with_version(version);
        self.latest_cache.put(entity, stored.clone()).await;
        self.listener.on_update(tenant, *entity, &stored, version);
        Ok(version)
    }

    async fn load_latest(&self, entity: &EntityId, key: &str) -> Result<Option<DataPoint>> {
        let batch = self
            .execute(
                StatementKey::new(Operation::FindLatest),
                Params::series(entity, key),
            )
            .await?;
        Ok(rows::decode_points(&batch)?.into_iter().next())
    }

    pub async fn find_latest_opt(&self, entity: &EntityId, key: &str) -> Result<Option<DataPoint>> {
        if let Some(point) = self.latest_cache.get(entity, key).await {
            log::debug!("Latest '{key}' of {entity} served from cache");
            return Ok(Some(point));
        }
        let found = self.load_latest(entity, key).await?;
        if let Some(point) = &found {
            self.latest_cache.put(entity, point.clone()).await;
        }
        Ok(found)
    }

    /// Latest value of `key`, or an absent entry stamped now when none exists
    pub async fn find_latest(&self, entity: &EntityId, key: &str) -> Result<LatestEntry> {
        Ok(match self.find_latest_opt(entity, key).await? {
            Some(point) => LatestEntry::Present(point),
            None => LatestEntry::Absent {
                key: key.to_string(),
                ts: now_ms(),
            },
        })
    }

    pub async fn find_all_latest(&self, entity: &EntityId) -> Result<Vec<DataPoint>> {
        let params = Params {
            entity: Some(*entity),
            ..Default::default()
        };
        let batch = self
            .execute(StatementKey::new(Operation::FindAllLatest), params)
            .await?;
        self.pool.run(move || rows::decode_points(&batch)).await
    }

    /// Latest values of `keys` for each entity; missing ones are left out
    pub async fn find_latest_by_entity_ids(
        &self,
        entities: &[EntityId],
        keys: &[String],
    ) -> Result<Vec<(EntityId, DataPoint)>> {
        let lookups = entities.iter().flat_map(|entity| {
            keys.iter().map(move |key| async move {
                let found = self.find_latest_opt(entity, key).await?;
                Ok::<_, Error>(found.map(|point| (*entity, point)))
            })
        });
        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    /// Drop the latest value when its timestamp lies in the delete range.
    /// With rewrite enabled, the newest point older than the range becomes
    /// the latest value under a fresh version.
    pub async fn remove_latest(
        &self,
        tenant: TenantId,
        entity: &EntityId,
        query: &DeleteQuery,
    ) -> Result<LatestRemoval> {
        query.validate()?;
        let mut removal = LatestRemoval {
            key: query.key.clone(),
            ..Default::default()
        };
        let Some(latest) = self.load_latest(entity, &query.key).await? else {
            return Ok(removal);
        };
        if !query.affects_latest(latest.ts) {
            return Ok(removal);
        }

        let batch = self
            .execute(
                StatementKey::new(Operation::DeleteLatest),
                Params::series(entity, &query.key),
            )
            .await?;
        let mutation = rows::decode_mutation(&batch)?;
        self.latest_cache.evict(entity, &query.key).await;
        removal.removed = mutation.rows > 0;
        if let (true, Some(version)) = (removal.removed, mutation.version) {
            self.listener.on_delete(tenant, *entity, &query.key, version);
            removal.version = Some(version);
        }

        if removal.removed && query.rewrite_latest_if_deleted {
            let previous = ReadQuery::raw(query.key.clone(), 0, query.start_ts, 1, Order::Desc);
            let result = self.find_raw(entity, &previous).await?;
            if let Some(point) = result.data.into_iter().next() {
                let version = self.save_latest(tenant, entity, &point).await?;
                removal.version = Some(version);
                removal.data = Some(point.with_version(version));
            }
        }
        Ok(removal)
    }
}
