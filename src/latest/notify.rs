use tokio::sync::mpsc;

use crate::kv::{DataPoint, EntityId, TenantId};

/// Kind of object a change notification is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    LatestTsKv,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LatestEvent {
    Updated {
        tenant: TenantId,
        object: ObjectType,
        entity: EntityId,
        point: DataPoint,
        version: i64,
    },
    Deleted {
        tenant: TenantId,
        object: ObjectType,
        entity: EntityId,
        key: String,
        version: i64,
    },
}

impl LatestEvent {
    pub fn version(&self) -> i64 {
        match self {
            LatestEvent::Updated { version, .. } | LatestEvent::Deleted { version, .. } => *version,
        }
    }
}

/// Receiver of latest-value changes. Calls must not block; delivery is
/// best effort and never fails the write that triggered it.
pub trait LatestListener: Send + Sync {
    fn on_update(&self, tenant: TenantId, entity: EntityId, point: &DataPoint, version: i64);

    fn on_delete(&self, tenant: TenantId, entity: EntityId, key: &str, version: i64);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl LatestListener for NoopListener {
    fn on_update(&self, _tenant: TenantId, _entity: EntityId, _point: &DataPoint, _version: i64) {}

    fn on_delete(&self, _tenant: TenantId, _entity: EntityId, _key: &str, _version: i64) {}
}

/// Forwards events to an unbounded channel drained by the consumer
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<LatestEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LatestEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: LatestEvent) {
        if let Err(e) = self.tx.send(event) {
            log::warn!(
                "Dropping latest notification v{} for a closed receiver",
                e.0.version()
            );
        }
    }
}

impl LatestListener for ChannelListener {
    fn on_update(&self, tenant: TenantId, entity: EntityId, point: &DataPoint, version: i64) {
        self.send(LatestEvent::Updated {
            tenant,
            object: ObjectType::LatestTsKv,
            entity,
            point: point.clone(),
            version,
        });
    }

    fn on_delete(&self, tenant: TenantId, entity: EntityId, key: &str, version: i64) {
        self.send(LatestEvent::Deleted {
            tenant,
            object: ObjectType::LatestTsKv,
            entity,
            key: key.to_string(),
            version,
        });
    }
}
