//! Collaborator traits at the edge of the engine.
//!
//! The service takes these as trait objects, so storage, push delivery and
//! weather lookups can be swapped (or stubbed in tests) without touching
//! the simulation.

use crate::error::StoreError;
use crate::model::{
    EmotionRecord, Food, GeoPoint, MetricRow, NotificationRecord, StateCommit, UserId, Weather,
};
use chrono::{DateTime, Utc};

pub trait StateRepository {
    /// `StoreError::NotFound` when the user has no pet yet.
    fn load(&self, user: UserId) -> Result<MetricRow, StoreError>;

    /// Creates the pet row with its first emotion record and marks the user
    /// active. An existing row is left untouched and no record is added.
    fn create(
        &self,
        user: UserId,
        row: &MetricRow,
        first_emotion: &EmotionRecord,
    ) -> Result<(), StoreError>;

    /// Applies metrics, sleep mode and the optional emotion record together,
    /// or nothing at all. Compare-and-swap on `expected_revision`; returns
    /// the new revision or `StoreError::Conflict` if another writer saved
    /// first.
    fn commit(
        &self,
        user: UserId,
        commit: &StateCommit,
        expected_revision: u64,
    ) -> Result<u64, StoreError>;

    fn last_emotion(&self, user: UserId) -> Result<Option<EmotionRecord>, StoreError>;
}

pub trait FoodCatalog {
    fn lookup(&self, food_id: u32) -> Result<Option<Food>, StoreError>;

    /// Every food, ordered by name.
    fn all(&self) -> Result<Vec<Food>, StoreError>;
}

pub trait NotificationLedger {
    fn last_fired(&self, user: UserId, kind: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn record(
        &self,
        user: UserId,
        kind: &str,
        title: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> Result<NotificationRecord, StoreError>;

    /// Newest first.
    fn list_recent(&self, user: UserId, limit: usize)
        -> Result<Vec<NotificationRecord>, StoreError>;
}

pub trait UserDirectory {
    fn active_users(&self) -> Result<Vec<UserId>, StoreError>;

    fn device_token(&self, user: UserId) -> Result<Option<String>, StoreError>;

    fn register_device(&self, user: UserId, token: &str) -> Result<(), StoreError>;

    fn last_location(&self, user: UserId) -> Result<Option<GeoPoint>, StoreError>;

    fn record_location(&self, user: UserId, point: GeoPoint) -> Result<(), StoreError>;
}

/// Best-effort delivery. Implementations log their own failures.
pub trait PushTransport {
    fn send(&self, device_token: &str, title: &str, body: &str, data: &serde_json::Value) -> bool;
}

pub trait WeatherProvider {
    fn current(&self, point: GeoPoint) -> anyhow::Result<Weather>;
}
