//! Stub collaborators for service tests.
//!
//! Push and weather stubs record or fake their answers; the repository
//! wrappers sit in front of a real in-memory store and inject races or
//! failures on demand.

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use slivi::model::{EmotionRecord, GeoPoint, Metric, MetricRow, StateCommit, Weather};
use slivi::ports::{PushTransport, StateRepository, WeatherProvider};
use slivi::storage::JsonStore;
use slivi::weather::StaticWeather;
use slivi::{PetService, Ports, Rules, StoreError, UserId};
use std::cell::{Cell, RefCell};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 12, 7, 0, 0).unwrap()
}

pub fn approx(a: Option<f64>, b: f64) -> bool {
    a.map_or(false, |a| (a - b).abs() < 1e-9)
}

// ── Push ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SentPush {
    pub token: String,
    pub title: String,
    pub data: serde_json::Value,
}

#[derive(Default)]
pub struct RecordingPush {
    pub sent: RefCell<Vec<SentPush>>,
}

impl PushTransport for RecordingPush {
    fn send(&self, device_token: &str, title: &str, _body: &str, data: &serde_json::Value) -> bool {
        self.sent.borrow_mut().push(SentPush {
            token: device_token.to_string(),
            title: title.to_string(),
            data: data.clone(),
        });
        true
    }
}

// ── Weather ───────────────────────────────────────────────────

pub struct DownWeather;

impl WeatherProvider for DownWeather {
    fn current(&self, _point: GeoPoint) -> anyhow::Result<Weather> {
        Err(anyhow!("provider offline"))
    }
}

// ── Repositories ──────────────────────────────────────────────

/// Lets another writer sneak in before each of the next `interference`
/// commits, so the caller's compare-and-swap loses.
pub struct RacingStates<'a> {
    pub inner: &'a JsonStore,
    pub interference: Cell<u32>,
}

impl StateRepository for RacingStates<'_> {
    fn load(&self, user: UserId) -> Result<MetricRow, StoreError> {
        self.inner.load(user)
    }

    fn create(&self, user: UserId, row: &MetricRow, first: &EmotionRecord) -> Result<(), StoreError> {
        self.inner.create(user, row, first)
    }

    fn commit(&self, user: UserId, commit: &StateCommit, expected: u64) -> Result<u64, StoreError> {
        let left = self.interference.get();
        if left > 0 {
            self.interference.set(left - 1);
            let row = self.inner.load(user)?;
            let theirs = StateCommit {
                metrics: row.metrics.clone().with(Metric::Fun, 5.0),
                last_update: row.last_update,
                sleep: row.sleep,
                emotion: None,
            };
            self.inner.commit(user, &theirs, row.revision)?;
        }
        self.inner.commit(user, commit, expected)
    }

    fn last_emotion(&self, user: UserId) -> Result<Option<EmotionRecord>, StoreError> {
        self.inner.last_emotion(user)
    }
}

/// Fails every read for one user.
pub struct FlakyStates<'a> {
    pub inner: &'a JsonStore,
    pub broken_user: UserId,
}

impl StateRepository for FlakyStates<'_> {
    fn load(&self, user: UserId) -> Result<MetricRow, StoreError> {
        if user == self.broken_user {
            return Err(StoreError::Transient("connection reset".into()));
        }
        self.inner.load(user)
    }

    fn create(&self, user: UserId, row: &MetricRow, first: &EmotionRecord) -> Result<(), StoreError> {
        self.inner.create(user, row, first)
    }

    fn commit(&self, user: UserId, commit: &StateCommit, expected: u64) -> Result<u64, StoreError> {
        self.inner.commit(user, commit, expected)
    }

    fn last_emotion(&self, user: UserId) -> Result<Option<EmotionRecord>, StoreError> {
        self.inner.last_emotion(user)
    }
}

/// Reads work, every commit fails as if the disk went away mid-request.
pub struct ReadOnlyStates<'a> {
    pub inner: &'a JsonStore,
}

impl StateRepository for ReadOnlyStates<'_> {
    fn load(&self, user: UserId) -> Result<MetricRow, StoreError> {
        self.inner.load(user)
    }

    fn create(&self, user: UserId, row: &MetricRow, first: &EmotionRecord) -> Result<(), StoreError> {
        self.inner.create(user, row, first)
    }

    fn commit(&self, _user: UserId, _commit: &StateCommit, _expected: u64) -> Result<u64, StoreError> {
        Err(StoreError::Transient("disk full".into()))
    }

    fn last_emotion(&self, user: UserId) -> Result<Option<EmotionRecord>, StoreError> {
        self.inner.last_emotion(user)
    }
}

// ── Harness ───────────────────────────────────────────────────

pub struct Harness {
    pub store: JsonStore,
    pub push: RecordingPush,
    pub weather: StaticWeather,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_weather(Weather::fallback())
    }

    pub fn with_weather(weather: Weather) -> Self {
        Self {
            store: JsonStore::in_memory(),
            push: RecordingPush::default(),
            weather: StaticWeather(weather),
        }
    }

    pub fn ports(&self) -> Ports<'_> {
        Ports {
            states: &self.store,
            foods: &self.store,
            ledger: &self.store,
            users: &self.store,
            push: &self.push,
            weather: &self.weather,
        }
    }

    pub fn service(&self) -> PetService<'_> {
        PetService::new(self.ports(), Rules::default())
    }
}
