use crate::emotion::Emotion;
use crate::sleep::SleepStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type UserId = u64;

pub const METRIC_MIN: f64 = 0.0;
pub const METRIC_MAX: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    Hunger,
    Energy,
    Sleep,
    Fun,
    Stress,
    Temperature,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Hunger,
        Metric::Energy,
        Metric::Sleep,
        Metric::Fun,
        Metric::Stress,
        Metric::Temperature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Hunger => "HUNGER",
            Metric::Energy => "ENERGY",
            Metric::Sleep => "SLEEP",
            Metric::Fun => "FUN",
            Metric::Stress => "STRESS",
            Metric::Temperature => "TEMPERATURE",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn clamp_metric(v: f64) -> f64 {
    if v.is_nan() {
        return METRIC_MIN;
    }
    v.clamp(METRIC_MIN, METRIC_MAX)
}

/// Metric name to value. Every stored value is already clamped to [0, 100];
/// the only way in is through [`Metrics::set`] or [`Metrics::adjust`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<Metric, f64>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starting meters for a newly adopted pet.
    pub fn initial() -> Self {
        Self::new()
            .with(Metric::Hunger, 80.0)
            .with(Metric::Energy, 90.0)
            .with(Metric::Sleep, 70.0)
            .with(Metric::Fun, 80.0)
            .with(Metric::Stress, 20.0)
            .with(Metric::Temperature, 50.0)
    }

    pub fn with(mut self, metric: Metric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.0.get(&metric).copied()
    }

    /// Absent metrics read as full.
    pub fn value_or_full(&self, metric: Metric) -> f64 {
        self.get(metric).unwrap_or(METRIC_MAX)
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0.contains_key(&metric)
    }

    pub fn set(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, clamp_metric(value));
    }

    /// Adds `delta` to a tracked metric. Untracked metrics stay absent and
    /// the call returns false.
    pub fn adjust(&mut self, metric: Metric, delta: f64) -> bool {
        match self.0.get_mut(&metric) {
            Some(v) => {
                *v = clamp_metric(*v + delta);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Canonical notification thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub hunger_low: f64,
    pub energy_low: f64,
    pub fun_low: f64,
    /// Calm is `100 - STRESS`; the anger trigger fires below this.
    pub calm_low: f64,
    pub cold_below_c: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hunger_low: 50.0,
            energy_low: 30.0,
            fun_low: 40.0,
            calm_low: 30.0,
            cold_below_c: 15.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rules {
    /// Per-minute drift while awake.
    pub awake_rates: BTreeMap<Metric, f64>,
    /// Per-minute drift while asleep.
    pub sleep_rates: BTreeMap<Metric, f64>,
    pub thresholds: Thresholds,
}

impl Default for Rules {
    fn default() -> Self {
        let mut awake_rates = BTreeMap::new();
        awake_rates.insert(Metric::Hunger, -0.25);
        awake_rates.insert(Metric::Energy, -0.20);
        awake_rates.insert(Metric::Sleep, -0.15);
        awake_rates.insert(Metric::Stress, 0.10);

        let mut sleep_rates = BTreeMap::new();
        sleep_rates.insert(Metric::Energy, 0.30);
        sleep_rates.insert(Metric::Sleep, 0.40);
        sleep_rates.insert(Metric::Fun, -0.05);
        sleep_rates.insert(Metric::Hunger, -0.15);

        Self {
            awake_rates,
            sleep_rates,
            thresholds: Thresholds::default(),
        }
    }
}

/// The engine's view of one pet.
#[derive(Clone, Debug, PartialEq)]
pub struct PetState {
    pub metrics: Metrics,
    pub last_update: DateTime<Utc>,
    pub sleep: SleepStatus,
}

impl PetState {
    pub fn sleeping(&self) -> bool {
        self.sleep.is_sleeping()
    }
}

/// Persisted pet row. `revision` is bumped on every successful commit and
/// is the compare-and-swap token for concurrent writers; the sleep mode
/// lives here so it is covered by the same check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metrics: Metrics,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub sleep: SleepStatus,
    pub revision: u64,
}

impl MetricRow {
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            metrics: Metrics::initial(),
            last_update: now,
            sleep: SleepStatus::default(),
            revision: 0,
        }
    }
}

/// Everything one read-modify-write changes, applied as a single store
/// mutation.
#[derive(Clone, Debug, PartialEq)]
pub struct StateCommit {
    pub metrics: Metrics,
    pub last_update: DateTime<Utc>,
    pub sleep: SleepStatus,
    /// Appended to the emotion history when the label changed.
    pub emotion: Option<EmotionRecord>,
}

impl StateCommit {
    pub fn from_state(state: &PetState, emotion: Option<EmotionRecord>) -> Self {
        Self {
            metrics: state.metrics.clone(),
            last_update: state.last_update,
            sleep: state.sleep,
            emotion,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: u32,
    pub name: String,
    pub image_key: String,
    pub hunger: f64,
    pub energy: f64,
    pub happiness: f64,
    pub temperature: f64,
}

impl Food {
    fn new(id: u32, name: &str, image_key: &str, hunger: f64, energy: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            image_key: image_key.to_string(),
            hunger,
            energy,
            happiness: 0.0,
            temperature: 0.0,
        }
    }

    /// Seed catalog for a fresh store.
    pub fn starter_menu() -> Vec<Food> {
        let mut soup = Food::new(4, "Sopa", "food_sopa.png", 20.0, 5.0);
        soup.temperature = 10.0;
        let mut cake = Food::new(5, "Bolo", "food_bolo.png", 15.0, 15.0);
        cake.happiness = 10.0;
        vec![
            Food::new(1, "Maçã", "food_maca.png", 15.0, 5.0),
            Food::new(2, "Pão", "food_pao.png", 25.0, 5.0),
            Food::new(3, "Banana", "food_banana.png", 10.0, 15.0),
            soup,
            cake,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Sun,
    Cloudy,
    Rain,
    Night,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub temperature_c: f64,
    pub condition: WeatherCondition,
    pub is_day: bool,
}

impl Weather {
    /// Used whenever the provider cannot answer.
    pub fn fallback() -> Self {
        Self {
            temperature_c: 25.0,
            condition: WeatherCondition::Sun,
            is_day: true,
        }
    }
}

/// Append-only emotion history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRecord {
    pub emotion: Emotion,
    pub color: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
}

impl EmotionRecord {
    pub fn new(emotion: Emotion, created_at: DateTime<Utc>) -> Self {
        Self {
            emotion,
            color: emotion.color().to_string(),
            image: emotion.image_key().to_string(),
            created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: u64,
    pub user: UserId,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub message: String,
    pub read: bool,
}

/// Snapshot handed back to clients after every query or action.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FullState {
    pub emotion: Emotion,
    pub color: &'static str,
    pub image: &'static str,
    #[serde(rename = "isSleeping")]
    pub sleeping: bool,
    #[serde(rename = "states")]
    pub metrics: Metrics,
}
