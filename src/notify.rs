//! Notification triggers and the per-user cooldown gate.
//!
//! Conditions are re-detected on every evaluation pass; the gate is what
//! keeps a condition that stays true from turning into spam. A trigger
//! type fires at most once per cooldown window per user, and the ledger of
//! past firings doubles as the user-visible notification feed.

use crate::error::StoreError;
use crate::model::{Metric, Metrics, Thresholds, UserId, Weather, WeatherCondition};
use crate::ports::NotificationLedger;
use chrono::{DateTime, Utc};
use tracing::debug;

pub const DEFAULT_COOLDOWN_MINUTES: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    HungerLow,
    EnergyLow,
    Boredom,
    Anger,
    Cold,
    Rain,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 6] = [
        TriggerKind::HungerLow,
        TriggerKind::EnergyLow,
        TriggerKind::Boredom,
        TriggerKind::Anger,
        TriggerKind::Cold,
        TriggerKind::Rain,
    ];

    /// Ledger key.
    pub fn key(self) -> &'static str {
        match self {
            TriggerKind::HungerLow => "HUNGER_LOW",
            TriggerKind::EnergyLow => "ENERGY_LOW",
            TriggerKind::Boredom => "BORED",
            TriggerKind::Anger => "ANGER",
            TriggerKind::Cold => "COLD",
            TriggerKind::Rain => "RAIN",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key)
    }

    pub fn cooldown_minutes(self) -> i64 {
        match self {
            TriggerKind::HungerLow => 120,
            TriggerKind::EnergyLow => 180,
            TriggerKind::Boredom => 240,
            TriggerKind::Anger => 240,
            TriggerKind::Cold => 360,
            TriggerKind::Rain => 360,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            TriggerKind::HungerLow => "Estou com fome! 🍔",
            TriggerKind::EnergyLow => "Que sono... 😴",
            TriggerKind::Boredom => "Que tédio... 🎾",
            TriggerKind::Anger => "Grrr! 😠",
            TriggerKind::Cold => "Brrr! Esfriou ❄️",
            TriggerKind::Rain => "Está chovendo! ☔",
        }
    }

    pub fn body(self) -> &'static str {
        match self {
            TriggerKind::HungerLow => "O Slivi precisa comer para não ficar doente.",
            TriggerKind::EnergyLow => "O Slivi está exausto. Coloque-o para dormir!",
            TriggerKind::Boredom => "O Slivi quer brincar com você!",
            TriggerKind::Anger => "O Slivi está estressado. Que tal uma partida para relaxar?",
            TriggerKind::Cold => "Vista o Slivi adequadamente!",
            TriggerKind::Rain => "Não deixe o Slivi pegar chuva.",
        }
    }

    /// Weather triggers keep firing while the pet sleeps.
    pub fn is_weather(self) -> bool {
        matches!(self, TriggerKind::Cold | TriggerKind::Rain)
    }
}

/// Unknown keys fall back to [`DEFAULT_COOLDOWN_MINUTES`].
pub fn cooldown_for(key: &str) -> i64 {
    TriggerKind::from_key(key)
        .map(TriggerKind::cooldown_minutes)
        .unwrap_or(DEFAULT_COOLDOWN_MINUTES)
}

pub fn metric_triggers(m: &Metrics, t: &Thresholds) -> Vec<TriggerKind> {
    let mut out = Vec::new();
    if m.value_or_full(Metric::Hunger) < t.hunger_low {
        out.push(TriggerKind::HungerLow);
    }
    if m.value_or_full(Metric::Energy) < t.energy_low {
        out.push(TriggerKind::EnergyLow);
    }
    if m.value_or_full(Metric::Fun) < t.fun_low {
        out.push(TriggerKind::Boredom);
    }
    let calm = 100.0 - m.value_or_full(Metric::Stress);
    if calm < t.calm_low {
        out.push(TriggerKind::Anger);
    }
    out
}

pub fn weather_triggers(w: &Weather, t: &Thresholds) -> Vec<TriggerKind> {
    let mut out = Vec::new();
    if w.temperature_c < t.cold_below_c {
        out.push(TriggerKind::Cold);
    }
    if w.condition == WeatherCondition::Rain {
        out.push(TriggerKind::Rain);
    }
    out
}

pub struct NotificationGate<'a> {
    ledger: &'a dyn NotificationLedger,
}

impl<'a> NotificationGate<'a> {
    pub fn new(ledger: &'a dyn NotificationLedger) -> Self {
        Self { ledger }
    }

    /// Records a firing and returns true unless `kind` already fired for
    /// `user` inside its cooldown window. A suppressed call has no side
    /// effect.
    pub fn try_fire(
        &self,
        user: UserId,
        kind: &str,
        title: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if let Some(last) = self.ledger.last_fired(user, kind)? {
            let minutes_since = (now - last).num_seconds() as f64 / 60.0;
            let cooldown = cooldown_for(kind);
            if minutes_since < cooldown as f64 {
                debug!(user, kind, minutes_since, cooldown, "notification suppressed");
                return Ok(false);
            }
        }
        self.ledger.record(user, kind, title, message, now)?;
        Ok(true)
    }
}
