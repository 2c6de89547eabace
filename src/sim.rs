use crate::error::{PetError, Result};
use crate::model::{Metric, Metrics, PetState, Rules};
use crate::ports::FoodCatalog;
use crate::sleep::SleepEvent;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::BTreeMap;

pub const MIN_GAME_DURATION_SECS: i64 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PetAction {
    Feed { food_id: u32 },
    Play,
    Rest,
    Sleep,
    Wake,
}

impl PetAction {
    /// Parses a client-supplied action name (case-insensitive).
    pub fn parse(name: &str, food_id: Option<u32>) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FEED" => food_id
                .map(|food_id| PetAction::Feed { food_id })
                .ok_or(PetError::MissingParameter("foodId")),
            "PLAY" => Ok(PetAction::Play),
            "REST" => Ok(PetAction::Rest),
            "SLEEP" => Ok(PetAction::Sleep),
            "WAKE" => Ok(PetAction::Wake),
            other => Err(PetError::InvalidAction(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameKind {
    Flappy,
}

impl GameKind {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "FLAPPY" => Ok(GameKind::Flappy),
            other => Err(PetError::InvalidGame(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GameResult {
    pub game: GameKind,
    pub score: i64,
    pub duration_secs: i64,
}

/// Outcome of one decay step.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub metrics: Metrics,
    /// Advanced by the whole minutes consumed, so a sub-minute remainder
    /// carries into the next tick.
    pub last_update: DateTime<Utc>,
    pub minutes: i64,
}

pub fn elapsed_minutes(last_update: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if now <= last_update {
        return 0;
    }
    (now - last_update).num_seconds() / 60
}

#[derive(Clone, Debug, Default)]
pub struct DecayEngine {
    rules: Rules,
}

impl DecayEngine {
    pub fn new(rules: Rules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn rates(&self, sleeping: bool) -> &BTreeMap<Metric, f64> {
        if sleeping {
            &self.rules.sleep_rates
        } else {
            &self.rules.awake_rates
        }
    }

    /// Drifts every tracked metric by `rate * elapsed_minutes`. Sub-minute
    /// and backwards intervals return the input unchanged.
    pub fn apply(
        &self,
        metrics: &Metrics,
        last_update: DateTime<Utc>,
        now: DateTime<Utc>,
        sleeping: bool,
    ) -> Metrics {
        let minutes = elapsed_minutes(last_update, now);
        let mut out = metrics.clone();
        if minutes == 0 {
            return out;
        }
        for (metric, rate) in self.rates(sleeping) {
            out.adjust(*metric, rate * minutes as f64);
        }
        out
    }

    pub fn advance(
        &self,
        metrics: &Metrics,
        last_update: DateTime<Utc>,
        now: DateTime<Utc>,
        sleeping: bool,
    ) -> Tick {
        let minutes = elapsed_minutes(last_update, now);
        Tick {
            metrics: self.apply(metrics, last_update, now, sleeping),
            last_update: last_update + ChronoDuration::minutes(minutes),
            minutes,
        }
    }
}

pub struct ActionProcessor<'a> {
    foods: &'a dyn FoodCatalog,
}

impl<'a> ActionProcessor<'a> {
    pub fn new(foods: &'a dyn FoodCatalog) -> Self {
        Self { foods }
    }

    /// All-or-nothing: on error the input state is untouched.
    pub fn apply(&self, state: &PetState, action: &PetAction, now: DateTime<Utc>) -> Result<PetState> {
        let mut next = state.clone();
        match action {
            PetAction::Feed { food_id } => {
                let food = self
                    .foods
                    .lookup(*food_id)?
                    .ok_or(PetError::InvalidFood(*food_id))?;
                next.metrics.adjust(Metric::Hunger, food.hunger);
                next.metrics.adjust(Metric::Energy, food.energy);
            }
            PetAction::Play => {
                next.metrics.adjust(Metric::Energy, -10.0);
                next.metrics.adjust(Metric::Fun, 20.0);
            }
            PetAction::Rest => {
                next.metrics.adjust(Metric::Energy, 20.0);
            }
            PetAction::Sleep => {
                next.sleep.transition(SleepEvent::Sleep, now);
            }
            PetAction::Wake => {
                next.sleep.transition(SleepEvent::Wake, now);
            }
        }
        Ok(next)
    }

    pub fn apply_game(&self, state: &PetState, result: &GameResult) -> PetState {
        let mut next = state.clone();

        // too short to be a real round
        if result.duration_secs < MIN_GAME_DURATION_SECS {
            return next;
        }

        match result.game {
            GameKind::Flappy => {
                next.metrics.adjust(Metric::Energy, -15.0);
                next.metrics.adjust(Metric::Fun, 25.0);
                if result.score >= 1000 {
                    next.metrics.adjust(Metric::Stress, -10.0);
                }
                if result.score < 300 {
                    next.metrics.adjust(Metric::Stress, 10.0);
                }
            }
        }
        next
    }
}
