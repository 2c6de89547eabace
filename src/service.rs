use crate::emotion::{classify, needs_record};
use crate::error::{PetError, Result, StoreError};
use crate::model::{
    EmotionRecord, Food, FullState, GeoPoint, MetricRow, NotificationRecord, PetState, Rules,
    StateCommit, UserId, Weather,
};
use crate::notify::{metric_triggers, weather_triggers, NotificationGate, TriggerKind};
use crate::ports::{
    FoodCatalog, NotificationLedger, PushTransport, StateRepository, UserDirectory,
    WeatherProvider,
};
use crate::sim::{ActionProcessor, DecayEngine, GameKind, GameResult, PetAction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// A conflicting write is re-read and retried this many times.
pub const MAX_WRITE_RETRIES: usize = 1;

pub const DEFAULT_FEED_LIMIT: usize = 20;

/// The collaborators the service talks to.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub states: &'a dyn StateRepository,
    pub foods: &'a dyn FoodCatalog,
    pub ledger: &'a dyn NotificationLedger,
    pub users: &'a dyn UserDirectory,
    pub push: &'a dyn PushTransport,
    pub weather: &'a dyn WeatherProvider,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SweepFailure {
    pub user: UserId,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub fired: usize,
    pub failed: Vec<SweepFailure>,
}

pub struct PetService<'a> {
    ports: Ports<'a>,
    decay: DecayEngine,
    feed_limit: usize,
}

impl<'a> PetService<'a> {
    pub fn new(ports: Ports<'a>, rules: Rules) -> Self {
        Self {
            ports,
            decay: DecayEngine::new(rules),
            feed_limit: DEFAULT_FEED_LIMIT,
        }
    }

    pub fn with_feed_limit(mut self, limit: usize) -> Self {
        self.feed_limit = limit.max(1);
        self
    }

    /// Decays, persists if anything moved, reclassifies.
    pub fn get_full_state(&self, user: UserId, now: DateTime<Utc>) -> Result<FullState> {
        self.transact(user, now, |s| Ok(s.clone()))
    }

    pub fn perform_action(
        &self,
        user: UserId,
        action: &PetAction,
        now: DateTime<Utc>,
    ) -> Result<FullState> {
        let processor = ActionProcessor::new(self.ports.foods);
        info!(user, ?action, "action");
        self.transact(user, now, |s| processor.apply(s, action, now))
    }

    pub fn record_game_result(
        &self,
        user: UserId,
        game: &str,
        score: i64,
        duration_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<FullState> {
        let result = GameResult {
            game: GameKind::parse(game)?,
            score,
            duration_secs,
        };
        let processor = ActionProcessor::new(self.ports.foods);
        info!(user, score, duration_secs, "game result");
        self.transact(user, now, |s| Ok(processor.apply_game(s, &result)))
    }

    /// Refreshes the pet, then fires every trigger whose condition holds and
    /// whose cooldown has lapsed. Returns how many fired.
    pub fn evaluate_notifications(&self, user: UserId, now: DateTime<Utc>) -> Result<usize> {
        let state = self.get_full_state(user, now)?;
        let thresholds = &self.decay.rules().thresholds;

        let mut kinds = metric_triggers(&state.metrics, thresholds);
        if let Some(point) = self.ports.users.last_location(user)? {
            let weather = self.weather_at(point);
            kinds.extend(weather_triggers(&weather, thresholds));
        }
        if state.sleeping {
            debug!(user, "asleep, pet triggers muted");
            kinds.retain(|k| k.is_weather());
        }

        let gate = NotificationGate::new(self.ports.ledger);
        let mut fired = 0;
        for kind in kinds {
            if gate.try_fire(user, kind.key(), kind.title(), kind.body(), now)? {
                fired += 1;
                self.dispatch(user, kind);
            }
        }
        if fired > 0 {
            info!(user, fired, "notifications fired");
        }
        Ok(fired)
    }

    /// Evaluates every active user. One user's failure is logged and
    /// reported, and the sweep moves on.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for user in self.ports.users.active_users()? {
            match self.evaluate_notifications(user, now) {
                Ok(n) => {
                    report.processed += 1;
                    report.fired += n;
                }
                Err(e) => {
                    error!(user, error = %e, "notification sweep failed for user");
                    report.failed.push(SweepFailure {
                        user,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    pub fn list_notifications(
        &self,
        user: UserId,
        limit: Option<usize>,
    ) -> Result<Vec<NotificationRecord>> {
        let limit = limit.unwrap_or(self.feed_limit).min(self.feed_limit);
        Ok(self.ports.ledger.list_recent(user, limit)?)
    }

    pub fn foods(&self) -> Result<Vec<Food>> {
        Ok(self.ports.foods.all()?)
    }

    /// Stores the user's last known position and reports the weather there.
    pub fn record_location(&self, user: UserId, point: GeoPoint) -> Result<Weather> {
        self.ports.users.record_location(user, point)?;
        Ok(self.weather_at(point))
    }

    pub fn register_device(&self, user: UserId, token: &str) -> Result<()> {
        Ok(self.ports.users.register_device(user, token)?)
    }

    pub fn create_initial_state(&self, user: UserId, now: DateTime<Utc>) -> Result<()> {
        info!(user, "creating initial pet");
        let row = MetricRow::initial(now);
        let first = EmotionRecord::new(classify(&row.metrics), now);
        Ok(self.ports.states.create(user, &row, &first)?)
    }

    /* -----------------------------
       Read-modify-write core
    ------------------------------ */

    fn load_or_create(&self, user: UserId, now: DateTime<Utc>) -> Result<MetricRow> {
        match self.ports.states.load(user) {
            Ok(row) => Ok(row),
            Err(StoreError::NotFound(_)) => {
                self.create_initial_state(user, now)?;
                Ok(self.ports.states.load(user)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Decay, mutation, sleep mode and the emotion record land in one
    /// revision-checked commit, so a failure leaves the stored pet as it was.
    fn transact<F>(&self, user: UserId, now: DateTime<Utc>, mutate: F) -> Result<FullState>
    where
        F: Fn(&PetState) -> Result<PetState>,
    {
        for attempt in 0..=MAX_WRITE_RETRIES {
            let row = self.load_or_create(user, now)?;
            let tick = self
                .decay
                .advance(&row.metrics, row.last_update, now, row.sleep.is_sleeping());
            let current = PetState {
                metrics: tick.metrics,
                last_update: tick.last_update,
                sleep: row.sleep,
            };

            let next = mutate(&current)?;

            let emotion = classify(&next.metrics);
            let last = self.ports.states.last_emotion(user)?;
            let record =
                needs_record(last.as_ref(), emotion).then(|| EmotionRecord::new(emotion, now));

            let changed = next.metrics != row.metrics
                || next.last_update != row.last_update
                || next.sleep != row.sleep
                || record.is_some();
            if changed {
                let commit = StateCommit::from_state(&next, record);
                match self.ports.states.commit(user, &commit, row.revision) {
                    Ok(_) => {
                        if commit.emotion.is_some() {
                            debug!(user, %emotion, "emotion changed");
                        }
                    }
                    Err(StoreError::Conflict(_)) if attempt < MAX_WRITE_RETRIES => {
                        warn!(user, attempt, "stale write, retrying");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            return Ok(FullState {
                emotion,
                color: emotion.color(),
                image: emotion.image_key(),
                sleeping: next.sleeping(),
                metrics: next.metrics,
            });
        }
        Err(PetError::ConcurrentUpdate(user))
    }

    fn weather_at(&self, point: GeoPoint) -> Weather {
        self.ports.weather.current(point).unwrap_or_else(|e| {
            warn!(error = %e, "weather lookup failed, using fallback");
            Weather::fallback()
        })
    }

    fn dispatch(&self, user: UserId, kind: TriggerKind) {
        let token = match self.ports.users.device_token(user) {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!(user, kind = kind.key(), "no device registered");
                return;
            }
            Err(e) => {
                warn!(user, error = %e, "device lookup failed");
                return;
            }
        };
        let data = serde_json::json!({ "type": kind.key() });
        if !self.ports.push.send(&token, kind.title(), kind.body(), &data) {
            warn!(user, kind = kind.key(), "push not delivered");
        }
    }
}
