use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepMode {
    #[default]
    Awake,
    Asleep,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepEvent {
    Sleep,
    Wake,
}

/// Two-state sleep controller. The mode is stored and queried, never
/// derived from metrics; it selects the decay table and mutes the
/// metric-based notification triggers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepStatus {
    pub mode: SleepMode,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SleepStatus {
    pub fn is_sleeping(&self) -> bool {
        self.mode == SleepMode::Asleep
    }

    /// Returns true when the mode changed. Repeating the current mode's
    /// event leaves the timestamps alone.
    pub fn transition(&mut self, event: SleepEvent, now: DateTime<Utc>) -> bool {
        match (self.mode, event) {
            (SleepMode::Awake, SleepEvent::Sleep) => {
                self.mode = SleepMode::Asleep;
                self.started_at = Some(now);
                self.ended_at = None;
                true
            }
            (SleepMode::Asleep, SleepEvent::Wake) => {
                self.mode = SleepMode::Awake;
                self.ended_at = Some(now);
                true
            }
            _ => false,
        }
    }
}
