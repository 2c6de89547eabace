//! Virtual pet state engine: time decay, player actions, emotion
//! classification, sleep mode and cooldown-gated notifications.

pub mod config;
pub mod emotion;
pub mod error;
pub mod model;
pub mod notify;
pub mod ports;
pub mod push;
pub mod service;
pub mod sim;
pub mod sleep;
pub mod storage;
pub mod weather;

pub use error::{PetError, StoreError};
pub use model::{FullState, Metric, Metrics, PetState, Rules, UserId};
pub use service::{PetService, Ports, SweepReport};
