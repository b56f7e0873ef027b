//! # Wholesecond Core Library
//!
//! Session and attempt engine for a reaction-timing game: the player tries to
//! act exactly on a whole second, the distance to it is scored against a
//! reward table, and each player gets a fixed number of attempts per session
//! followed by a cooldown.
//!
//! ## Architecture
//!
//! - **Clock**: samples wall-clock time and folds it into a 0..=500 ms offset
//! - **Rewards**: band table lookup, with a built-in default table
//! - **Session**: pure state machine (phases, cooldown, eligibility, commit plan)
//! - **Ledger**: append-only attempt history and the current-session view
//! - **Storage**: SQLite and in-memory stores, TOML configuration
//! - **Service**: the only writer; serializes submissions per player so a
//!   session's attempts can never be spent twice
//!
//! ## Key Components
//!
//! - [`SessionService`]: submit, reset and inspect sessions
//! - [`Database`]: persistent store
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod ledger;
pub mod player;
pub mod reward;
pub mod service;
pub mod session;
pub mod settings;
pub mod storage;

pub use clock::{sample_offset, Clock, ClockReading, ClockSampler, SystemClock, Timing};
pub use error::{ConfigError, CoreError, StoreError, ValidationError};
pub use events::Event;
pub use ledger::{Attempt, AttemptView};
pub use player::PlayerId;
pub use reward::{resolve_reward, BandGap, RewardBand, RewardTable};
pub use service::{AcceptedAttempt, Admission, PendingAttempt, SessionService, SubmitOutcome};
pub use session::{Rejection, SessionPhase, SessionState};
pub use settings::{SessionSettings, SettingsSource};
pub use storage::{Config, Database, MemoryStore, SessionStore, SessionTxn};
