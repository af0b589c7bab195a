//! wtradar-core: session-aware reconciliation of game telemetry feeds.
//!
//! Classifies battle-log events and chat messages by audience, detects
//! battle-session rollover from timestamp regression, and keeps a per-session
//! trophy tally. Pure and synchronous; the async wiring lives in
//! `wtradar-daemon`.

pub mod classify;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod types;

pub use classify::{Audience, Classification};
pub use error::WtError;
pub use reconciler::{Classified, ConsumeOutcome, Snapshot, StreamReconciler, TrophyTally};
pub use session::{ClockState, SessionClock, Transition};
pub use types::{
    Achievement, Action, ChatMessage, Event, FeedEntry, FeedKind, Player, PlayerIdentity, Vehicle,
};
