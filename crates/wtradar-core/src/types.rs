use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::Classification;
use crate::error::WtError;

// ─── Feeds ────────────────────────────────────────────────────────

/// One independent stream of timestamped entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    BattleLog,
    Chat,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BattleLog => "battle_log",
            Self::Chat => "chat",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedKind {
    type Err = WtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "battle_log" | "battlelog" | "hudmsg" => Ok(Self::BattleLog),
            "chat" | "gamechat" => Ok(Self::Chat),
            _ => Err(WtError::UnknownFeed(s.to_owned())),
        }
    }
}

// ─── Identities ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub squad: String,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            squad: String::new(),
        }
    }

    pub fn with_squad(mut self, squad: impl Into<String>) -> Self {
        self.squad = squad.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(default)]
    pub name: String,
}

impl Vehicle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
}

// ─── Actions ──────────────────────────────────────────────────────

/// What the acting player did, as recognised by the telemetry source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Destroyed,
    ShotDown,
    SetAfire,
    Damaged,
    Crashed,
    Achieved,
    #[default]
    #[serde(other)]
    Other,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Destroyed => "destroyed",
            Self::ShotDown => "shot_down",
            Self::SetAfire => "set_afire",
            Self::Damaged => "damaged",
            Self::Crashed => "crashed",
            Self::Achieved => "achieved",
            Self::Other => "other",
        }
    }

    /// Actions that remove the target vehicle from the battle.
    pub fn is_kill(self) -> bool {
        matches!(self, Self::Destroyed | Self::ShotDown)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Entries ──────────────────────────────────────────────────────

/// One battle-log line, parsed and deduplicated by the telemetry source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Time since the current battle started.
    #[serde(rename = "at_ms", with = "duration_ms")]
    pub at: Duration,
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub target_player: Player,
    #[serde(default)]
    pub vehicle: Vehicle,
    #[serde(default)]
    pub target_vehicle: Vehicle,
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub achievement: Option<Achievement>,
    #[serde(default)]
    pub action_text: String,
    /// Raw line as reported by the game.
    #[serde(default)]
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "at_ms", with = "duration_ms")]
    pub at: Duration,
    /// Free-form channel tag, e.g. `team` or `all`.
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub msg: String,
}

/// An entry a `StreamReconciler` can consume.
pub trait FeedEntry: Clone + Send + Sync + 'static {
    const FEED: FeedKind;

    /// Timestamp relative to the start of the entry's battle.
    fn at(&self) -> Duration;

    /// Audience routing and trophy contribution for this entry.
    fn classify(&self, local_player: &str) -> Classification;
}

// ─── Configuration accessor ───────────────────────────────────────

/// Resolves the local player's display name.
///
/// Read once per consumed entry, so an implementation backed by live
/// configuration takes effect on the next entry.
pub trait PlayerIdentity: Send + Sync {
    fn player_name(&self) -> String;
}

impl PlayerIdentity for String {
    fn player_name(&self) -> String {
        self.clone()
    }
}

impl PlayerIdentity for &'static str {
    fn player_name(&self) -> String {
        (*self).to_owned()
    }
}

impl<T: PlayerIdentity + ?Sized> PlayerIdentity for Arc<T> {
    fn player_name(&self) -> String {
        (**self).player_name()
    }
}

/// Serde helper encoding a `Duration` as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
