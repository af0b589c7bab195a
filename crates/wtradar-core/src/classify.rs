//! Audience routing and trophy extraction.
//!
//! Pure functions of an entry and the local player's display name.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, Event, FeedEntry, FeedKind};

/// Which partition an entry lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// Entries that do not involve the local player.
    TeamWide,
    /// Entries where the local player is the acting or the target party.
    Personal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub audience: Audience,
    /// The local player is the acting party (battle log) or sender (chat).
    /// Presentation-only; never affects routing.
    pub local_actor: bool,
    /// Vehicle name to credit in the trophy tally, if any.
    pub trophy: Option<String>,
}

impl Classification {
    pub fn team_wide() -> Self {
        Self {
            audience: Audience::TeamWide,
            local_actor: false,
            trophy: None,
        }
    }
}

/// Classify any feed entry.
pub fn classify<E: FeedEntry>(entry: &E, local_player: &str) -> Classification {
    entry.classify(local_player)
}

/// Route a battle-log event.
///
/// Personal when the local player acts or is targeted (a self-interaction
/// still yields a single personal classification). A trophy is credited
/// only for kills by the local player on a named target vehicle.
pub fn classify_event(event: &Event, local_player: &str) -> Classification {
    let local_actor = is_local(&event.player.name, local_player);
    let local_target = is_local(&event.target_player.name, local_player);

    let audience = if local_actor || local_target {
        Audience::Personal
    } else {
        Audience::TeamWide
    };

    let trophy = (local_actor && event.action.is_kill() && !event.target_vehicle.name.is_empty())
        .then(|| event.target_vehicle.name.clone());

    Classification {
        audience,
        local_actor,
        trophy,
    }
}

/// Route a chat message: always team-wide, flagged when the local player
/// sent it.
pub fn classify_chat(message: &ChatMessage, local_player: &str) -> Classification {
    Classification {
        local_actor: is_local(&message.sender, local_player),
        ..Classification::team_wide()
    }
}

// An unset identity matches nobody, including entries with blank names.
fn is_local(name: &str, local_player: &str) -> bool {
    !local_player.is_empty() && name == local_player
}

impl FeedEntry for Event {
    const FEED: FeedKind = FeedKind::BattleLog;

    fn at(&self) -> Duration {
        self.at
    }

    fn classify(&self, local_player: &str) -> Classification {
        classify_event(self, local_player)
    }
}

impl FeedEntry for ChatMessage {
    const FEED: FeedKind = FeedKind::Chat;

    fn at(&self) -> Duration {
        self.at
    }

    fn classify(&self, local_player: &str) -> Classification {
        classify_chat(self, local_player)
    }
}
