//! Per-feed reconciler: session clock, audience partitions and trophy tally.
//!
//! Single-threaded and deterministic. Each `consume` stages the next state
//! on a private copy and commits it in one step, so a published snapshot
//! always reflects whole entries. Published snapshots are never mutated;
//! readers may hold them for as long as they like. Entries are shared
//! between consecutive snapshots, so staging copies pointers only.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::classify::Audience;
use crate::session::{ClockState, SessionClock, Transition};
use crate::types::{FeedEntry, FeedKind, PlayerIdentity};

// ─── Trophy tally ─────────────────────────────────────────────────

/// Defeated-vehicle name -> kill count for the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrophyTally(BTreeMap<String, u32>);

impl TrophyTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit one kill of `vehicle`. Returns the new count.
    pub fn record(&mut self, vehicle: impl Into<String>) -> u32 {
        let count = self.0.entry(vehicle.into()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn get(&self, vehicle: &str) -> u32 {
        self.0.get(vehicle).copied().unwrap_or(0)
    }

    /// Distinct vehicles credited.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total kills across all vehicles.
    pub fn total(&self) -> u32 {
        self.0.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    /// Entries in vehicle-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

// ─── Snapshot ─────────────────────────────────────────────────────

/// An entry as placed in a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classified<E> {
    pub entry: E,
    /// The local player acted (battle log) or spoke (chat).
    pub local_actor: bool,
}

/// Immutable view of one feed's reconciled state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot<E> {
    pub feed: FeedKind,
    /// Ordinal of the current session; 0 before the first entry.
    pub session: u64,
    /// Entries consumed over the reconciler's lifetime.
    pub version: u64,
    pub team: Vec<Arc<Classified<E>>>,
    pub personal: Vec<Arc<Classified<E>>>,
    pub trophies: TrophyTally,
    /// Partition the most recent entry went to; `None` before the first.
    pub last: Option<Audience>,
}

impl<E> Snapshot<E> {
    pub fn empty(feed: FeedKind) -> Self {
        Self {
            feed,
            session: 0,
            version: 0,
            team: Vec::new(),
            personal: Vec::new(),
            trophies: TrophyTally::new(),
            last: None,
        }
    }

    pub fn partition(&self, audience: Audience) -> &[Arc<Classified<E>>] {
        match audience {
            Audience::TeamWide => &self.team,
            Audience::Personal => &self.personal,
        }
    }

    /// The most recently consumed entry and its partition. Arrival order
    /// decides, so entries sharing a timestamp are told apart.
    pub fn newest(&self) -> Option<(Audience, &Classified<E>)> {
        let audience = self.last?;
        self.partition(audience)
            .last()
            .map(|entry| (audience, entry.as_ref()))
    }

    /// Entries in the current session across both partitions.
    pub fn len(&self) -> usize {
        self.team.len() + self.personal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.team.is_empty() && self.personal.is_empty()
    }

    fn reset_session(&mut self) {
        self.team.clear();
        self.personal.clear();
        self.trophies.clear();
        self.last = None;
    }
}

// ─── Reconciler ───────────────────────────────────────────────────

/// Result of consuming one entry.
#[derive(Debug, Clone)]
pub struct ConsumeOutcome<E> {
    pub transition: Transition,
    pub audience: Audience,
    /// Kill count of the credited vehicle after this entry, if any.
    pub trophy: Option<(String, u32)>,
    pub snapshot: Arc<Snapshot<E>>,
}

pub struct StreamReconciler<E: FeedEntry> {
    identity: Arc<dyn PlayerIdentity>,
    clock: SessionClock,
    current: Arc<Snapshot<E>>,
}

impl<E: FeedEntry> StreamReconciler<E> {
    pub fn new(identity: Arc<dyn PlayerIdentity>) -> Self {
        Self {
            identity,
            clock: SessionClock::new(),
            current: Arc::new(Snapshot::empty(E::FEED)),
        }
    }

    /// Reconcile one entry and publish the resulting snapshot.
    ///
    /// 1. A timestamp regression on an active feed clears both partitions
    ///    and the tally.
    /// 2. The clock advances to the entry's timestamp.
    /// 3. The entry is appended to its audience partition and any trophy is
    ///    merged into the tally.
    pub fn consume(&mut self, entry: E) -> ConsumeOutcome<E> {
        let local_player = self.identity.player_name();
        let classification = entry.classify(&local_player);

        let mut clock = self.clock;
        let transition = clock.observe(entry.at());

        let mut next = (*self.current).clone();
        if transition.is_rollover() {
            next.reset_session();
        }
        next.session = clock.session();
        next.version += 1;

        let trophy = classification.trophy.map(|vehicle| {
            let count = next.trophies.record(vehicle.clone());
            (vehicle, count)
        });

        let classified = Arc::new(Classified {
            entry,
            local_actor: classification.local_actor,
        });
        next.last = Some(classification.audience);
        match classification.audience {
            Audience::TeamWide => next.team.push(classified),
            Audience::Personal => next.personal.push(classified),
        }

        self.clock = clock;
        self.current = Arc::new(next);

        ConsumeOutcome {
            transition,
            audience: classification.audience,
            trophy,
            snapshot: Arc::clone(&self.current),
        }
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<E>> {
        Arc::clone(&self.current)
    }

    pub fn state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn feed(&self) -> FeedKind {
        E::FEED
    }
}

impl<E: FeedEntry> fmt::Debug for StreamReconciler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamReconciler")
            .field("feed", &E::FEED)
            .field("clock", &self.clock)
            .field("entries", &self.current.len())
            .finish_non_exhaustive()
    }
}
