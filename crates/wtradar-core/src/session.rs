//! Battle-session boundary detection.
//!
//! The telemetry source stamps every entry relative to the start of the
//! current battle, so a new battle restarts the clock. Within one battle a
//! feed is non-decreasing; any regression marks a session boundary.

use std::time::Duration;

/// True iff `incoming` starts a new session.
///
/// `latest` is the highest timestamp observed on the feed so far, `None`
/// before the first entry. The first entry never rolls over.
pub fn is_new_session(latest: Option<Duration>, incoming: Duration) -> bool {
    matches!(latest, Some(latest) if incoming < latest)
}

/// Whether a feed has observed any entry yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockState {
    #[default]
    Empty,
    Active {
        latest: Duration,
    },
}

/// Outcome of observing one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// First entry on the feed: `Empty -> Active`.
    Started,
    /// Same session continues.
    Continued,
    /// Timestamp regressed: a new battle began.
    Rollover,
}

impl Transition {
    pub fn is_rollover(self) -> bool {
        self == Self::Rollover
    }
}

/// Per-feed session clock: latest timestamp plus the ordinal of the current
/// session (0 while empty, 1 for the first battle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionClock {
    state: ClockState,
    session: u64,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock to `at` and report what kind of step it was.
    pub fn observe(&mut self, at: Duration) -> Transition {
        let transition = match self.state {
            ClockState::Empty => Transition::Started,
            ClockState::Active { latest } if is_new_session(Some(latest), at) => {
                Transition::Rollover
            }
            ClockState::Active { .. } => Transition::Continued,
        };
        if transition != Transition::Continued {
            self.session += 1;
        }
        self.state = ClockState::Active { latest: at };
        transition
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn latest(&self) -> Option<Duration> {
        match self.state {
            ClockState::Empty => None,
            ClockState::Active { latest } => Some(latest),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }
}
