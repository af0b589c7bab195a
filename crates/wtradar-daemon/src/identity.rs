//! Live local-player identity backed by a `watch` channel.
//!
//! Reconcilers read the name on every entry, so a config reload takes
//! effect on the next entry of each feed.

use std::path::Path;

use tokio::sync::watch;
use wtradar_core::PlayerIdentity;

use crate::config::{Config, ConfigError};

/// Read side handed to reconcilers.
#[derive(Debug, Clone)]
pub struct LiveIdentity {
    rx: watch::Receiver<String>,
}

impl PlayerIdentity for LiveIdentity {
    fn player_name(&self) -> String {
        self.rx.borrow().clone()
    }
}

/// Write side kept by the process wiring.
#[derive(Debug)]
pub struct IdentityPublisher {
    tx: watch::Sender<String>,
}

impl IdentityPublisher {
    /// Publish a new player name. Returns `true` if it differs from the
    /// current one.
    pub fn publish(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        self.tx.send_if_modified(|current| {
            if *current == name {
                false
            } else {
                *current = name;
                true
            }
        })
    }

    pub fn current(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Re-read the config file and publish its player name.
    ///
    /// On error the previous name stays in effect.
    pub fn reload_from(&self, path: &Path) -> Result<bool, ConfigError> {
        let config = Config::load(path)?;
        Ok(self.publish(config.player_name))
    }
}

pub fn live_identity(initial: impl Into<String>) -> (IdentityPublisher, LiveIdentity) {
    let (tx, rx) = watch::channel(initial.into());
    (IdentityPublisher { tx }, LiveIdentity { rx })
}
