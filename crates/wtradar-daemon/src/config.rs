//! TOML configuration: local player identity and feed tuning.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default capacity of each feed's entry channel.
pub const DEFAULT_FEED_BUFFER: usize = 256;

/// Written when no configuration file exists yet.
const DEFAULT_CONFIG_TOML: &str = r#"# wtradar configuration

# Your in-game display name, exactly as it appears in the battle log.
player_name = ""

# Entries buffered per feed (battle log, chat) before the reader waits.
feed_buffer = 256
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value `{key}`: {detail}")]
    Invalid { key: &'static str, detail: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player_name: String,
    pub feed_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            feed_buffer: DEFAULT_FEED_BUFFER,
        }
    }
}

/// What `load_or_create` found at the configured path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(Config),
    /// No file existed; a default one was written here.
    Created(PathBuf),
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()
    }

    /// Trim the player name and reject values the reconciler cannot use.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.player_name = self.player_name.trim().to_owned();
        if self.player_name.is_empty() {
            return Err(ConfigError::Invalid {
                key: "player_name",
                detail: "must be set to your in-game display name".into(),
            });
        }
        if self.feed_buffer == 0 {
            return Err(ConfigError::Invalid {
                key: "feed_buffer",
                detail: "must be greater than zero".into(),
            });
        }
        Ok(self)
    }

    /// One-line summary for startup logging.
    pub fn dump(&self) -> String {
        format!(
            "player_name={:?} feed_buffer={}",
            self.player_name, self.feed_buffer
        )
    }
}

/// Load the config at `path`, or write the default template there when it
/// does not exist yet.
pub fn load_or_create(path: &Path) -> Result<LoadOutcome, ConfigError> {
    if path.exists() {
        return Config::load(path).map(LoadOutcome::Loaded);
    }
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, DEFAULT_CONFIG_TOML).map_err(io_err)?;
    Ok(LoadOutcome::Created(path.to_path_buf()))
}

/// Default config path: `$XDG_CONFIG_HOME/wtradar/config.toml`, falling
/// back to `$HOME/.config/wtradar/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CONFIG_HOME")
        && !dir.is_empty()
    {
        return PathBuf::from(dir).join("wtradar").join("config.toml");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("wtradar")
        .join("config.toml")
}
