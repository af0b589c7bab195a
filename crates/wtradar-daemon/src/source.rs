//! Telemetry stream adapter: newline-delimited JSON records -> feed channels.
//!
//! Each line is one record tagged with its feed:
//!
//! ```text
//! {"feed":"battle_log","at_ms":62000,"player":{"name":"ZenAviator"},"action":"destroyed","target_vehicle":{"name":"Me262"}}
//! {"feed":"chat","at_ms":64000,"mode":"team","sender":"Wingman","msg":"nice"}
//! ```
//!
//! Records are forwarded in emission order. Dropping the `FeedSenders` at
//! the end of the stream closes every feed.

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use wtradar_core::{ChatMessage, Event, FeedKind};

use crate::supervisor::FeedSenders;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("telemetry read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "feed", rename_all = "snake_case")]
pub enum TelemetryRecord {
    BattleLog(Event),
    Chat(ChatMessage),
}

impl TelemetryRecord {
    pub fn feed(&self) -> FeedKind {
        match self {
            Self::BattleLog(_) => FeedKind::BattleLog,
            Self::Chat(_) => FeedKind::Chat,
        }
    }
}

/// Counters reported when the stream ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub forwarded: u64,
    /// Lines that did not parse as a record.
    pub rejected: u64,
    /// Records whose feed had already stopped consuming.
    pub undelivered: u64,
}

/// Parse one line. Blank lines yield `Ok(None)`.
pub fn parse_record(line: &str) -> Result<Option<TelemetryRecord>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Read records from `reader` until EOF, an IO error, or cancellation.
pub async fn pump_lines<R>(
    reader: R,
    senders: FeedSenders,
    cancel: CancellationToken,
) -> Result<SourceStats, SourceError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = SourceStats::default();
    let mut line_num = 0u64;

    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("telemetry source cancelled");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!(forwarded = stats.forwarded, rejected = stats.rejected, "telemetry stream ended");
            break;
        };
        line_num += 1;

        let record = match parse_record(&line) {
            Ok(Some(record)) => record,
            Ok(None) => continue,
            Err(e) => {
                stats.rejected += 1;
                warn!(line_num, "rejected telemetry record: {e}");
                continue;
            }
        };

        let feed = record.feed();
        // One reader serves both feeds: a full channel stalls the other
        // feed's records here too, though its consume task keeps running.
        let delivered = match record {
            TelemetryRecord::BattleLog(event) => forward(&senders.battle_log, event).await,
            TelemetryRecord::Chat(message) => forward(&senders.chat, message).await,
        };
        if delivered {
            stats.forwarded += 1;
            debug!(line_num, %feed, "telemetry record forwarded");
        } else {
            stats.undelivered += 1;
            warn!(line_num, %feed, "feed stopped consuming, record not delivered");
        }
    }

    Ok(stats)
}

async fn forward<T>(tx: &mpsc::Sender<T>, entry: T) -> bool {
    tx.send(entry).await.is_ok()
}
