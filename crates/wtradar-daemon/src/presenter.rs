//! Presentation layer: turns redraw notifications into output lines.
//!
//! All formatting of entries lives here; the reconciler only hands over
//! snapshots. Every notification re-reads the latest snapshot for its feed,
//! so a slow writer coalesces instead of replaying stale states.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wtradar_core::{Audience, ChatMessage, Classified, Event, FeedKind, Snapshot, TrophyTally};

use crate::supervisor::{RedrawNotification, SnapshotRx};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable line for the newest entry plus the trophy strip.
    #[default]
    Text,
    /// One JSON object per redraw carrying the whole snapshot.
    Json,
}

// ─── Text formatting ─────────────────────────────────────────────

/// `mm:ss.mmm` since battle start (minutes keep counting past 59).
pub fn format_at(at: Duration) -> String {
    let total_ms = at.as_millis();
    let minutes = total_ms / 60_000;
    let seconds = (total_ms / 1_000) % 60;
    let millis = total_ms % 1_000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

/// `"Me262 x 2, Spitfire"`: counts shown only above one.
pub fn format_trophies(trophies: &TrophyTally) -> String {
    if trophies.is_empty() {
        return "no trophies yet".to_owned();
    }
    trophies
        .iter()
        .map(|(name, count)| {
            if count > 1 {
                format!("{name} x {count}")
            } else {
                name.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn player_label(squad: &str, name: &str) -> String {
    if squad.is_empty() {
        name.to_owned()
    } else {
        format!("{squad} {name}")
    }
}

pub fn format_event(row: &Classified<Event>) -> String {
    let e = &row.entry;
    let marker = if row.local_actor { '*' } else { ' ' };
    let mut line = format!(
        "{} {marker} {} ({}) {}",
        format_at(e.at),
        player_label(&e.player.squad, &e.player.name),
        e.vehicle.name,
        e.action_text
    );
    match &e.achievement {
        Some(achievement) if !achievement.name.is_empty() => {
            line.push(' ');
            line.push_str(&achievement.name);
        }
        _ if !e.target_vehicle.name.is_empty() => {
            line.push_str(&format!(
                " {} ({})",
                e.target_vehicle.name,
                player_label(&e.target_player.squad, &e.target_player.name)
            ));
        }
        _ => {}
    }
    line
}

pub fn format_chat(row: &Classified<ChatMessage>) -> String {
    let m = &row.entry;
    let marker = if row.local_actor { '*' } else { ' ' };
    format!(
        "{} {marker} [{}] {}: {}",
        format_at(m.at),
        m.mode.to_uppercase(),
        m.sender,
        m.msg
    )
}

fn partition_label(audience: Audience) -> &'static str {
    match audience {
        Audience::TeamWide => "team",
        Audience::Personal => "personal",
    }
}

pub fn render_battle_log_text(snapshot: &Snapshot<Event>) -> String {
    let header = format!(
        "[battle_log s{} v{}] team={} personal={} trophies: {}",
        snapshot.session,
        snapshot.version,
        snapshot.team.len(),
        snapshot.personal.len(),
        format_trophies(&snapshot.trophies)
    );
    match snapshot.newest() {
        Some((audience, row)) => format!(
            "{header}\n  {:<8} {}",
            partition_label(audience),
            format_event(row)
        ),
        None => format!("{header}\n  no battle log yet"),
    }
}

pub fn render_chat_text(snapshot: &Snapshot<ChatMessage>) -> String {
    let header = format!(
        "[chat s{} v{}] messages={}",
        snapshot.session,
        snapshot.version,
        snapshot.len()
    );
    match snapshot.newest() {
        Some((_, row)) => format!("{header}\n  {}", format_chat(row)),
        None => format!("{header}\n  no chat yet"),
    }
}

#[derive(Serialize)]
struct JsonFrame<'a, E: Serialize> {
    rendered_at: String,
    #[serde(flatten)]
    snapshot: &'a Snapshot<E>,
}

pub fn render_json<E: Serialize>(snapshot: &Snapshot<E>) -> serde_json::Result<String> {
    serde_json::to_string(&JsonFrame {
        rendered_at: Utc::now().to_rfc3339(),
        snapshot,
    })
}

// ─── Redraw loop ─────────────────────────────────────────────────

/// Render one frame for `feed` from the latest snapshot.
pub fn render_frame(
    feed: FeedKind,
    battle_log: &SnapshotRx<Event>,
    chat: &SnapshotRx<ChatMessage>,
    format: OutputFormat,
) -> serde_json::Result<String> {
    match feed {
        FeedKind::BattleLog => {
            let snapshot = Arc::clone(&battle_log.borrow());
            match format {
                OutputFormat::Text => Ok(render_battle_log_text(&snapshot)),
                OutputFormat::Json => render_json(&snapshot),
            }
        }
        FeedKind::Chat => {
            let snapshot = Arc::clone(&chat.borrow());
            match format {
                OutputFormat::Text => Ok(render_chat_text(&snapshot)),
                OutputFormat::Json => render_json(&snapshot),
            }
        }
    }
}

/// Write one frame per redraw notification until every notifier is gone or
/// `cancel` fires. With `only` set, notifications for other feeds are
/// skipped. Returns the number of frames written.
pub async fn run_presenter<W>(
    mut notifications: broadcast::Receiver<RedrawNotification>,
    battle_log: SnapshotRx<Event>,
    chat: SnapshotRx<ChatMessage>,
    format: OutputFormat,
    only: Option<FeedKind>,
    mut out: W,
    cancel: CancellationToken,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut frames = 0u64;
    loop {
        let notification = tokio::select! {
            _ = cancel.cancelled() => break,
            n = notifications.recv() => n,
        };
        let notification = match notification {
            Ok(n) => n,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "presenter lagging, redraws coalesced");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        if only.is_some_and(|feed| feed != notification.feed) {
            continue;
        }

        let frame = render_frame(notification.feed, &battle_log, &chat, format)
            .map_err(std::io::Error::other)?;
        out.write_all(frame.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;
        frames += 1;
    }
    info!(frames, "presenter stopped");
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;
    use wtradar_core::{Achievement, Action, Player, StreamReconciler, Vehicle};

    const ME: &str = "ZenAviator";

    fn kill(secs: u64, player: &str, target_vehicle: &str) -> Event {
        Event {
            at: Duration::from_secs(secs),
            player: Player::new(player).with_squad("=WTR="),
            target_player: Player::new("Bandit"),
            vehicle: Vehicle::new("P-47D"),
            target_vehicle: Vehicle::new(target_vehicle),
            action: Action::Destroyed,
            achievement: None,
            action_text: "destroyed".into(),
            origin: String::new(),
        }
    }

    #[test]
    fn formats_battle_time() {
        assert_eq!(format_at(Duration::from_millis(62_045)), "01:02.045");
        assert_eq!(format_at(Duration::from_secs(3_725)), "62:05.000");
    }

    #[test]
    fn trophy_strip_shows_counts_above_one() {
        let mut tally = TrophyTally::new();
        assert_eq!(format_trophies(&tally), "no trophies yet");
        tally.record("Me262");
        tally.record("Me262");
        tally.record("A6M2");
        assert_eq!(format_trophies(&tally), "A6M2, Me262 x 2");
    }

    #[test]
    fn event_line_prefers_achievement_over_target() {
        let mut e = kill(62, ME, "Me262");
        let row = Classified {
            entry: e.clone(),
            local_actor: true,
        };
        assert_eq!(
            format_event(&row),
            "01:02.000 * =WTR= ZenAviator (P-47D) destroyed Me262 (Bandit)"
        );

        e.achievement = Some(Achievement {
            name: "Hero of the Sky".into(),
        });
        let row = Classified {
            entry: e,
            local_actor: false,
        };
        assert!(format_event(&row).ends_with("destroyed Hero of the Sky"));
    }

    #[test]
    fn chat_line_uppercases_mode() {
        let row = Classified {
            entry: ChatMessage {
                at: Duration::from_secs(5),
                mode: "team".into(),
                sender: "Wingman".into(),
                msg: "on me".into(),
            },
            local_actor: false,
        };
        assert_eq!(format_chat(&row), "00:05.000   [TEAM] Wingman: on me");
    }

    #[test]
    fn battle_text_shows_newest_entry_and_tally() {
        let mut r: StreamReconciler<Event> = StreamReconciler::new(Arc::new(ME));
        r.consume(kill(10, ME, "Me262"));
        r.consume(kill(11, "Ace", "Yak-3"));
        let text = render_battle_log_text(&r.snapshot());
        assert!(text.starts_with("[battle_log s1 v2] team=1 personal=1 trophies: Me262"));
        assert!(text.contains("team     00:11.000"));
    }

    #[test]
    fn battle_text_on_tied_timestamps_shows_last_arrival() {
        let mut r: StreamReconciler<Event> = StreamReconciler::new(Arc::new(ME));
        r.consume(kill(10, ME, "Me262"));
        r.consume(kill(10, "Ace", "Yak-3"));
        let text = render_battle_log_text(&r.snapshot());
        assert!(text.contains("team     00:10.000   =WTR= Ace (P-47D) destroyed Yak-3"), "{text}");
    }

    #[test]
    fn empty_chat_has_placeholder() {
        let text = render_chat_text(&Snapshot::empty(FeedKind::Chat));
        assert!(text.ends_with("no chat yet"));
    }

    #[test]
    fn json_frame_flattens_snapshot() {
        let mut r: StreamReconciler<Event> = StreamReconciler::new(Arc::new(ME));
        r.consume(kill(10, ME, "Me262"));
        let json: serde_json::Value = serde_json::from_str(&render_json(&r.snapshot()).unwrap()).unwrap();
        assert_eq!(json["feed"], "battle_log");
        assert_eq!(json["trophies"]["Me262"], 1);
        assert!(json["rendered_at"].as_str().is_some());
    }

    #[tokio::test]
    async fn writes_one_frame_per_notification() {
        let mut r: StreamReconciler<Event> = StreamReconciler::new(Arc::new(ME));
        let (_battle_tx, battle_rx) = watch::channel(r.consume(kill(10, ME, "Me262")).snapshot);
        let (_chat_tx, chat_rx) = watch::channel(Arc::new(Snapshot::<ChatMessage>::empty(FeedKind::Chat)));
        let (tx, rx) = broadcast::channel(8);

        for feed in [FeedKind::BattleLog, FeedKind::Chat] {
            tx.send(RedrawNotification {
                feed,
                session: 1,
                version: 1,
            })
            .unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let frames = run_presenter(
            rx,
            battle_rx,
            chat_rx,
            OutputFormat::Text,
            None,
            &mut out,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(frames, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[battle_log s1 v1]"));
        assert!(text.contains("[chat s0 v0]"));
    }

    #[tokio::test]
    async fn feed_filter_skips_other_feeds() {
        let (_battle_tx, battle_rx) = watch::channel(Arc::new(Snapshot::<Event>::empty(FeedKind::BattleLog)));
        let (_chat_tx, chat_rx) = watch::channel(Arc::new(Snapshot::<ChatMessage>::empty(FeedKind::Chat)));
        let (tx, rx) = broadcast::channel(8);
        for feed in [FeedKind::Chat, FeedKind::BattleLog, FeedKind::Chat] {
            tx.send(RedrawNotification {
                feed,
                session: 0,
                version: 0,
            })
            .unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let frames = run_presenter(
            rx,
            battle_rx,
            chat_rx,
            OutputFormat::Text,
            Some(FeedKind::Chat),
            &mut out,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(frames, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("[battle_log"));
        assert_eq!(text.matches("[chat s0 v0]").count(), 2);
    }
}
