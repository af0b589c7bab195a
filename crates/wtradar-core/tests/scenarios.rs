//! End-to-end reconciliation scenarios through the public API, fed from
//! JSON records shaped like the telemetry source's output.

use std::sync::Arc;

use wtradar_core::{
    Audience, ChatMessage, Event, FeedKind, PlayerIdentity, StreamReconciler, Transition,
};

const ME: &str = "ZenAviator";

fn identity() -> Arc<dyn PlayerIdentity> {
    Arc::new(ME)
}

fn event(json: &str) -> Event {
    serde_json::from_str(json).unwrap_or_else(|e| panic!("bad event fixture {json}: {e}"))
}

fn chat(json: &str) -> ChatMessage {
    serde_json::from_str(json).unwrap_or_else(|e| panic!("bad chat fixture {json}: {e}"))
}

#[test]
fn battle_then_new_battle() {
    let mut log: StreamReconciler<Event> = StreamReconciler::new(identity());

    let lines = [
        r#"{"at_ms": 62000, "player": {"name": "ZenAviator", "squad": "=WTR="}, "target_player": {"name": "Bandit"}, "vehicle": {"name": "P-80A"}, "target_vehicle": {"name": "Me262"}, "action": "destroyed", "action_text": "destroyed"}"#,
        r#"{"at_ms": 64000, "player": {"name": "Ace"}, "target_player": {"name": "Bandit2"}, "target_vehicle": {"name": "Ar 234"}, "action": "shot_down", "action_text": "shot down"}"#,
        r#"{"at_ms": 70000, "player": {"name": "ZenAviator"}, "target_player": {"name": "Bandit3"}, "target_vehicle": {"name": "Me262"}, "action": "destroyed", "action_text": "destroyed"}"#,
    ];
    for line in lines {
        log.consume(event(line));
    }

    let snap = log.snapshot();
    assert_eq!(snap.session, 1);
    assert_eq!(snap.partition(Audience::Personal).len(), 2);
    assert_eq!(snap.partition(Audience::TeamWide).len(), 1);
    assert_eq!(snap.trophies.get("Me262"), 2);
    assert_eq!(snap.trophies.get("Ar 234"), 0);

    let out = log.consume(event(
        r#"{"at_ms": 1500, "player": {"name": "Ace"}, "action": "achieved", "achievement": {"name": "Rescuer"}}"#,
    ));
    assert_eq!(out.transition, Transition::Rollover);
    assert_eq!(out.snapshot.session, 2);
    assert_eq!(out.snapshot.len(), 1);
    assert!(out.snapshot.trophies.is_empty());

    // The pre-rollover snapshot is untouched.
    assert_eq!(snap.len(), 3);
    assert_eq!(snap.trophies.get("Me262"), 2);
}

#[test]
fn feeds_reset_independently() {
    let mut log: StreamReconciler<Event> = StreamReconciler::new(identity());
    let mut talk: StreamReconciler<ChatMessage> = StreamReconciler::new(identity());

    talk.consume(chat(r#"{"at_ms": 5000, "mode": "team", "sender": "Wingman", "msg": "push B"}"#));
    log.consume(event(r#"{"at_ms": 10000, "player": {"name": "Ace"}}"#));
    talk.consume(chat(r#"{"at_ms": 9000, "mode": "all", "sender": "ZenAviator", "msg": "gl hf"}"#));
    log.consume(event(r#"{"at_ms": 20000, "player": {"name": "Ace"}}"#));
    let reset = log.consume(event(r#"{"at_ms": 5000, "player": {"name": "Ace"}}"#));

    assert_eq!(reset.transition, Transition::Rollover);
    assert_eq!(log.snapshot().len(), 1);

    let chat_snap = talk.snapshot();
    assert_eq!(chat_snap.feed, FeedKind::Chat);
    assert_eq!(chat_snap.session, 1);
    assert_eq!(chat_snap.team.len(), 2);
    assert!(!chat_snap.team[0].local_actor);
    assert!(chat_snap.team[1].local_actor);
}

#[test]
fn snapshot_serializes_for_presentation() {
    let mut log: StreamReconciler<Event> = StreamReconciler::new(identity());
    log.consume(event(
        r#"{"at_ms": 62000, "player": {"name": "ZenAviator"}, "target_vehicle": {"name": "Me262"}, "action": "destroyed"}"#,
    ));

    let json = serde_json::to_value(&*log.snapshot()).unwrap();
    assert_eq!(json["feed"], "battle_log");
    assert_eq!(json["session"], 1);
    assert_eq!(json["trophies"]["Me262"], 1);
    assert_eq!(json["personal"][0]["entry"]["at_ms"], 62000);
    assert_eq!(json["personal"][0]["local_actor"], true);
    assert_eq!(json["last"], "personal");
    assert_eq!(json["team"].as_array().map(Vec::len), Some(0));
}
