// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc
)]

//! End-to-end session behaviour through the engine over a loopback
//! transport: frame ordering, roster reconciliation, history states,
//! self attribution and the no-queue rule for sends.

use std::time::Duration;

use chatsync::api::{ApiError, ConfigLookup, WsConfig};
use chatsync::engine::{Engine, EngineConfig, EngineHandle, Snapshot, SubmitError};
use chatsync::render::{NoticeKind, RenderEvent};
use chatsync::session::{HistoryView, Session};
use chatsync::supervisor::ConnectionState;
use chatsync::transport::loopback::{LoopbackConnector, LoopbackServer};
use chatsync_proto::channel::{Channel, ChannelId};
use chatsync_proto::identity::Identity;
use serde_json::json;
use tokio::sync::mpsc;
use url::Url;

// =============================================================================
// Harness
// =============================================================================

/// Lookup that always publishes port 5001 without TLS.
struct FixedLookup;

impl ConfigLookup for FixedLookup {
    async fn ws_config(&self) -> Result<WsConfig, ApiError> {
        Ok(WsConfig {
            ssl_enabled: false,
            ws_port: 5001,
        })
    }
}

struct Harness {
    handle: EngineHandle,
    server: LoopbackServer,
    renders: mpsc::UnboundedReceiver<RenderEvent>,
}

fn start_with(session: Session, refuse: bool) -> Harness {
    let (connector, server) = LoopbackConnector::create();
    server.refuse_connections(refuse);
    let (tx, renders) = mpsc::unbounded_channel();
    let config = EngineConfig::new(Url::parse("http://chat.test:5000/").unwrap());
    let handle = Engine::start(config, session, connector, FixedLookup, tx).unwrap();
    Harness {
        handle,
        server,
        renders,
    }
}

fn ana() -> Session {
    Session::new(Identity::new("u1").with_federated_id("g-1"), 100).with_profile_name("Ana")
}

async fn open(session: Session) -> Harness {
    let mut h = start_with(session, false);
    wait_for(&mut h.renders, |e| {
        *e == RenderEvent::Connection(ConnectionState::Open)
    })
    .await;
    h
}

/// Drain renders until one matches, returning everything seen before it.
async fn wait_for(
    renders: &mut mpsc::UnboundedReceiver<RenderEvent>,
    mut want: impl FnMut(&RenderEvent) -> bool,
) -> Vec<RenderEvent> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), renders.recv())
            .await
            .expect("timed out waiting for render")
            .expect("render channel closed");
        if want(&event) {
            return seen;
        }
        seen.push(event);
    }
}

fn chan(id: &str, name: &str) -> serde_json::Value {
    json!({ "_id": id, "nombre": name, "publico": true, "admins": ["u1"], "miembros": ["u1"] })
}

fn history(id: &str, name: &str, messages: serde_json::Value) -> String {
    json!({
        "tipo": "historial",
        "comando": "/unir",
        "contenido": format!("Te uniste al canal {name}"),
        "canal": chan(id, name),
        "mensajes": messages,
    })
    .to_string()
}

// =============================================================================
// Connection bootstrap
// =============================================================================

#[tokio::test]
async fn identity_is_announced_before_anything_else() {
    let h = open(ana()).await;
    h.handle.submit("hola").await.unwrap();

    let written = h.server.written();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0], r#"{"usuario_id":"u1","google_id":"g-1"}"#);
    let sent: serde_json::Value = serde_json::from_str(&written[1]).unwrap();
    assert_eq!(sent["tipo"], "mensaje");
    assert_eq!(sent["contenido"], "hola");
    assert_eq!(sent["usuario_id"], "u1");
    assert_eq!(
        h.server.connect_urls()[0].as_str(),
        "ws://chat.test:5001/"
    );
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn seeded_roster_is_rendered_first() {
    let mut session = ana();
    session.reconcile_roster(vec![Channel::new("c1", "general")]);
    let mut h = start_with(session, false);

    let first = tokio::time::timeout(Duration::from_secs(5), h.renders.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, RenderEvent::Roster(ref r) if r.len() == 1));
    h.handle.stop().await.unwrap();
}

// =============================================================================
// Ordering and reconciliation
// =============================================================================

#[tokio::test]
async fn frames_apply_in_arrival_order() {
    let mut h = open(ana()).await;

    h.server
        .push(history("c1", "rust", json!([{"nombre": "Luis", "contenido": "uno"}])))
        .await;
    h.server
        .push(
            json!({
                "tipo": "mensaje",
                "usuario": "Bea",
                "contenido": "dos",
                "canal": chan("c1", "rust"),
                "lista": [chan("c1", "rust")],
            })
            .to_string(),
        )
        .await;
    h.server
        .push(
            json!({
                "tipo": "mensaje",
                "usuario": "Luis",
                "contenido": "tres",
                "canal": chan("c1", "rust"),
                "lista": [chan("c1", "rust")],
            })
            .to_string(),
        )
        .await;

    let snapshot = h.handle.snapshot().await.unwrap();
    let bodies: Vec<_> = snapshot
        .session
        .history()
        .messages()
        .map(|m| m.body.as_str())
        .collect();
    assert_eq!(bodies, ["uno", "dos", "tres"]);
    assert_eq!(snapshot.stats.applied, 3);

    let seen = wait_for(&mut h.renders, |e| {
        matches!(e, RenderEvent::MessageAppended(m) if m.message.body == "tres")
    })
    .await;
    assert!(seen.iter().any(|e| matches!(
        e,
        RenderEvent::MessageAppended(m) if m.message.body == "dos"
    )));
    h.handle.stop().await.unwrap();
}

fn roster_ids(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .session
        .roster()
        .iter()
        .map(|c| c.id.as_str().to_string())
        .collect()
}

#[tokio::test]
async fn active_channel_survives_roster_pushes_that_omit_it() {
    let h = open(ana()).await;

    h.server.push(history("c1", "rust", json!([]))).await;
    // A broadcast from "go" carries the sender's roster, which lacks "rust".
    h.server
        .push(
            json!({
                "tipo": "mensaje",
                "usuario": "Luis",
                "contenido": "hola desde go",
                "canal": chan("c2", "go"),
                "lista": [chan("c2", "go")],
            })
            .to_string(),
        )
        .await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.active_id(), Some(&ChannelId::new("c1")));
    assert_eq!(roster_ids(&snapshot), ["c2", "c1"]);

    h.server
        .push(
            json!({
                "tipo": "comando",
                "comando": "/crear",
                "resultado": {"exito": true, "mensaje": "Canal 'go' creado"},
                "lista": [chan("c1", "rust"), chan("c2", "go")],
            })
            .to_string(),
        )
        .await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.active_id(), Some(&ChannelId::new("c1")));
    assert_eq!(roster_ids(&snapshot), ["c1", "c2"]);

    h.server
        .push(
            json!({
                "tipo": "comando",
                "comando": "/salir",
                "resultado": {"exito": true, "mensaje": "Regresaste al canal general."},
                "lista": [chan("c2", "go")],
            })
            .to_string(),
        )
        .await;
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.active_id(), Some(&ChannelId::new("c1")));
    assert!(roster_ids(&snapshot).contains(&"c1".to_string()));
    assert_eq!(snapshot.session.history(), &HistoryView::NotLoaded);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn repeated_roster_push_is_idempotent() {
    let h = open(ana()).await;
    let frame = json!({
        "tipo": "comando",
        "comando": "/crear",
        "resultado": {"exito": true, "mensaje": "ok"},
        "lista": [chan("c1", "rust"), chan("c1", "rust"), chan("c2", "go")],
    })
    .to_string();

    h.server.push(frame.clone()).await;
    let first = h.handle.snapshot().await.unwrap();
    h.server.push(frame).await;
    let second = h.handle.snapshot().await.unwrap();

    assert_eq!(first.session.roster().len(), 2);
    assert_eq!(first.session.roster(), second.session.roster());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn last_history_frame_decides_active_channel() {
    let h = open(ana()).await;
    let chat_in = |id: &str, name: &str, body: &str| {
        json!({
            "tipo": "mensaje",
            "usuario": "Luis",
            "contenido": body,
            "canal": chan(id, name),
            "lista": [chan("c1", "rust"), chan("c2", "go"), chan("c3", "zig")],
        })
        .to_string()
    };

    h.server.push(history("c1", "rust", json!([]))).await;
    h.server.push(chat_in("c2", "go", "a")).await;
    h.server.push(history("c2", "go", json!([]))).await;
    h.server.push(chat_in("c3", "zig", "b")).await;
    h.server
        .push(
            json!({
                "tipo": "comando",
                "comando": "/crear",
                "resultado": {"exito": true, "mensaje": "Canal 'zig' creado"},
                "lista": [chan("c1", "rust"), chan("c2", "go"), chan("c3", "zig")],
            })
            .to_string(),
        )
        .await;
    h.server.push(chat_in("c1", "rust", "c")).await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.active_id(), Some(&ChannelId::new("c2")));
    assert_eq!(snapshot.session.history(), &HistoryView::Empty);
    assert_eq!(snapshot.session.roster().len(), 3);
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn message_for_another_channel_is_not_shown() {
    let h = open(ana()).await;
    h.server.push(history("c1", "rust", json!([]))).await;
    h.server
        .push(
            json!({
                "tipo": "mensaje",
                "usuario": "Luis",
                "contenido": "en go",
                "canal": chan("c2", "go"),
                "lista": [chan("c1", "rust"), chan("c2", "go")],
            })
            .to_string(),
        )
        .await;

    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.history(), &HistoryView::Empty);
    assert_eq!(snapshot.session.roster().len(), 2);
    h.handle.stop().await.unwrap();
}

// =============================================================================
// History states
// =============================================================================

#[tokio::test]
async fn empty_history_is_distinct_from_not_loaded() {
    let mut h = open(ana()).await;

    let before = h.handle.snapshot().await.unwrap();
    assert_eq!(before.session.history(), &HistoryView::NotLoaded);

    h.server.push(history("c1", "rust", json!([]))).await;
    let seen = wait_for(&mut h.renders, |e| *e == RenderEvent::HistoryEmpty).await;
    assert!(seen.contains(&RenderEvent::Notice {
        kind: NoticeKind::System,
        text: "Te uniste al canal rust".into(),
    }));

    let after = h.handle.snapshot().await.unwrap();
    assert_eq!(after.session.history(), &HistoryView::Empty);
    h.handle.stop().await.unwrap();
}

// =============================================================================
// Self attribution
// =============================================================================

#[tokio::test]
async fn own_messages_are_attributed_by_id_then_name() {
    let mut h = open(ana()).await;
    h.server
        .push(history(
            "c1",
            "rust",
            json!([
                {"nombre": "Someone", "usuario_id": "u1", "contenido": "by id"},
                {"nombre": " ANA ", "contenido": "by name"},
                {"nombre": "Luis", "contenido": "other"},
            ]),
        ))
        .await;

    let mut shown = None;
    wait_for(&mut h.renders, |e| {
        if let RenderEvent::HistoryReplaced(messages) = e {
            shown = Some(messages.iter().map(|m| m.own).collect::<Vec<_>>());
            true
        } else {
            false
        }
    })
    .await;
    assert_eq!(shown.unwrap(), [true, true, false]);
    h.handle.stop().await.unwrap();
}

// =============================================================================
// Sends while not connected
// =============================================================================

#[tokio::test]
async fn submit_while_disconnected_writes_nothing() {
    let mut h = start_with(ana(), true);
    wait_for(&mut h.renders, |e| {
        *e == RenderEvent::Connection(ConnectionState::Disconnected)
    })
    .await;

    let err = h.handle.submit("hola").await.unwrap_err();
    assert!(err.is_not_connected());
    assert!(h.server.written().is_empty());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn join_while_disconnected_leaves_active_channel() {
    let mut session = ana();
    session.reconcile_roster(vec![Channel::new("c1", "rust"), Channel::new("c2", "go")]);
    session.set_active_channel(Channel::new("c1", "rust"));
    let mut h = start_with(session, true);
    wait_for(&mut h.renders, |e| {
        *e == RenderEvent::Connection(ConnectionState::Disconnected)
    })
    .await;

    let err = h.handle.join(ChannelId::new("c2")).await.unwrap_err();
    assert!(err.is_not_connected());
    let snapshot = h.handle.snapshot().await.unwrap();
    assert_eq!(snapshot.session.active_id(), Some(&ChannelId::new("c1")));
    assert!(h.server.written().is_empty());
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn join_sets_active_then_sends_join_command() {
    let mut session = ana();
    session.reconcile_roster(vec![Channel::new("c1", "rust"), Channel::new("c2", "go")]);
    let mut h = start_with(session, false);
    wait_for(&mut h.renders, |e| {
        *e == RenderEvent::Connection(ConnectionState::Open)
    })
    .await;

    h.handle.join(ChannelId::new("c2")).await.unwrap();
    wait_for(&mut h.renders, |e| {
        matches!(e, RenderEvent::ActiveChannel(c) if c.name == "go")
    })
    .await;

    let sent: serde_json::Value = serde_json::from_str(&h.server.written()[1]).unwrap();
    assert_eq!(sent["tipo"], "comando");
    assert_eq!(sent["contenido"], "/unir go");

    assert!(matches!(
        h.handle.join(ChannelId::new("zz")).await,
        Err(SubmitError::UnknownChannel(_))
    ));
    h.handle.stop().await.unwrap();
}

#[tokio::test]
async fn rejection_and_presence_become_notices() {
    let mut h = open(ana()).await;
    h.server
        .push(r#"{"tipo":"usuario_conectado","usuario":"Bea"}"#)
        .await;
    h.server
        .push(r#"{"tipo":"error","mensaje":"No existe ese canal"}"#)
        .await;

    let seen = wait_for(&mut h.renders, |e| {
        matches!(e, RenderEvent::Notice { kind: NoticeKind::Rejection, .. })
    })
    .await;
    assert!(seen.iter().any(|e| matches!(
        e,
        RenderEvent::Notice { kind: NoticeKind::Presence, text } if text.contains("Bea")
    )));
    h.handle.stop().await.unwrap();
}
