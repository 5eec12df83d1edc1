//! Property-based tests for the envelope codec.
//!
//! Uses proptest to verify:
//! 1. Arbitrary text never makes `decode_inbound` panic.
//! 2. Any JSON object with an unknown `tipo` is reported as unrecognized,
//!    never as malformed.
//! 3. Channels survive the wire shape with id, name and visibility intact.
//! 4. Command classification depends only on the trimmed prefix.

use chatsync_proto::channel::{Channel, Visibility};
use chatsync_proto::codec::{self, FrameError};
use chatsync_proto::command;
use chatsync_proto::envelope::{Inbound, OutboundEnvelope, OutboundKind};
use chatsync_proto::identity::Identity;
use proptest::prelude::*;

const KNOWN_KINDS: [&str; 7] = [
    "mensaje",
    "historial",
    "comando",
    "bienvenida",
    "usuario_conectado",
    "usuario_desconectado",
    "error",
];

fn arb_channel() -> impl Strategy<Value = Channel> {
    ("[a-f0-9]{1,24}", "[^\x00]{1,32}", any::<bool>()).prop_map(|(id, name, public)| {
        let visibility = if public {
            Visibility::Public
        } else {
            Visibility::Private
        };
        Channel::new(id, name).with_visibility(visibility)
    })
}

proptest! {
    #[test]
    fn decode_never_panics(raw in ".{0,256}") {
        let _ = codec::decode_inbound(&raw);
    }

    #[test]
    fn decode_never_panics_on_known_kinds_with_junk(
        kind in prop::sample::select(KNOWN_KINDS.to_vec()),
        junk in prop::collection::hash_map("[a-z]{1,8}", any::<i64>(), 0..6),
    ) {
        let mut obj = serde_json::Map::new();
        obj.insert("tipo".into(), serde_json::Value::String(kind.to_string()));
        for (k, v) in junk {
            if k != "tipo" {
                obj.insert(k, serde_json::Value::from(v));
            }
        }
        let raw = serde_json::Value::Object(obj).to_string();
        if let Err(e) = codec::decode_inbound(&raw) {
            prop_assert!(e.is_malformed());
        }
    }

    #[test]
    fn unknown_kind_is_unrecognized(kind in "[a-z_]{1,16}") {
        prop_assume!(!KNOWN_KINDS.contains(&kind.as_str()));
        let raw = serde_json::json!({ "tipo": kind, "usuario": "x" }).to_string();
        let result = codec::decode_inbound(&raw);
        let is_unrecognized = matches!(result, Err(FrameError::UnrecognizedKind(ref k)) if *k == kind);
        prop_assert!(is_unrecognized);
    }

    #[test]
    fn channel_survives_wire_shape(ch in arb_channel()) {
        let json = serde_json::to_string(&ch).unwrap();
        let back: Channel = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, ch);
    }

    #[test]
    fn roster_in_chat_frame_keeps_order(channels in prop::collection::vec(arb_channel(), 0..8)) {
        let raw = serde_json::json!({
            "tipo": "mensaje",
            "usuario": "Ana",
            "contenido": "hola",
            "lista": channels,
        })
        .to_string();
        let Ok(Inbound::Chat(frame)) = codec::decode_inbound(&raw) else {
            return Err(TestCaseError::fail("expected chat frame"));
        };
        let ids: Vec<_> = frame.roster.iter().map(|c| c.id.clone()).collect();
        let expected: Vec<_> = channels.iter().map(|c| c.id.clone()).collect();
        prop_assert_eq!(ids, expected);
    }

    #[test]
    fn command_classification_ignores_surrounding_whitespace(
        lead in "[ \t]{0,4}",
        word in prop::sample::select(vec!["/crear", "/crear_priv", "/unir", "/salir", "/agregar", "/remover", "/dar_admin", "/quitar_admin"]),
        rest in "[a-z ]{0,16}",
    ) {
        let text = format!("{lead}{word}{rest}");
        prop_assert!(command::is_command(&text));
    }

    #[test]
    fn plain_text_is_never_a_command(text in "[a-zA-Z0-9][^\x00]{0,64}") {
        prop_assert!(!command::is_command(&text));
    }

    #[test]
    fn outbound_body_is_carried_verbatim(body in "[^\x00]{1,128}") {
        let env = OutboundEnvelope::new(
            OutboundKind::Message,
            &Identity::new("u1"),
            body.clone(),
            chrono::Utc::now(),
        );
        let text = codec::encode_outbound(&env).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(value["contenido"].as_str(), Some(body.as_str()));
    }
}
