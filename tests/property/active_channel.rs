//! Property-based tests for the active channel under roster pushes.
//!
//! Uses proptest to verify, over random interleavings of `historial`,
//! `comando` and `mensaje` frames whose `lista` often leaves out the
//! active channel:
//! 1. The active channel is always the one named by the last `historial`.
//! 2. The active channel stays in the roster after every frame.

#![allow(clippy::unwrap_used)]

use chatsync::dispatch::Dispatcher;
use chatsync::render::RenderEvent;
use chatsync::session::Session;
use chatsync_proto::channel::ChannelId;
use chatsync_proto::identity::Identity;
use proptest::prelude::*;
use serde_json::{Value, json};

const POOL: usize = 5;
const COMMANDS: [&str; 3] = ["/crear", "/crear_priv", "/salir"];

#[derive(Debug, Clone)]
enum Step {
    History(usize),
    Command { command: &'static str, list: u8, omit_active: bool },
    Chat { channel: usize, list: u8, omit_active: bool },
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..POOL).prop_map(Step::History),
        (prop::sample::select(COMMANDS.to_vec()), any::<u8>(), any::<bool>()).prop_map(
            |(command, list, omit_active)| Step::Command {
                command,
                list,
                omit_active,
            }
        ),
        (0..POOL, any::<u8>(), any::<bool>()).prop_map(|(channel, list, omit_active)| {
            Step::Chat {
                channel,
                list,
                omit_active,
            }
        }),
    ]
}

fn chan(index: usize) -> Value {
    json!({ "_id": format!("c{index}"), "nombre": format!("canal{index}"), "publico": true })
}

/// The channels picked by `mask`, minus the active one when asked.
fn roster(mask: u8, active: Option<usize>, omit_active: bool) -> Value {
    let list = (0..POOL)
        .filter(|i| mask & (1 << i) != 0)
        .filter(|i| !(omit_active && Some(*i) == active))
        .map(chan)
        .collect();
    Value::Array(list)
}

proptest! {
    #[test]
    fn last_history_decides_active_channel(steps in prop::collection::vec(arb_step(), 1..40)) {
        let mut session = Session::new(Identity::new("u1"), 50);
        let mut dispatcher = Dispatcher::new();
        let mut events: Vec<RenderEvent> = Vec::new();
        let mut expected: Option<usize> = None;

        for step in steps {
            let frame = match step {
                Step::History(index) => {
                    expected = Some(index);
                    json!({ "tipo": "historial", "canal": chan(index), "mensajes": [] })
                }
                Step::Command { command, list, omit_active } => json!({
                    "tipo": "comando",
                    "comando": command,
                    "resultado": { "exito": true, "mensaje": "ok" },
                    "lista": roster(list, expected, omit_active),
                }),
                Step::Chat { channel, list, omit_active } => json!({
                    "tipo": "mensaje",
                    "usuario": "Luis",
                    "contenido": "hola",
                    "canal": chan(channel),
                    "lista": roster(list, expected, omit_active),
                }),
            };
            dispatcher.dispatch(&frame.to_string(), &mut session, &mut events);

            let want = expected.map(|i| ChannelId::new(format!("c{i}")));
            prop_assert_eq!(session.active_id(), want.as_ref());
            if let Some(id) = &want {
                prop_assert!(session.roster().iter().any(|c| &c.id == id));
            }
        }
        prop_assert_eq!(dispatcher.stats().malformed, 0);
    }
}
