//! Event derivation: maps decoded messages to structured events.
//!
//! Every known message kind yields a `message` event (`module`, `action`,
//! `sender`) followed by kind-specific events. Attribute order is fixed per
//! kind; consumers of the event stream rely on positions.

use crate::msg::{Msg, MsgAddPackage, MsgCall, MsgMultiSend, MsgSend};
use crate::types::{Event, EventAttribute};

/// Derive the events for a single message. Unknown kinds yield nothing.
pub fn derive_events(msg: &Msg) -> Vec<Event> {
    match msg {
        Msg::Send(m) => send_events(m),
        Msg::MultiSend(m) => multi_send_events(m),
        Msg::AddPackage(m) => add_package_events(m),
        Msg::Call(m) => call_events(m),
        Msg::Unknown(type_url) => {
            tracing::trace!(%type_url, "no event handler for message kind");
            Vec::new()
        }
    }
}

/// Derive the events for all messages of a transaction, in message order.
pub fn derive_tx_events(msgs: &[Msg]) -> Vec<Event> {
    msgs.iter().flat_map(derive_events).collect()
}

fn send_events(msg: &MsgSend) -> Vec<Event> {
    vec![
        Event::new(
            "message",
            vec![
                EventAttribute::indexed("module", "bank"),
                EventAttribute::indexed("action", "transfer"),
                EventAttribute::indexed("sender", &msg.from_address),
            ],
        ),
        Event::new(
            "transfer",
            vec![
                EventAttribute::indexed("from", &msg.from_address),
                EventAttribute::indexed("to", &msg.to_address),
                EventAttribute::plain("amount", &msg.amount),
            ],
        ),
    ]
}

fn multi_send_events(msg: &MsgMultiSend) -> Vec<Event> {
    vec![Event::new(
        "message",
        vec![
            EventAttribute::plain("module", "bank"),
            EventAttribute::plain("action", "multi_send"),
            EventAttribute::plain("sender", msg.signer()),
        ],
    )]
}

fn add_package_events(msg: &MsgAddPackage) -> Vec<Event> {
    vec![
        Event::new(
            "message",
            vec![
                EventAttribute::plain("module", "vm"),
                EventAttribute::plain("action", "package"),
                EventAttribute::plain("sender", &msg.creator),
            ],
        ),
        Event::new(
            "package",
            vec![
                EventAttribute::plain("creator", &msg.creator),
                EventAttribute::plain("path", &msg.package_path),
                EventAttribute::plain("deposit", &msg.deposit),
            ],
        ),
    ]
}

fn call_events(msg: &MsgCall) -> Vec<Event> {
    vec![
        Event::new(
            "message",
            vec![
                EventAttribute::indexed("module", "vm"),
                EventAttribute::indexed("action", "call"),
                EventAttribute::indexed("sender", &msg.caller),
            ],
        ),
        Event::new(
            "package",
            vec![
                EventAttribute::indexed("caller", &msg.caller),
                EventAttribute::indexed("package", &msg.pkg_path),
                EventAttribute::indexed("func", &msg.func),
                EventAttribute::plain("send", &msg.send),
            ],
        ),
    ]
}
