//! Decoded transaction messages.
//!
//! The set of message kinds the indexer understands is closed; anything else
//! decodes to [`Msg::Unknown`] and is carried through without events.

use serde::{Deserialize, Serialize};

/// `bank.MsgSend`: a single value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSend {
    pub from_address: String,
    pub to_address: String,
    /// Coins in their string form, e.g. `"1000000ugnot"`.
    pub amount: String,
}

/// One side of a multi-send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSendIo {
    pub address: String,
    pub coins: String,
}

/// `bank.MsgMultiSend`: transfers between several inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMultiSend {
    pub inputs: Vec<MultiSendIo>,
    pub outputs: Vec<MultiSendIo>,
}

impl MsgMultiSend {
    /// The first signer, i.e. the address of the first input.
    pub fn signer(&self) -> &str {
        self.inputs.first().map(|i| i.address.as_str()).unwrap_or_default()
    }
}

/// `vm.m_addpkg`: publish a package or realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgAddPackage {
    pub creator: String,
    pub package_path: String,
    pub deposit: String,
}

/// `vm.m_call`: call an exported realm function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCall {
    pub caller: String,
    pub send: String,
    pub pkg_path: String,
    pub func: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Send(MsgSend),
    MultiSend(MsgMultiSend),
    AddPackage(MsgAddPackage),
    Call(MsgCall),
    /// A kind this indexer has no handler for, keyed by its type URL.
    Unknown(String),
}

impl Msg {
    /// The amino type URL of this message kind.
    pub fn type_url(&self) -> &str {
        match self {
            Self::Send(_) => "/bank.MsgSend",
            Self::MultiSend(_) => "/bank.MsgMultiSend",
            Self::AddPackage(_) => "/vm.m_addpkg",
            Self::Call(_) => "/vm.m_call",
            Self::Unknown(url) => url,
        }
    }
}
