//! Transaction decoding: raw tx bytes to an ordered list of messages.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::msg::{Msg, MsgAddPackage, MsgCall, MsgMultiSend, MsgSend};

/// A transaction's bytes could not be parsed.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed tx: {0}")]
    Malformed(String),

    #[error("malformed {type_url} message: {reason}")]
    Message { type_url: String, reason: String },
}

/// Turns raw transaction bytes into the messages they carry.
pub trait TxDecoder: Send + Sync {
    fn decode(&self, tx: &[u8]) -> Result<Vec<Msg>, DecodeError>;
}

/// Decoder for amino-JSON encoded transactions:
///
/// ```json
/// {"msg": [{"@type": "/bank.MsgSend", "from_address": "g1…", "to_address": "g1…", "amount": "1ugnot"}],
///  "fee": {…}, "signatures": […], "memo": ""}
/// ```
#[derive(Debug, Default, Clone)]
pub struct JsonTxDecoder;

impl JsonTxDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Deserialize)]
struct RawTx {
    #[serde(default)]
    msg: Vec<Value>,
}

#[derive(Deserialize)]
struct RawPackage {
    path: String,
}

#[derive(Deserialize)]
struct RawAddPackage {
    creator: String,
    package: RawPackage,
    #[serde(default)]
    deposit: String,
}

impl TxDecoder for JsonTxDecoder {
    fn decode(&self, tx: &[u8]) -> Result<Vec<Msg>, DecodeError> {
        let raw: RawTx =
            serde_json::from_slice(tx).map_err(|e| DecodeError::Malformed(e.to_string()))?;
        raw.msg.into_iter().map(decode_msg).collect()
    }
}

fn decode_msg(value: Value) -> Result<Msg, DecodeError> {
    let type_url = value
        .get("@type")
        .and_then(Value::as_str)
        .ok_or_else(|| DecodeError::Malformed("message without @type".into()))?
        .to_string();

    let bad = |e: serde_json::Error| DecodeError::Message {
        type_url: type_url.clone(),
        reason: e.to_string(),
    };

    let msg = match type_url.as_str() {
        "/bank.MsgSend" => Msg::Send(serde_json::from_value::<MsgSend>(value).map_err(bad)?),
        "/bank.MsgMultiSend" => {
            Msg::MultiSend(serde_json::from_value::<MsgMultiSend>(value).map_err(bad)?)
        }
        "/vm.m_addpkg" => {
            let raw = serde_json::from_value::<RawAddPackage>(value).map_err(bad)?;
            Msg::AddPackage(MsgAddPackage {
                creator: raw.creator,
                package_path: raw.package.path,
                deposit: raw.deposit,
            })
        }
        "/vm.m_call" => Msg::Call(serde_json::from_value::<MsgCall>(value).map_err(bad)?),
        _ => Msg::Unknown(type_url.clone()),
    };
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(v: Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    #[test]
    fn decodes_known_kinds_in_order() {
        let tx = encode(json!({
            "msg": [
                {"@type": "/bank.MsgSend", "from_address": "g1a", "to_address": "g1b", "amount": "5ugnot"},
                {"@type": "/vm.m_call", "caller": "g1a", "send": "", "pkg_path": "gno.land/r/demo/foo", "func": "Bar", "args": ["x"]},
                {"@type": "/vm.m_addpkg", "creator": "g1a", "package": {"name": "foo", "path": "gno.land/r/demo/foo", "files": []}, "deposit": ""}
            ],
            "fee": {"gas_wanted": "2000000", "gas_fee": "1000000ugnot"},
            "memo": ""
        }));
        let msgs = JsonTxDecoder.decode(&tx).unwrap();
        assert_eq!(msgs.len(), 3);
        assert!(matches!(&msgs[0], Msg::Send(m) if m.amount == "5ugnot"));
        assert!(matches!(&msgs[1], Msg::Call(m) if m.func == "Bar" && m.args == ["x"]));
        assert!(matches!(&msgs[2], Msg::AddPackage(m) if m.package_path == "gno.land/r/demo/foo"));
    }

    #[test]
    fn unknown_type_is_carried_through() {
        let tx = encode(json!({"msg": [{"@type": "/auth.MsgNew", "foo": 1}]}));
        let msgs = JsonTxDecoder.decode(&tx).unwrap();
        assert_eq!(msgs, vec![Msg::Unknown("/auth.MsgNew".into())]);
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(matches!(
            JsonTxDecoder.decode(b"\x01\x02not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn known_kind_with_missing_fields_fails() {
        let tx = encode(json!({"msg": [{"@type": "/bank.MsgSend", "from_address": "g1a"}]}));
        assert!(matches!(JsonTxDecoder.decode(&tx), Err(DecodeError::Message { .. })));
    }
}
