//! Text codec for Engine.IO v4 packets carrying Socket.IO v5 packets.
//!
//! Every WebSocket text frame is one Engine.IO packet: a single type digit
//! followed by an optional payload. Engine.IO `MESSAGE` packets wrap a
//! Socket.IO packet, laid out as
//! `<type>[<attachments>-][<namespace>,][<ack id>][<json>]`.
//!
//! Binary attachments are decoded far enough to be skipped but are never
//! produced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connections::errors::ConnectionError;

/// Handshake data sent by the server in the Engine.IO `OPEN` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(OpenInfo),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketKind {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => PacketKind::Connect,
            '1' => PacketKind::Disconnect,
            '2' => PacketKind::Event,
            '3' => PacketKind::Ack,
            '4' => PacketKind::ConnectError,
            '5' => PacketKind::BinaryEvent,
            '6' => PacketKind::BinaryAck,
            _ => return None,
        })
    }

    fn digit(self) -> char {
        match self {
            PacketKind::Connect => '0',
            PacketKind::Disconnect => '1',
            PacketKind::Event => '2',
            PacketKind::Ack => '3',
            PacketKind::ConnectError => '4',
            PacketKind::BinaryEvent => '5',
            PacketKind::BinaryAck => '6',
        }
    }

    fn is_binary(self) -> bool {
        matches!(self, PacketKind::BinaryEvent | PacketKind::BinaryAck)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    pub kind: PacketKind,
    pub namespace: String,
    pub ack_id: Option<u64>,
    pub data: Option<Value>,
}

impl SocketPacket {
    fn on_default_namespace(kind: PacketKind, data: Option<Value>) -> Self {
        Self {
            kind,
            namespace: "/".to_string(),
            ack_id: None,
            data,
        }
    }

    /// Namespace CONNECT carrying the `auth` object.
    pub fn connect(auth: Value) -> Self {
        Self::on_default_namespace(PacketKind::Connect, Some(auth))
    }

    /// Moves the packet to `namespace` (`"/"` is the default one).
    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn disconnect() -> Self {
        Self::on_default_namespace(PacketKind::Disconnect, None)
    }

    /// `EVENT` packet with a single argument.
    pub fn event(name: &str, payload: Value) -> Self {
        Self::on_default_namespace(
            PacketKind::Event,
            Some(Value::Array(vec![Value::String(name.to_string()), payload])),
        )
    }

    /// For `EVENT` packets: the event name and its first argument.
    pub fn event_parts(&self) -> Option<(String, Value)> {
        if self.kind != PacketKind::Event {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?.to_string();
        let payload = args.get(1).cloned().unwrap_or(Value::Null);
        Some((name, payload))
    }

    /// For `CONNECT_ERROR` packets: the `message` field, or the raw string.
    pub fn error_message(&self) -> Option<String> {
        match self.data.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.digit());
        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }
        if let Some(id) = self.ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(data) = &self.data {
            out.push_str(&data.to_string());
        }
        out
    }

    fn decode(text: &str) -> Result<Self, ConnectionError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(PacketKind::from_digit)
            .ok_or_else(|| protocol(format!("bad socket packet type in {text:?}")))?;
        let mut rest = chars.as_str();

        if kind.is_binary() {
            let dash = rest
                .find('-')
                .ok_or_else(|| protocol("binary packet without attachment count".into()))?;
            rest = &rest[dash + 1..];
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(i) => {
                    let ns = &rest[..i];
                    rest = &rest[i + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            "/".to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse()
                    .map_err(|_| protocol(format!("bad ack id in {text:?}")))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(rest)
                    .map_err(|e| protocol(format!("bad packet payload: {e}")))?,
            )
        };

        Ok(Self {
            kind,
            namespace,
            ack_id,
            data,
        })
    }
}

impl EnginePacket {
    pub fn decode(text: &str) -> Result<Self, ConnectionError> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| protocol("empty engine packet".into()))?;
        let rest = chars.as_str();
        Ok(match kind {
            '0' => EnginePacket::Open(
                serde_json::from_str(rest)
                    .map_err(|e| protocol(format!("bad open packet: {e}")))?,
            ),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping,
            '3' => EnginePacket::Pong,
            '4' => EnginePacket::Message(SocketPacket::decode(rest)?),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(protocol(format!("unknown engine packet type {other:?}"))),
        })
    }

    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(info) => {
                // Serialising a struct of strings and integers cannot fail.
                format!("0{}", serde_json::to_string(info).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping => "2".to_string(),
            EnginePacket::Pong => "3".to_string(),
            EnginePacket::Message(packet) => format!("4{}", packet.encode()),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

fn protocol(msg: String) -> ConnectionError {
    ConnectionError::Protocol(msg)
}
