//! Wire message types
//!
//! The event source is a socket.io server. Frames are Engine.IO text packets
//! (`<type><payload>`); Engine.IO `message` packets carry Socket.IO packets
//! (`<type>[/namespace,][ack id][json]`). State changes arrive as Socket.IO
//! events named `action` whose single argument is an `Action` object.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::models::Action;

/// Socket.IO event name carrying actions in both directions
pub const ACTION_EVENT: &str = "action";

/// Only actions with this type prefix are sent to the server
pub const SERVER_PREFIX: &str = "server/";

/// Default Socket.IO namespace
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO open handshake payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds
    pub ping_interval: u64,
    /// Milliseconds
    pub ping_timeout: u64,
}

impl Handshake {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    /// Raw Socket.IO packet text
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode a text frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyFrame)?;
        let payload = chars.as_str();

        Ok(match kind {
            '0' => EnginePacket::Open(serde_json::from_str(payload)?),
            '1' => EnginePacket::Close,
            '2' => EnginePacket::Ping(payload.to_string()),
            '3' => EnginePacket::Pong(payload.to_string()),
            '4' => EnginePacket::Message(payload.to_string()),
            '5' => EnginePacket::Upgrade,
            '6' => EnginePacket::Noop,
            other => return Err(ProtocolError::UnknownEnginePacket(other)),
        })
    }

    /// Encode to a text frame
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        id: Option<u64>,
        args: Vec<Value>,
    },
    /// `ERROR` in protocol v3, `CONNECT_ERROR` in v4
    Error {
        namespace: String,
        data: Option<Value>,
    },
}

impl SocketPacket {
    /// Build an `action` event for the default namespace
    pub fn action(action: &Action) -> Result<Self, ProtocolError> {
        Ok(SocketPacket::Event {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: None,
            name: ACTION_EVENT.to_string(),
            args: vec![serde_json::to_value(action)?],
        })
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::Error { namespace, .. } => namespace,
        }
    }

    /// Decode the payload of an Engine.IO message packet
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut chars = text.chars();
        let kind = chars.next().ok_or(ProtocolError::EmptyFrame)?;
        let rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(ProtocolError::BinaryUnsupported);
        }

        let (namespace, rest) = split_namespace(rest);
        let (id, payload) = split_ack_id(rest);
        let data: Option<Value> = if payload.is_empty() {
            None
        } else {
            Some(serde_json::from_str(payload)?)
        };

        Ok(match kind {
            '0' => SocketPacket::Connect { namespace, data },
            '1' => SocketPacket::Disconnect { namespace },
            '2' => {
                let mut args = match data {
                    Some(Value::Array(args)) => args,
                    _ => return Err(ProtocolError::MissingEventName),
                };
                let name = match args.first() {
                    Some(Value::String(name)) => name.clone(),
                    _ => return Err(ProtocolError::MissingEventName),
                };
                args.remove(0);
                SocketPacket::Event {
                    namespace,
                    id,
                    name,
                    args,
                }
            }
            '3' => SocketPacket::Ack {
                namespace,
                id,
                args: match data {
                    Some(Value::Array(args)) => args,
                    Some(other) => vec![other],
                    None => Vec::new(),
                },
            },
            '4' => SocketPacket::Error { namespace, data },
            other => return Err(ProtocolError::UnknownSocketPacket(other)),
        })
    }

    /// Encode to the text carried by an Engine.IO message packet
    pub fn encode(&self) -> String {
        let (kind, namespace, id, payload) = match self {
            SocketPacket::Connect { namespace, data } => ('0', namespace, None, data.clone()),
            SocketPacket::Disconnect { namespace } => ('1', namespace, None, None),
            SocketPacket::Event {
                namespace,
                id,
                name,
                args,
            } => {
                let mut all = Vec::with_capacity(args.len() + 1);
                all.push(Value::String(name.clone()));
                all.extend(args.iter().cloned());
                ('2', namespace, *id, Some(Value::Array(all)))
            }
            SocketPacket::Ack {
                namespace,
                id,
                args,
            } => ('3', namespace, *id, Some(Value::Array(args.clone()))),
            SocketPacket::Error { namespace, data } => ('4', namespace, None, data.clone()),
        };

        let mut out = String::new();
        out.push(kind);
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = id {
            out.push_str(&id.to_string());
        }
        if let Some(payload) = payload {
            out.push_str(&payload.to_string());
        }
        out
    }
}

/// What the connection adapter needs to know about one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Engine.IO session opened
    Open(Handshake),
    /// Server heartbeat; answer with a pong carrying the same data
    Ping(String),
    /// Answer to our heartbeat
    Pong,
    /// Socket.IO namespace joined
    Connected,
    /// Server dropped the namespace or the Engine.IO session
    Closed,
    /// Server rejected the namespace
    Error(Option<Value>),
    /// An action to dispatch
    Action(Action),
    /// Anything the adapter has no use for
    Ignored,
}

impl Inbound {
    /// Decode a text frame from the event source
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        Ok(match EnginePacket::decode(frame)? {
            EnginePacket::Open(handshake) => Inbound::Open(handshake),
            EnginePacket::Close => Inbound::Closed,
            EnginePacket::Ping(data) => Inbound::Ping(data),
            EnginePacket::Pong(_) => Inbound::Pong,
            EnginePacket::Upgrade | EnginePacket::Noop => Inbound::Ignored,
            EnginePacket::Message(text) => {
                let packet = SocketPacket::decode(&text)?;
                if packet.namespace() != DEFAULT_NAMESPACE {
                    return Ok(Inbound::Ignored);
                }
                match packet {
                    SocketPacket::Connect { .. } => Inbound::Connected,
                    SocketPacket::Disconnect { .. } => Inbound::Closed,
                    SocketPacket::Error { data, .. } => Inbound::Error(data),
                    SocketPacket::Event { name, args, .. } if name == ACTION_EVENT => {
                        let arg = args.into_iter().next().unwrap_or(Value::Null);
                        Inbound::Action(serde_json::from_value(arg)?)
                    }
                    SocketPacket::Event { .. } | SocketPacket::Ack { .. } => Inbound::Ignored,
                }
            }
        })
    }
}

/// Frames sent to the event source
pub struct Outbound;

impl Outbound {
    /// Join the default namespace
    pub fn connect() -> String {
        EnginePacket::Message(
            SocketPacket::Connect {
                namespace: DEFAULT_NAMESPACE.to_string(),
                data: None,
            }
            .encode(),
        )
        .encode()
    }

    /// Client heartbeat
    pub fn ping() -> String {
        EnginePacket::Ping(String::new()).encode()
    }

    /// Answer to a server heartbeat
    pub fn pong(data: &str) -> String {
        EnginePacket::Pong(data.to_string()).encode()
    }

    /// Close the Engine.IO session
    pub fn close() -> String {
        EnginePacket::Close.encode()
    }

    /// Emit an action as an `action` event
    pub fn action(action: &Action) -> Result<String, ProtocolError> {
        Ok(EnginePacket::Message(SocketPacket::action(action)?.encode()).encode())
    }
}

/// Whether an action belongs to the server namespace
pub fn is_server_action(action: &Action) -> bool {
    action.kind.starts_with(SERVER_PREFIX)
}

/// Split an optional `/namespace,` prefix
fn split_namespace(text: &str) -> (String, &str) {
    if !text.starts_with('/') {
        return (DEFAULT_NAMESPACE.to_string(), text);
    }
    match text.find(',') {
        Some(pos) => (text[..pos].to_string(), &text[pos + 1..]),
        None => (text.to_string(), ""),
    }
}

/// Split leading ack id digits
fn split_ack_id(text: &str) -> (Option<u64>, &str) {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if end == 0 {
        return (None, text);
    }
    (text[..end].parse().ok(), &text[end..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_open() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":5000}"#;
        match Inbound::decode(frame).unwrap() {
            Inbound::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.ping_interval(), Duration::from_secs(25));
                assert_eq!(handshake.ping_timeout(), Duration::from_secs(5));
            }
            other => panic!("Expected Open, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_heartbeat() {
        assert_eq!(Inbound::decode("2").unwrap(), Inbound::Ping(String::new()));
        assert_eq!(
            Inbound::decode("2beat").unwrap(),
            Inbound::Ping("beat".to_string())
        );
        assert_eq!(Inbound::decode("3").unwrap(), Inbound::Pong);
        assert_eq!(Inbound::decode("6").unwrap(), Inbound::Ignored);
    }

    #[test]
    fn test_decode_connect_and_close() {
        assert_eq!(Inbound::decode("40").unwrap(), Inbound::Connected);
        assert_eq!(
            Inbound::decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Inbound::Connected
        );
        assert_eq!(Inbound::decode("41").unwrap(), Inbound::Closed);
        assert_eq!(Inbound::decode("1").unwrap(), Inbound::Closed);
    }

    #[test]
    fn test_decode_action_event() {
        let frame = r#"42["action",{"type":"userCount","data":5}]"#;
        assert_eq!(
            Inbound::decode(frame).unwrap(),
            Inbound::Action(Action::with_data("userCount", json!(5)))
        );

        let frame = r#"42["action",{"type":"donationEnds"}]"#;
        assert_eq!(
            Inbound::decode(frame).unwrap(),
            Inbound::Action(Action::new("donationEnds"))
        );
    }

    #[test]
    fn test_decode_action_with_ack_id() {
        let frame = r#"4212["action",{"type":"userCount","data":1}]"#;
        let packet = SocketPacket::decode(&frame[1..]).unwrap();
        match packet {
            SocketPacket::Event { id, name, .. } => {
                assert_eq!(id, Some(12));
                assert_eq!(name, "action");
            }
            other => panic!("Expected Event, got {:?}", other),
        }
        assert!(matches!(
            Inbound::decode(frame).unwrap(),
            Inbound::Action(_)
        ));
    }

    #[test]
    fn test_other_namespace_and_events_ignored() {
        let frame = r#"42/admin,["action",{"type":"userCount","data":5}]"#;
        assert_eq!(Inbound::decode(frame).unwrap(), Inbound::Ignored);

        let frame = r#"42["chat","hello"]"#;
        assert_eq!(Inbound::decode(frame).unwrap(), Inbound::Ignored);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Inbound::decode(""),
            Err(ProtocolError::EmptyFrame)
        ));
        assert!(matches!(
            Inbound::decode("9"),
            Err(ProtocolError::UnknownEnginePacket('9'))
        ));
        assert!(matches!(
            Inbound::decode(r#"451-["action",{"_placeholder":true,"num":0}]"#),
            Err(ProtocolError::BinaryUnsupported)
        ));
        assert!(matches!(
            Inbound::decode("42{}"),
            Err(ProtocolError::MissingEventName)
        ));
        assert!(matches!(
            Inbound::decode("42[not json"),
            Err(ProtocolError::InvalidPayload(_))
        ));
        // An action without a type discriminator cannot be dispatched
        assert!(matches!(
            Inbound::decode(r#"42["action",{"data":1}]"#),
            Err(ProtocolError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_decode_connect_error() {
        let frame = r#"44{"message":"Invalid namespace"}"#;
        assert_eq!(
            Inbound::decode(frame).unwrap(),
            Inbound::Error(Some(json!({"message": "Invalid namespace"})))
        );
    }

    #[test]
    fn test_outbound_frames() {
        assert_eq!(Outbound::connect(), "40");
        assert_eq!(Outbound::ping(), "2");
        assert_eq!(Outbound::pong("beat"), "3beat");
        assert_eq!(Outbound::close(), "1");

        let action = Action::with_data("server/vote", json!({"option": "A"}));
        assert_eq!(
            Outbound::action(&action).unwrap(),
            r#"42["action",{"data":{"option":"A"},"type":"server/vote"}]"#
        );
    }

    #[test]
    fn test_socket_packet_namespace_encoding() {
        let packet = SocketPacket::Event {
            namespace: "/admin".to_string(),
            id: Some(3),
            name: "ping".to_string(),
            args: vec![],
        };
        assert_eq!(packet.encode(), r#"2/admin,3["ping"]"#);
        assert_eq!(SocketPacket::decode(&packet.encode()).unwrap(), packet);
    }

    #[test]
    fn test_is_server_action() {
        assert!(is_server_action(&Action::new("server/vote")));
        assert!(!is_server_action(&Action::new("userCount")));
        assert!(!is_server_action(&Action::new("vote/server/")));
    }
}
