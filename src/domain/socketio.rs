//! Engine.IO v4 / Socket.IO v5 text packets, enough to hold a namespace
//! session open over a plain WebSocket. Binary attachments are not supported.

use serde_json::Value;

pub const ENGINE_IO_PATH: &str = "/socket.io/";
pub const ENGINE_IO_QUERY: &str = "EIO=4&transport=websocket";
pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Engine.IO handshake sent by the server right after the upgrade.
    Open(Value),
    Close,
    Ping(String),
    Pong(String),
    Noop,
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Option<Value>,
    },
}

impl Packet {
    pub fn connect(namespace: &str) -> Self {
        Packet::Connect {
            namespace: namespace.to_string(),
            data: None,
        }
    }

    pub fn disconnect(namespace: &str) -> Self {
        Packet::Disconnect {
            namespace: namespace.to_string(),
        }
    }

    /// `emit(event, ...args)` without an acknowledgement.
    pub fn event(namespace: &str, event: &str, mut args: Vec<Value>) -> Self {
        args.insert(0, Value::String(event.to_string()));
        Packet::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            args,
        }
    }

    /// Event name and payload of an `Event` packet on `namespace`.
    pub fn event_on(&self, namespace: &str) -> Option<(&str, &[Value])> {
        match self {
            Packet::Event {
                namespace: ns,
                args,
                ..
            } if ns == namespace => {
                let (name, payload) = args.split_first()?;
                Some((name.as_str()?, payload))
            }
            _ => None,
        }
    }

    pub fn parse(frame: &str) -> Option<Self> {
        let kind = frame.chars().next()?;
        let rest = frame.get(kind.len_utf8()..)?;
        match kind {
            '0' => serde_json::from_str(rest).ok().map(Packet::Open),
            '1' => Some(Packet::Close),
            '2' => Some(Packet::Ping(rest.to_string())),
            '3' => Some(Packet::Pong(rest.to_string())),
            '4' => parse_message(rest),
            '6' => Some(Packet::Noop),
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Packet::Open(handshake) => format!("0{}", handshake),
            Packet::Close => "1".to_string(),
            Packet::Ping(payload) => format!("2{}", payload),
            Packet::Pong(payload) => format!("3{}", payload),
            Packet::Noop => "6".to_string(),
            Packet::Connect { namespace, data } => {
                format!("40{}{}", namespace_prefix(namespace), optional_json(data))
            }
            Packet::Disconnect { namespace } => format!("41{}", namespace_prefix(namespace)),
            Packet::Event {
                namespace,
                ack_id,
                args,
            } => format!(
                "42{}{}{}",
                namespace_prefix(namespace),
                ack_id.map(|id| id.to_string()).unwrap_or_default(),
                Value::Array(args.clone())
            ),
            Packet::Ack {
                namespace,
                ack_id,
                args,
            } => format!(
                "43{}{}{}",
                namespace_prefix(namespace),
                ack_id,
                Value::Array(args.clone())
            ),
            Packet::ConnectError { namespace, data } => {
                format!("44{}{}", namespace_prefix(namespace), optional_json(data))
            }
        }
    }
}

// <type>[<namespace>,][<ack id>][<json>]
fn parse_message(body: &str) -> Option<Packet> {
    let kind = body.chars().next()?;
    let mut rest = body.get(kind.len_utf8()..)?;

    let namespace = if rest.starts_with('/') {
        match rest.find(',') {
            Some(comma) => {
                let namespace = &rest[..comma];
                rest = &rest[comma + 1..];
                namespace.to_string()
            }
            None => {
                let namespace = rest.to_string();
                rest = "";
                namespace
            }
        }
    } else {
        DEFAULT_NAMESPACE.to_string()
    };

    let digits = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let ack_id = if digits > 0 {
        Some(rest[..digits].parse::<u64>().ok()?)
    } else {
        None
    };
    rest = &rest[digits..];

    let data: Option<Value> = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str(rest).ok()?)
    };

    match kind {
        '0' => Some(Packet::Connect { namespace, data }),
        '1' => Some(Packet::Disconnect { namespace }),
        '2' => match data {
            Some(Value::Array(args)) => Some(Packet::Event {
                namespace,
                ack_id,
                args,
            }),
            _ => None,
        },
        '3' => match (ack_id, data) {
            (Some(ack_id), Some(Value::Array(args))) => Some(Packet::Ack {
                namespace,
                ack_id,
                args,
            }),
            _ => None,
        },
        '4' => Some(Packet::ConnectError { namespace, data }),
        _ => None,
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == DEFAULT_NAMESPACE {
        String::new()
    } else {
        format!("{},", namespace)
    }
}

fn optional_json(data: &Option<Value>) -> String {
    data.as_ref().map(Value::to_string).unwrap_or_default()
}
