use crate::domain::socketio::{Packet, ENGINE_IO_PATH, ENGINE_IO_QUERY};
use crate::utils::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

/// How control frames and messages are laid out on the wire for a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelFraming {
    /// Socket.IO events on the namespace named by the channel path, as served by
    /// the research backend under `/socket.io/`.
    SocketIo {
        start_event: Option<String>,
        stop_event: Option<String>,
        message_event: String,
        send_event: Option<String>,
    },
    /// `{"event": ..., "data": ...}` JSON envelopes over a plain WebSocket.
    EventEnvelope {
        start_event: Option<String>,
        stop_event: Option<String>,
        message_event: String,
        send_event: Option<String>,
    },
    /// Exchange market-data streams driven by SUBSCRIBE / UNSUBSCRIBE requests.
    ExchangeSubscription {
        params: Vec<String>,
        #[serde(default = "default_request_id")]
        request_id: u64,
    },
    Raw,
}

fn default_request_id() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub key: String,
    pub path: String,
    pub framing: ChannelFraming,
}

impl ChannelSpec {
    pub const TRAINING: &'static str = "TRAINING";
    pub const ECHO: &'static str = "ECHO";
    pub const TICKER: &'static str = "TICKER";

    pub fn training_log() -> Self {
        Self {
            key: Self::TRAINING.to_string(),
            path: "/api/ws/training-log".to_string(),
            framing: ChannelFraming::SocketIo {
                start_event: Some("log_event_stream_start".to_string()),
                stop_event: Some("log_event_stream_stop".to_string()),
                message_event: "server-msg".to_string(),
                send_event: Some("chat".to_string()),
            },
        }
    }

    pub fn echo() -> Self {
        Self {
            key: Self::ECHO.to_string(),
            path: "/api/ws/echo".to_string(),
            framing: ChannelFraming::SocketIo {
                start_event: None,
                stop_event: None,
                message_event: "echoed-msg".to_string(),
                send_event: Some("echo_event".to_string()),
            },
        }
    }

    /// `symbol@stream`, e.g. `btcusdt@trade` or `btcusdt@kline_1m`.
    pub fn exchange_ticker(symbol: &str, stream: &str) -> Self {
        Self {
            key: Self::TICKER.to_string(),
            path: "wss://stream.binance.com:9443/ws".to_string(),
            framing: ChannelFraming::ExchangeSubscription {
                params: vec![format!("{}@{}", symbol.to_lowercase(), stream)],
                request_id: default_request_id(),
            },
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![
            Self::training_log(),
            Self::echo(),
            Self::exchange_ticker("btcusdt", "trade"),
        ]
    }

    /// Resolves the channel against the stream base URL. Absolute paths win.
    /// Socket.IO channels all share the Engine.IO endpoint; their path is the namespace.
    pub fn endpoint(&self, base: &Url) -> Result<Url> {
        match self.framing {
            ChannelFraming::SocketIo { .. } => {
                let mut url = base.join(ENGINE_IO_PATH)?;
                url.set_query(Some(ENGINE_IO_QUERY));
                Ok(url)
            }
            _ => Ok(base.join(&self.path)?),
        }
    }

    pub fn socket_io_namespace(&self) -> Option<&str> {
        match self.framing {
            ChannelFraming::SocketIo { .. } => Some(self.path.as_str()),
            _ => None,
        }
    }

    pub fn start_frame(&self) -> Option<String> {
        match &self.framing {
            ChannelFraming::SocketIo { start_event, .. } => start_event
                .as_ref()
                .map(|event| Packet::event(&self.path, event, vec![]).encode()),
            ChannelFraming::EventEnvelope { start_event, .. } => {
                start_event.as_ref().map(|event| envelope(event, json!({})))
            }
            ChannelFraming::ExchangeSubscription { params, request_id } => {
                Some(subscription_request("SUBSCRIBE", params, *request_id))
            }
            ChannelFraming::Raw => None,
        }
    }

    pub fn stop_frame(&self) -> Option<String> {
        match &self.framing {
            ChannelFraming::SocketIo { stop_event, .. } => stop_event
                .as_ref()
                .map(|event| Packet::event(&self.path, event, vec![]).encode()),
            ChannelFraming::EventEnvelope { stop_event, .. } => {
                stop_event.as_ref().map(|event| envelope(event, json!({})))
            }
            ChannelFraming::ExchangeSubscription { params, request_id } => {
                Some(subscription_request("UNSUBSCRIBE", params, *request_id))
            }
            ChannelFraming::Raw => None,
        }
    }

    pub fn encode_outbound(&self, message: &str) -> Result<String> {
        match &self.framing {
            ChannelFraming::SocketIo { send_event, .. } => {
                let event = self.send_event(send_event)?;
                Ok(Packet::event(&self.path, event, vec![json!({ "message": message })]).encode())
            }
            ChannelFraming::EventEnvelope { send_event, .. } => {
                let event = self.send_event(send_event)?;
                Ok(envelope(event, json!({ "message": message })))
            }
            ChannelFraming::ExchangeSubscription { .. } | ChannelFraming::Raw => {
                Ok(message.to_string())
            }
        }
    }

    fn send_event<'a>(&self, send_event: &'a Option<String>) -> Result<&'a str> {
        send_event
            .as_deref()
            .ok_or_else(|| ConsoleError::ConfigError {
                message: format!("Channel '{}' does not accept operator messages", self.key),
            })
    }

    /// Extracts the console line carried by an inbound text frame, if any.
    pub fn decode_inbound(&self, frame: &str) -> Option<String> {
        match &self.framing {
            ChannelFraming::SocketIo { message_event, .. } => {
                let packet = Packet::parse(frame)?;
                let (event, payload) = packet.event_on(&self.path)?;
                if event != message_event.as_str() {
                    return None;
                }
                // 後端送的是 {"data": line}
                match payload.first() {
                    Some(Value::Object(fields)) => fields.get("data").map(line_text),
                    Some(other) => Some(line_text(other)),
                    None => Some(String::new()),
                }
            }
            ChannelFraming::EventEnvelope { message_event, .. } => {
                let value: Value = serde_json::from_str(frame).ok()?;
                if value.get("event").and_then(Value::as_str) != Some(message_event.as_str()) {
                    return None;
                }
                value.get("data").map(line_text)
            }
            ChannelFraming::ExchangeSubscription { .. } => {
                // 訂閱回應 {"result":null,"id":1} 不是行情
                if let Ok(value) = serde_json::from_str::<Value>(frame) {
                    if value.get("result").is_some() && value.get("id").is_some() {
                        return None;
                    }
                }
                Some(frame.to_string())
            }
            ChannelFraming::Raw => Some(frame.to_string()),
        }
    }
}

fn line_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn envelope(event: &str, data: Value) -> String {
    json!({ "event": event, "data": data }).to_string()
}

fn subscription_request(method: &str, params: &[String], request_id: u64) -> String {
    json!({ "method": method, "params": params, "id": request_id }).to_string()
}

/// Channels reachable by key. Keys compare case-insensitively.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<ChannelSpec>,
}

impl ChannelRegistry {
    pub fn new(channels: Vec<ChannelSpec>) -> Self {
        Self { channels }
    }

    pub fn with_builtin() -> Self {
        Self::new(ChannelSpec::builtin())
    }

    /// Adds a channel, replacing any existing one with the same key.
    pub fn register(&mut self, channel: ChannelSpec) {
        self.channels
            .retain(|existing| !existing.key.eq_ignore_ascii_case(&channel.key));
        self.channels.push(channel);
    }

    pub fn get(&self, key: &str) -> Result<&ChannelSpec> {
        self.channels
            .iter()
            .find(|channel| channel.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| ConsoleError::UnknownChannel {
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|channel| channel.key.as_str())
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
