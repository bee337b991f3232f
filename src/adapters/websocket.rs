use crate::domain::channel::ChannelSpec;
use crate::domain::ports::{InboundFrame, OutboundFrame, StreamLink, StreamTransport};
use crate::domain::socketio::Packet;
use crate::utils::error::{ConsoleError, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens channels as WebSocket connections under a base URL.
///
/// Socket.IO channels finish the Engine.IO handshake and join their namespace
/// before `open` returns; pings from the server are answered in the background.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    base_url: Url,
    connect_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Self {
        Self {
            base_url,
            connect_timeout,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl StreamTransport for WebSocketTransport {
    async fn open(&self, channel: &ChannelSpec) -> Result<StreamLink> {
        let url = channel.endpoint(&self.base_url)?;
        let namespace = channel.socket_io_namespace().map(str::to_string);
        info!("Connecting to {} for '{}'", url, channel.key);

        let connect = async {
            let (mut ws_stream, _) = connect_async(url.as_str()).await?;
            if let Some(namespace) = namespace.as_deref() {
                socket_io_handshake(&mut ws_stream, namespace).await?;
                debug!("Joined Socket.IO namespace {}", namespace);
            }
            Ok::<_, ConsoleError>(ws_stream)
        };
        let ws_stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| ConsoleError::TransportError {
                message: format!("timed out connecting to {} after {:?}", url, self.connect_timeout),
            })??;

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<InboundFrame>();

        // 寫出：sender 被丟掉或收到 Close 就關閉連線
        let key = channel.key.clone();
        let leave = namespace.as_deref().map(|ns| Packet::disconnect(ns).encode());
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Text(text) => {
                        if let Err(e) = write.send(Message::Text(text.into())).await {
                            debug!("Send on '{}' failed: {}", key, e);
                            return;
                        }
                    }
                    OutboundFrame::Close => break,
                }
            }
            if let Some(leave) = leave {
                let _ = write.send(Message::Text(leave.into())).await;
            }
            let _ = write.send(Message::Close(None)).await;
            let _ = write.close().await;
            debug!("Writer for '{}' finished", key);
        });

        // pong 走寫出佇列；弱參照不會讓連線在 session 放手後繼續開著
        let replies = outbound_tx.downgrade();
        let key = channel.key.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let text = match msg {
                    Ok(Message::Text(text)) => text.to_string(),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!("Ignoring non-UTF-8 binary frame on '{}'", key);
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        info!("Server closed '{}'", key);
                        let _ = inbound_tx.send(InboundFrame::Closed);
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket error on '{}': {}", key, e);
                        let _ = inbound_tx.send(InboundFrame::Failed(e.to_string()));
                        return;
                    }
                };

                let frame = match namespace.as_deref() {
                    None => InboundFrame::Text(text),
                    Some(namespace) => match socket_io_inbound(namespace, &text) {
                        SocketIoInbound::Forward => InboundFrame::Text(text),
                        SocketIoInbound::Reply(reply) => {
                            if let Some(tx) = replies.upgrade() {
                                let _ = tx.send(OutboundFrame::Text(reply));
                            }
                            continue;
                        }
                        SocketIoInbound::Skip => continue,
                        SocketIoInbound::Closed => InboundFrame::Closed,
                        SocketIoInbound::Failed(reason) => InboundFrame::Failed(reason),
                    },
                };
                let finished = matches!(frame, InboundFrame::Closed | InboundFrame::Failed(_));
                if inbound_tx.send(frame).is_err() {
                    debug!("Session for '{}' went away, stopping reader", key);
                    return;
                }
                if finished {
                    return;
                }
            }
            let _ = inbound_tx.send(InboundFrame::Closed);
        });

        Ok(StreamLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

/// Waits for the Engine.IO open packet, then joins `namespace`.
async fn socket_io_handshake(ws: &mut WsStream, namespace: &str) -> Result<()> {
    let mut opened = false;
    while let Some(msg) = ws.next().await {
        let text = match msg? {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        match Packet::parse(&text) {
            Some(Packet::Open(_)) if !opened => {
                opened = true;
                ws.send(Message::Text(Packet::connect(namespace).encode().into()))
                    .await?;
            }
            Some(Packet::Ping(payload)) => {
                ws.send(Message::Text(Packet::Pong(payload).encode().into()))
                    .await?;
            }
            Some(Packet::Connect { namespace: ns, .. }) if ns == namespace => return Ok(()),
            Some(Packet::ConnectError { namespace: ns, data }) if ns == namespace => {
                return Err(ConsoleError::TransportError {
                    message: refusal(&ns, data.as_ref()),
                });
            }
            _ => debug!("Ignoring frame during Socket.IO handshake: {}", text),
        }
    }
    Err(ConsoleError::TransportError {
        message: format!("connection closed before namespace {} was joined", namespace),
    })
}

#[derive(Debug, PartialEq)]
enum SocketIoInbound {
    Forward,
    Reply(String),
    Skip,
    Closed,
    Failed(String),
}

fn socket_io_inbound(namespace: &str, text: &str) -> SocketIoInbound {
    match Packet::parse(text) {
        Some(Packet::Event { .. }) => SocketIoInbound::Forward,
        Some(Packet::Ping(payload)) => SocketIoInbound::Reply(Packet::Pong(payload).encode()),
        Some(Packet::Disconnect { namespace: ns }) if ns == namespace => SocketIoInbound::Closed,
        Some(Packet::ConnectError { namespace: ns, data }) if ns == namespace => {
            SocketIoInbound::Failed(refusal(&ns, data.as_ref()))
        }
        Some(Packet::Close) => SocketIoInbound::Closed,
        _ => SocketIoInbound::Skip,
    }
}

fn refusal(namespace: &str, data: Option<&Value>) -> String {
    let detail = data
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("no reason given");
    format!("namespace {} refused the connection: {}", namespace, detail)
}
