//! Broadcast Relay
//!
//! WebSocket fan-out for match channels. A client subscribes to one
//! channel (`game_<match id>`), then every wire event it sends is
//! forwarded to the other subscribers of that channel. The relay holds no
//! game state and never answers for the engine.
//!
//! ```text
//!   → {"type":"subscribe","channel":"game_m1"}
//!   ← {"type":"subscribed","channel":"game_m1"}
//!   → {"type":"hider_found","playerId":"…","ts":…}     (fanned out, not echoed)
//! ```

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::sync::protocol::WireEvent;

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Socket error
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error
    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Control frames exchanged with relay clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Client joins a channel (replacing any previous one)
    Subscribe {
        /// Channel name
        channel: String,
    },
    /// Relay confirms a subscription
    Subscribed {
        /// Channel name
        channel: String,
    },
    /// Client leaves its channel
    Unsubscribe,
}

#[derive(Debug, Clone)]
struct Frame {
    from: SocketAddr,
    text: String,
}

type Channels = Arc<RwLock<BTreeMap<String, broadcast::Sender<Frame>>>>;

/// The relay server.
pub struct Relay {
    listener: TcpListener,
    channels: Channels,
    capacity: usize,
    shutdown_tx: broadcast::Sender<()>,
}

impl Relay {
    /// Bind the listener. `capacity` bounds each subscriber's backlog.
    pub async fn bind(addr: &str, capacity: usize) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            listener,
            channels: Arc::new(RwLock::new(BTreeMap::new())),
            capacity: capacity.max(1),
            shutdown_tx,
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Sending `()` stops the accept loop and every connection.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Accept connections until shutdown.
    pub async fn run(self) -> Result<(), RelayError> {
        info!("Relay listening on {}", self.listener.local_addr()?);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            info!("Relay connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let channels = self.channels.clone();
        let capacity = self.capacity;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let mut subscription: Option<(String, broadcast::Receiver<Frame>)> = None;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Ok(control) = serde_json::from_str::<ControlMessage>(&text) {
                                    let reply = match control {
                                        ControlMessage::Subscribe { channel } => {
                                            let rx = subscribe(&channels, &channel, capacity).await;
                                            if let Some((old, old_rx)) = subscription.replace((channel.clone(), rx)) {
                                                drop(old_rx);
                                                prune(&channels, &old).await;
                                            }
                                            debug!("{} subscribed to {}", addr, channel);
                                            Some(ControlMessage::Subscribed { channel })
                                        }
                                        ControlMessage::Unsubscribe => {
                                            if let Some((old, old_rx)) = subscription.take() {
                                                drop(old_rx);
                                                prune(&channels, &old).await;
                                            }
                                            None
                                        }
                                        ControlMessage::Subscribed { .. } => None,
                                    };
                                    if let Some(reply) = reply {
                                        let Ok(json) = serde_json::to_string(&reply) else { continue };
                                        if ws_sender.send(Message::Text(json)).await.is_err() {
                                            break;
                                        }
                                    }
                                    continue;
                                }

                                if let Err(e) = WireEvent::from_json(&text) {
                                    debug!("Dropping invalid frame from {}: {}", addr, e);
                                    continue;
                                }
                                match &subscription {
                                    Some((channel, _)) => publish(&channels, channel, Frame { from: addr, text }).await,
                                    None => debug!("Dropping frame from unsubscribed {}", addr),
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Relay client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    frame = next_frame(&mut subscription) => {
                        match frame {
                            Ok(frame) if frame.from == addr => {}
                            Ok(frame) => {
                                if ws_sender.send(Message::Text(frame.text)).await.is_err() {
                                    break;
                                }
                            }
                            Err(RecvError::Lagged(n)) => {
                                warn!("Relay client {} lagged, {} frame(s) dropped", addr, n);
                            }
                            Err(RecvError::Closed) => {
                                subscription = None;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            if let Some((channel, rx)) = subscription.take() {
                drop(rx);
                prune(&channels, &channel).await;
            }
            info!("Relay client {} cleaned up", addr);
        });
    }
}

async fn subscribe(channels: &Channels, channel: &str, capacity: usize) -> broadcast::Receiver<Frame> {
    let mut channels = channels.write().await;
    channels
        .entry(channel.to_string())
        .or_insert_with(|| broadcast::channel(capacity).0)
        .subscribe()
}

async fn publish(channels: &Channels, channel: &str, frame: Frame) {
    if let Some(tx) = channels.read().await.get(channel) {
        let _ = tx.send(frame);
    }
}

/// Drop a channel nobody listens to any more.
async fn prune(channels: &Channels, channel: &str) {
    let mut channels = channels.write().await;
    if channels.get(channel).is_some_and(|tx| tx.receiver_count() == 0) {
        channels.remove(channel);
        debug!("Channel {} closed", channel);
    }
}

async fn next_frame(subscription: &mut Option<(String, broadcast::Receiver<Frame>)>) -> Result<Frame, RecvError> {
    match subscription {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::PlayerId;
    use crate::sync::protocol::channel_for;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    async fn next_text<S>(ws: &mut S) -> String
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let Message::Text(text) = msg {
                return text;
            }
        }
    }

    #[test]
    fn test_control_message_shape() {
        let msg: ControlMessage = serde_json::from_str(r#"{"type":"subscribe","channel":"game_m1"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Subscribe { channel: "game_m1".to_string() });
        assert!(serde_json::from_str::<ControlMessage>(r#"{"type":"hider_found"}"#).is_err());
    }

    #[tokio::test]
    async fn test_fan_out_skips_sender() {
        let relay = Relay::bind("127.0.0.1:0", 16).await.unwrap();
        let addr = relay.local_addr().unwrap();
        let shutdown = relay.shutdown_handle();
        let server = tokio::spawn(relay.run());

        let url = format!("ws://{}", addr);
        let (mut a, _) = connect_async(url.as_str()).await.unwrap();
        let (mut b, _) = connect_async(url.as_str()).await.unwrap();

        let subscribe = serde_json::to_string(&ControlMessage::Subscribe { channel: channel_for("m1") }).unwrap();
        for ws in [&mut a, &mut b] {
            ws.send(Message::Text(subscribe.clone())).await.unwrap();
            let ack: ControlMessage = serde_json::from_str(&next_text(ws).await).unwrap();
            assert_eq!(ack, ControlMessage::Subscribed { channel: channel_for("m1") });
        }

        let found = WireEvent::HiderFound { player_id: PlayerId::new([1; 16]), ts: 7 };
        a.send(Message::Text(found.to_json().unwrap())).await.unwrap();
        assert_eq!(WireEvent::from_json(&next_text(&mut b).await).unwrap(), found);

        // Garbage is dropped; the next frame `a` sees comes from `b`.
        b.send(Message::Text("not json".to_string())).await.unwrap();
        let den = WireEvent::HiderReachedDen { player_id: PlayerId::new([2; 16]), ts: 8 };
        b.send(Message::Text(den.to_json().unwrap())).await.unwrap();
        assert_eq!(WireEvent::from_json(&next_text(&mut a).await).unwrap(), den);

        let _ = shutdown.send(());
        server.await.unwrap().unwrap();
    }
}
