//! Consumer notification channel.
//!
//! A fan-out push primitive over WebSocket for the game-server consumer(s).
//! Broadcasts are a latency optimization only: the command queue remains
//! the channel of record, the broadcast just says "go look now" and never
//! carries command content. Messages to disconnected consumers are
//! silently dropped; there is no buffering and no delivery guarantee.
//!
//! Connections must authenticate with a pre-shared token in the first
//! frame (`AUTH <token>`) before joining the registry.

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// How long a new connection gets to present its AUTH frame.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// The generic "new work available" signal. Mirrors the wire format the
/// consumer plugin already speaks.
fn refresh_signal() -> String {
    serde_json::json!({
        "type": "EXECUTE_COMMAND",
        "command": "REFRESH_COMMANDS",
    })
    .to_string()
}

/// Handle for broadcasting to all currently-connected consumers.
///
/// Cheap to clone; the HTTP handlers hold one and the gateway registers
/// connections into it.
#[derive(Clone, Default)]
pub struct Broadcaster {
    inner: Arc<BroadcasterInner>,
}

#[derive(Default)]
struct BroadcasterInner {
    /// Live connections. Add/remove are the only mutations, both idempotent.
    connections: DashMap<u64, mpsc::UnboundedSender<Message>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently attached consumers.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Broadcast the generic "new work available" signal.
    pub fn broadcast_refresh(&self) {
        self.broadcast_text(refresh_signal());
        crate::metrics::record_broadcast();
    }

    fn broadcast_text(&self, text: String) {
        let mut dead = Vec::new();
        for entry in self.inner.connections.iter() {
            if entry.value().send(Message::Text(text.clone())).is_err() {
                dead.push(*entry.key());
            }
        }
        // A failed send means the connection task is gone; drop its slot.
        for id in dead {
            self.inner.connections.remove(&id);
        }
    }

    fn register(&self, tx: mpsc::UnboundedSender<Message>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.connections.insert(id, tx);
        crate::metrics::consumer_connected(1);
        id
    }

    fn unregister(&self, id: u64) {
        if self.inner.connections.remove(&id).is_some() {
            crate::metrics::consumer_connected(-1);
        }
    }
}

/// The consumer gateway accepts incoming WebSocket connections and wires
/// authenticated ones into the [`Broadcaster`] registry.
pub struct ConsumerGateway {
    listener: TcpListener,
    token: String,
    broadcaster: Broadcaster,
}

impl ConsumerGateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        token: String,
        broadcaster: Broadcaster,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "Consumer channel listener bound");
        Ok(Self {
            listener,
            token,
            broadcaster,
        })
    }

    /// The bound address (useful when binding to port 0 in tests).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept consumer connection");
                    continue;
                }
            };

            let token = self.token.clone();
            let broadcaster = self.broadcaster.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_consumer(stream, peer, token, broadcaster).await {
                    debug!(peer = %peer, error = %e, "Consumer connection ended with error");
                }
            });
        }
    }
}

/// Constant-time pre-shared token comparison.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

async fn handle_consumer(
    stream: TcpStream,
    peer: SocketAddr,
    token: String,
    broadcaster: Broadcaster,
) -> anyhow::Result<()> {
    let ws = accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();

    // First frame must be `AUTH <token>`; anything else closes the socket
    // before the connection can observe broadcasts.
    let authed = match tokio::time::timeout(AUTH_TIMEOUT, source.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text
            .strip_prefix("AUTH ")
            .map(|presented| token_matches(presented.trim(), &token))
            .unwrap_or(false),
        _ => false,
    };

    if !authed {
        warn!(peer = %peer, "Consumer connection rejected: bad or missing AUTH");
        let _ = sink.send(Message::Close(None)).await;
        return Ok(());
    }

    let _ = sink.send(Message::Text("AUTH_OK".to_string())).await;
    info!(peer = %peer, "Consumer connected");

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let id = broadcaster.register(tx.clone());

    // Writer task owns the sink; broadcasts and heartbeat replies funnel
    // through the same mpsc so frames never interleave.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = source.next().await {
        match frame {
            // Lightweight heartbeat so idle connections can be told apart
            // from dead ones.
            Ok(Message::Text(text)) if text == "ping" => {
                let _ = tx.send(Message::Text("pong".to_string()));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(peer = %peer, error = %e, "Consumer read error");
                break;
            }
        }
    }

    broadcaster.unregister(id);
    writer.abort();
    info!(peer = %peer, "Consumer disconnected");
    Ok(())
}
