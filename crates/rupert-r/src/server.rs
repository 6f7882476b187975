use crate::error::BridgeError;
use futures::{SinkExt, StreamExt};
use rupert_common::protocol::{BridgeInbound, BridgeOutbound, BrowserCommand, BrowserResponse};
use rupert_engine::session::SessionHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BrowserResponse>>>>;

/// WebSocket endpoint the browser extension connects to.
pub struct BridgeServer {
    port: u16,
}

/// Shared side of a running bridge. Cheap to clone; every clone talks to the
/// same connections.
#[derive(Clone)]
pub struct BridgeHandle {
    addr: SocketAddr,
    outbound_tx: broadcast::Sender<BridgeOutbound>,
    pending: Pending,
    next_id: Arc<AtomicU64>,
    events_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<BridgeInbound>>>,
}

impl BridgeServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn start(&self) -> Result<BridgeHandle, BridgeError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = TcpListener::bind(&addr).await?;
        let addr = listener.local_addr()?;
        info!("Bridge listening on: {}", addr);

        let (outbound_tx, _) = broadcast::channel(100);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let server_tx = outbound_tx.clone();
        let server_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            debug!("Bridge accept loop started");
            while let Ok((stream, peer)) = listener.accept().await {
                info!("Accepted TCP connection from: {}", peer);
                tokio::spawn(accept_connection(
                    stream,
                    server_tx.clone(),
                    Arc::clone(&server_pending),
                    events_tx.clone(),
                ));
            }
        });

        Ok(BridgeHandle {
            addr,
            outbound_tx,
            pending,
            next_id: Arc::new(AtomicU64::new(1)),
            events_rx: Arc::new(tokio::sync::Mutex::new(events_rx)),
        })
    }
}

impl BridgeHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.outbound_tx.receiver_count() > 0
    }

    /// Waits until at least one extension is connected.
    pub async fn wait_for_extension(&self) {
        if self.is_connected() {
            return;
        }
        info!("Waiting for browser extension to connect...");
        while !self.is_connected() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        info!("Extension connected.");
    }

    /// Fire-and-forget frame to every connected extension.
    pub fn send(&self, frame: BridgeOutbound) -> Result<(), BridgeError> {
        self.outbound_tx
            .send(frame)
            .map(|_| ())
            .map_err(|_| BridgeError::NoExtension)
    }

    /// Sends a browser command and waits for the response carrying its id.
    pub async fn request(
        &self,
        command: BrowserCommand,
        timeout: Duration,
    ) -> Result<BrowserResponse, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = command.name().to_string();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);

        if let Err(e) = self.send(BridgeOutbound::Browser { id, command }) {
            lock(&self.pending).remove(&id);
            return Err(e);
        }
        debug!(id, command = %name, "browser request sent");

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BridgeError::Closed(name)),
            Err(_) => {
                lock(&self.pending).remove(&id);
                Err(BridgeError::Timeout(name))
            }
        }
    }

    /// Next speech event or control message from the extension. `None` once
    /// the accept loop is gone.
    pub async fn next_event(&self) -> Option<BridgeInbound> {
        self.events_rx.lock().await.recv().await
    }

    /// Feeds extension speech events and control messages into a session
    /// until either side goes away.
    pub fn forward_to(&self, session: SessionHandle) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(event) = handle.next_event().await {
                let delivered = match event {
                    BridgeInbound::Speech { event } => session.speech(event),
                    BridgeInbound::Control { message } => session.control(message),
                    BridgeInbound::Response { id, .. } => {
                        debug!(id, "late response ignored");
                        true
                    }
                };
                if !delivered {
                    debug!("Session closed; stop forwarding bridge events");
                    break;
                }
            }
        })
    }

    pub fn pending_requests(&self) -> usize {
        lock(&self.pending).len()
    }
}

fn lock(
    pending: &Pending,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<BrowserResponse>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn accept_connection(
    stream: TcpStream,
    outbound_tx: broadcast::Sender<BridgeOutbound>,
    pending: Pending,
    events_tx: mpsc::UnboundedSender<BridgeInbound>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("Error during the websocket handshake occurred: {}", e);
            return;
        }
    };

    info!("Extension connected over WebSocket");
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let mut outbound_rx = outbound_tx.subscribe();

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Bridge connection lagging; frames dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize bridge frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(json)).await {
                    error!("Failed to send message to WS: {}", e);
                    break;
                }
            }

            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => route_inbound(&text, &pending, &events_tx),
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(outbound_rx);
    if outbound_tx.receiver_count() == 0 {
        // No connection left to answer outstanding requests.
        let dropped = {
            let mut map = lock(&pending);
            let n = map.len();
            map.clear();
            n
        };
        if dropped > 0 {
            warn!(dropped, "Extension gone with requests outstanding");
        }
    }
}

fn route_inbound(text: &str, pending: &Pending, events_tx: &mpsc::UnboundedSender<BridgeInbound>) {
    let frame = match serde_json::from_str::<BridgeInbound>(text) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Failed to parse frame from extension: {} | Text: {}", e, text);
            return;
        }
    };

    match frame {
        BridgeInbound::Response { id, response } => {
            let waiter = lock(pending).remove(&id);
            match waiter {
                Some(tx) => {
                    if tx.send(response).is_err() {
                        debug!(id, "requester gave up before the response arrived");
                    }
                }
                None => debug!(id, "response for unknown request"),
            }
        }
        other => {
            if events_tx.send(other).is_err() {
                debug!("bridge event receiver closed");
            }
        }
    }
}
