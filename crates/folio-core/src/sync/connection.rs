//! Persistent connection to the event source
//!
//! Maintains a long-lived WebSocket connection to a socket.io server and
//! forwards every received action to the store, in delivery order.
//! Handles reconnection automatically with exponential backoff.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::message::{is_server_action, Handshake, Inbound, Outbound};
use crate::config::{Config, EngineProtocol};
use crate::error::ConfigError;
use crate::models::{Action, AppState};
use crate::store::Store;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

/// Outbound actions held while the namespace is not joined
pub const MAX_PENDING: usize = 64;

/// Floor for the reconnect delay
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

/// Commands sent to the connection task
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Send an action to the server
    ///
    /// `sent` fires once the frame has been written to the socket. It is
    /// dropped unfired if the action is discarded first.
    Emit {
        action: Action,
        sent: Option<oneshot::Sender<()>>,
    },
    /// Close the connection and stop the task
    Shutdown,
}

/// An outbound action waiting for the socket
#[derive(Debug)]
struct Outgoing {
    action: Action,
    sent: Option<oneshot::Sender<()>>,
}

impl Outgoing {
    fn confirm(self) {
        if let Some(sent) = self.sent {
            let _ = sent.send(());
        }
    }
}

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected, waiting to retry or stopped
    Disconnected,
    /// Opening the socket and waiting for the handshake
    Connecting,
    /// Joined the default namespace; actions flow
    Connected,
}

/// Configuration for the connection task
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL including the socket.io path and query
    pub url: String,
    /// Engine.IO protocol revision
    pub protocol: EngineProtocol,
    /// Initial reconnect delay
    pub initial_reconnect_delay: Duration,
    /// Maximum reconnect delay
    pub max_reconnect_delay: Duration,
    /// How long to wait for the Engine.IO open packet
    pub handshake_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            protocol: EngineProtocol::V3,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl ConnectionConfig {
    /// Build from application settings
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            url: config.socket_url()?,
            protocol: config.protocol,
            initial_reconnect_delay: config.reconnect_initial(),
            max_reconnect_delay: config.reconnect_max(),
            ..Self::default()
        })
    }
}

/// Handle to control the connection task
pub struct ConnectionHandle {
    /// Send commands to the connection task
    command_tx: mpsc::Sender<ConnectionCommand>,
    /// Watch connection status
    status_rx: watch::Receiver<ConnectionStatus>,
    /// Store fed by the connection
    store: Store,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// The store this connection dispatches into
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Dispatch an action, sending it to the server first if it is namespaced
    ///
    /// Actions with the `server/` prefix are sent (or queued until the
    /// connection is up). Every action is then dispatched to the local store.
    pub async fn emit(&self, action: Action) -> Result<AppState> {
        if is_server_action(&action) {
            self.send_command(action.clone(), None).await?;
        }
        Ok(self.store.dispatch_action(&action))
    }

    /// Like `emit`, but wait until a namespaced action is on the wire
    ///
    /// Fails if the action is discarded before it could be written, for
    /// example when the outbound queue overflows or the task shuts down.
    /// The local dispatch only happens once the send is confirmed.
    pub async fn emit_confirmed(&self, action: Action) -> Result<AppState> {
        if is_server_action(&action) {
            let (sent_tx, sent_rx) = oneshot::channel();
            self.send_command(action.clone(), Some(sent_tx)).await?;
            sent_rx
                .await
                .map_err(|_| anyhow!("{} was dropped before it was sent", action.kind))?;
        }
        Ok(self.store.dispatch_action(&action))
    }

    async fn send_command(&self, action: Action, sent: Option<oneshot::Sender<()>>) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Emit { action, sent })
            .await
            .map_err(|_| anyhow!("Connection task has stopped"))
    }

    /// Wait until the connection reaches `Connected`
    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.status_rx.clone();
        rx.wait_for(|status| *status == ConnectionStatus::Connected)
            .await
            .map_err(|_| anyhow!("Connection task has stopped"))?;
        Ok(())
    }

    /// Close the connection and wait for the task to finish
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown).await;
        self.task.await.context("Connection task failed")?;
        Ok(())
    }
}

/// Spawn the connection task
///
/// Connects immediately. The task reconnects on disconnection until
/// `shutdown` is called or every handle is dropped.
pub fn spawn_connection(config: ConnectionConfig, store: Store) -> ConnectionHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    let task = tokio::spawn(connection_loop(config, store.clone(), command_rx, status_tx));

    ConnectionHandle {
        command_tx,
        status_rx,
        store,
        task,
    }
}

/// How a session ended
enum SessionEnd {
    /// Shutdown requested
    Shutdown,
    /// Server closed the connection
    Closed,
}

/// Main connection loop with reconnection
async fn connection_loop(
    config: ConnectionConfig,
    store: Store,
    mut command_rx: mpsc::Receiver<ConnectionCommand>,
    status_tx: watch::Sender<ConnectionStatus>,
) {
    let initial_delay = config.initial_reconnect_delay.max(MIN_RECONNECT_DELAY);
    let max_delay = config.max_reconnect_delay.max(initial_delay);
    let mut reconnect_delay = initial_delay;
    let mut pending: VecDeque<Outgoing> = VecDeque::new();

    loop {
        let _ = status_tx.send(ConnectionStatus::Connecting);

        match run_session(&config, &store, &mut command_rx, &status_tx, &mut pending).await {
            Ok(SessionEnd::Shutdown) => {
                let _ = status_tx.send(ConnectionStatus::Disconnected);
                info!("Connection to {} shut down", config.url);
                break;
            }
            Ok(SessionEnd::Closed) => {
                info!("Event source closed the connection");
                // Clean session, reset backoff
                reconnect_delay = initial_delay;
            }
            Err(e) => {
                warn!("Connection error: {:#}", e);
            }
        }

        let _ = status_tx.send(ConnectionStatus::Disconnected);
        debug!("Reconnecting in {:?}", reconnect_delay);

        // Sit out the whole delay; emits only queue, shutdown ends the task
        let backoff = tokio::time::sleep_until(Instant::now() + reconnect_delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ConnectionCommand::Emit { action, sent }) => {
                            queue_pending(&mut pending, Outgoing { action, sent });
                        }
                        Some(ConnectionCommand::Shutdown) | None => {
                            info!("Connection to {} shut down", config.url);
                            return;
                        }
                    }
                }
            }
        }

        // Exponential backoff
        reconnect_delay = (reconnect_delay * 2).min(max_delay);
    }
}

/// Hold an action until the namespace is joined, dropping the oldest when full
fn queue_pending(pending: &mut VecDeque<Outgoing>, outgoing: Outgoing) {
    if pending.len() >= MAX_PENDING {
        if let Some(dropped) = pending.pop_front() {
            warn!(
                "Outbound queue full ({} actions), dropping {} action",
                MAX_PENDING, dropped.action.kind
            );
        }
    }
    pending.push_back(outgoing);
}

/// Connect and pump messages until disconnection or shutdown
async fn run_session(
    config: &ConnectionConfig,
    store: &Store,
    command_rx: &mut mpsc::Receiver<ConnectionCommand>,
    status_tx: &watch::Sender<ConnectionStatus>,
    pending: &mut VecDeque<Outgoing>,
) -> Result<SessionEnd> {
    debug!("Connecting to {}", config.url);
    let (ws_stream, _response) = connect_async(&config.url)
        .await
        .with_context(|| format!("Failed to connect to {}", config.url))?;
    let (mut write, mut read) = ws_stream.split();

    let handshake = wait_for_open(&mut read, config.handshake_timeout).await?;
    debug!("Engine.IO session {} opened", handshake.sid);

    if config.protocol == EngineProtocol::V4 {
        write.send(Message::Text(Outbound::connect())).await?;
    }

    let period = handshake.ping_interval().max(Duration::from_millis(100));
    let liveness = handshake.ping_interval() + handshake.ping_timeout();
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();
    let mut joined = false;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Emit { action, sent }) => {
                        queue_pending(pending, Outgoing { action, sent });
                        if joined {
                            flush_pending(&mut write, pending).await?;
                        }
                    }
                    Some(ConnectionCommand::Shutdown) | None => {
                        write.send(Message::Text(Outbound::close())).await.ok();
                        write.close().await.ok();
                        return Ok(SessionEnd::Shutdown);
                    }
                }
            }

            _ = heartbeat.tick() => {
                if last_seen.elapsed() > liveness {
                    anyhow::bail!("No heartbeat from {} within {:?}", config.url, liveness);
                }
                if config.protocol == EngineProtocol::V3 {
                    write.send(Message::Text(Outbound::ping())).await?;
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match Inbound::decode(&text) {
                            Ok(Inbound::Action(action)) => {
                                debug!("Received {} action", action.kind);
                                store.dispatch_action(&action);
                            }
                            Ok(Inbound::Ping(data)) => {
                                write.send(Message::Text(Outbound::pong(&data))).await?;
                            }
                            Ok(Inbound::Connected) => {
                                if !joined {
                                    joined = true;
                                    let _ = status_tx.send(ConnectionStatus::Connected);
                                    info!("Connected to {}", config.url);
                                    flush_pending(&mut write, pending).await?;
                                }
                            }
                            Ok(Inbound::Closed) => {
                                write.close().await.ok();
                                return Ok(SessionEnd::Closed);
                            }
                            Ok(Inbound::Error(data)) => {
                                anyhow::bail!(
                                    "Event source rejected the connection: {}",
                                    data.map(|d| d.to_string()).unwrap_or_default()
                                );
                            }
                            Ok(Inbound::Open(_)) | Ok(Inbound::Pong) | Ok(Inbound::Ignored) => {}
                            Err(e) => {
                                debug!("Skipping undecodable frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Err(e)) => {
                        return Err(anyhow!("WebSocket error: {}", e));
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Wait for the Engine.IO open packet
async fn wait_for_open(read: &mut WsRead, timeout: Duration) -> Result<Handshake> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("Timeout waiting for handshake. Check that the event source is running.");
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match Inbound::decode(&text) {
                            Ok(Inbound::Open(handshake)) => return Ok(handshake),
                            Ok(_) => {}
                            Err(e) => debug!("Skipping undecodable frame during handshake: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        anyhow::bail!("Event source closed connection during handshake");
                    }
                    Some(Err(e)) => {
                        anyhow::bail!("Connection error during handshake: {}", e);
                    }
                    _ => {}
                }
            }
            _ = tokio::time::sleep(remaining) => {
                anyhow::bail!("Timeout waiting for handshake. Check that the event source is running.");
            }
        }
    }
}

/// Write queued actions in order; a failed one stays at the front for the next session
async fn flush_pending(write: &mut WsWrite, pending: &mut VecDeque<Outgoing>) -> Result<()> {
    while let Some(outgoing) = pending.pop_front() {
        if let Err(e) = send_action(write, &outgoing.action).await {
            pending.push_front(outgoing);
            return Err(e);
        }
        outgoing.confirm();
    }
    Ok(())
}

async fn send_action(write: &mut WsWrite, action: &Action) -> Result<()> {
    let frame = Outbound::action(action)?;
    write.send(Message::Text(frame)).await?;
    debug!("Sent {} action", action.kind);
    Ok(())
}
