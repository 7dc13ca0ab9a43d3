//! Dashboard WebSocket listener and per-session pumps.
//!
//! Every viewer connection becomes one hub session:
//!
//! 1. Complete the WebSocket handshake (frames over 512 bytes are refused).
//! 2. Register an outbound channel with the [`HubHandle`]; the hub answers
//!    with a snapshot of every display.
//! 3. Run two pumps until either ends:
//!    - **write pump**: hub payloads → text frames, plus a ping every 9 s.
//!      When the hub drops the channel (eviction) it sends Close.
//!    - **read pump**: text frames → [`ActionRequest`] → hub.  Invalid JSON is
//!      logged and skipped.
//! 4. Unregister from the hub.

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::{bail, Context};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::HubHandle;
use crate::domain::messages::ActionRequest;
use crate::infrastructure::command_server::{ServerError, ACCEPT_POLL};

/// Interval between keepalive pings.
pub const PING_PERIOD: Duration = Duration::from_secs(9);
/// A viewer that sends nothing (not even a pong) for this long is dropped.
pub const PONG_WAIT: Duration = Duration::from_secs(10);
/// Largest inbound frame accepted from a viewer.
pub const MAX_MESSAGE_SIZE: usize = 512;
/// Deadline for a single outbound frame.
const WRITE_WAIT: Duration = Duration::from_secs(1);

/// The bound dashboard listener.
pub struct DashboardServer {
    listener: TcpListener,
    hub: HubHandle,
    session_buffer: usize,
}

impl DashboardServer {
    /// Binds the dashboard listener.  Use port 0 for an ephemeral port.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        hub: HubHandle,
        session_buffer: usize,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            hub,
            session_buffer,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts viewers until `running` is set to `false`.
    ///
    /// Each connection runs as its own Tokio task, so a slow viewer never
    /// holds up the accept loop or other viewers.  The flag is polled between
    /// accepts; sessions already running are left to finish.
    ///
    /// # Parameters
    ///
    /// - `running` – Shared flag; the loop exits when this is set to `false`.
    pub async fn run(self, running: Arc<AtomicBool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("dashboard listening on ws://{addr}"),
            Err(e) => warn!("dashboard listening (address unavailable: {e})"),
        }

        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!("dashboard connection from {peer}");
                    let hub = self.hub.clone();
                    let buffer = self.session_buffer;
                    tokio::spawn(async move {
                        match run_session(stream, peer, hub, buffer).await {
                            Ok(()) => info!("dashboard viewer {peer} disconnected"),
                            Err(e) => warn!("dashboard viewer {peer} dropped: {e:#}"),
                        }
                    });
                }
                Ok(Err(e)) => error!("dashboard accept error: {e}"),
                Err(_) => {}
            }
        }
        info!("dashboard stopped");
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Runs the complete lifecycle of one viewer connection.
///
/// 1. Completes the WebSocket handshake with frame and message size capped
///    at [`MAX_MESSAGE_SIZE`].
/// 2. Registers a fresh session with the hub, backed by an outbound queue of
///    `session_buffer` frames.
/// 3. Runs [`write_pump`] and [`read_pump`] until either one finishes.
/// 4. Unregisters the session, whatever the outcome.
///
/// # Parameters
///
/// - `stream`         – Accepted TCP stream, before the HTTP upgrade.
/// - `peer`           – Remote address, used in log lines.
/// - `hub`            – Handle to the running notification hub.
/// - `session_buffer` – Outbound frames queued before the hub evicts the viewer.
///
/// # Errors
///
/// Returns an error if the handshake fails, the hub has stopped, a write
/// misses its deadline, the viewer goes silent for [`PONG_WAIT`], or the
/// viewer sends an oversized frame.
async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    session_buffer: usize,
) -> anyhow::Result<()> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(MAX_MESSAGE_SIZE);
    let ws = accept_async_with_config(stream, Some(config))
        .await
        .with_context(|| format!("WebSocket handshake with {peer} failed"))?;
    let (sink, source) = ws.split();

    let session = Uuid::new_v4();
    let (outbound_tx, outbound_rx) = mpsc::channel(session_buffer);
    if !hub.register(session, outbound_tx).await {
        bail!("notification hub is not running");
    }
    info!("dashboard viewer {peer} joined as session {session}");

    let label = peer.to_string();
    let result = tokio::select! {
        r = write_pump(sink, outbound_rx, &label) => r,
        r = read_pump(source, &hub, &label) => r,
    };

    hub.unregister(session).await;
    result
}

/// Forwards hub payloads to the viewer and keeps the connection alive.
///
/// Every payload becomes one text frame, and a ping goes out every
/// [`PING_PERIOD`].  When the hub drops the session's sender (unregister or
/// eviction) the pump sends a Close frame and returns.
///
/// # Parameters
///
/// - `sink`     – Outbound half of the WebSocket.
/// - `outbound` – Receiving end of the session queue the hub writes into.
/// - `peer`     – Label used in log lines.
///
/// # Errors
///
/// Returns an error if a frame cannot be written within the write deadline.
async fn write_pump<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<String>,
    peer: &str,
) -> anyhow::Result<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: StdError + Send + Sync + 'static,
{
    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    loop {
        tokio::select! {
            payload = outbound.recv() => match payload {
                Some(payload) => send(&mut sink, WsMessage::Text(payload)).await?,
                None => {
                    debug!("{peer}: session closed by hub");
                    // Best effort: the peer may already be gone.
                    let _ = send(&mut sink, WsMessage::Close(None)).await;
                    return Ok(());
                }
            },
            _ = ping.tick() => send(&mut sink, WsMessage::Ping(Vec::new())).await?,
        }
    }
}

/// Writes one frame, giving up after [`WRITE_WAIT`].
async fn send<S>(sink: &mut S, msg: WsMessage) -> anyhow::Result<()>
where
    S: Sink<WsMessage> + Unpin,
    S::Error: StdError + Send + Sync + 'static,
{
    timeout(WRITE_WAIT, sink.send(msg))
        .await
        .context("write deadline exceeded")?
        .context("write failed")
}

/// Turns viewer text frames into hub actions until the viewer leaves.
///
/// Text frames are parsed as [`ActionRequest`] and submitted to the hub;
/// malformed JSON and binary frames are logged and skipped.  Any inbound
/// frame, pongs included, resets the [`PONG_WAIT`] silence timer.
///
/// # Parameters
///
/// - `source` – Inbound half of the WebSocket.
/// - `hub`    – Handle the parsed actions are submitted to.
/// - `peer`   – Label used in log lines.
///
/// # Errors
///
/// Returns an error if the viewer is silent for [`PONG_WAIT`] or the read
/// fails, which includes frames larger than [`MAX_MESSAGE_SIZE`].  A Close
/// frame or the end of the stream is a clean exit.
async fn read_pump<S>(mut source: S, hub: &HubHandle, peer: &str) -> anyhow::Result<()>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let msg = match timeout(PONG_WAIT, source.next()).await {
            Err(_) => bail!("no frames from viewer in {:?}", PONG_WAIT),
            Ok(None) | Ok(Some(Err(WsError::ConnectionClosed))) => return Ok(()),
            Ok(Some(Err(e))) => return Err(e).context("read failed"),
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            WsMessage::Text(text) => match serde_json::from_str::<ActionRequest>(&text) {
                Ok(request) => {
                    debug!("{peer}: action {}", request.action);
                    hub.submit(request).await;
                }
                Err(e) => warn!("{peer}: invalid dashboard JSON: {e}"),
            },
            WsMessage::Binary(_) => warn!("{peer}: unexpected binary frame (ignored)"),
            WsMessage::Close(_) => {
                debug!("{peer}: close frame received");
                return Ok(());
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
