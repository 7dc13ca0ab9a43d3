//! Raw TCP control port.
//!
//! Each accepted connection runs in its own Tokio task.  Bytes are buffered
//! until a carriage return completes a command, which is decoded with
//! [`lgdisplay_core::decode_frame`] and executed as exactly one registry call.
//!
//! | Condition                          | Outcome                               |
//! |------------------------------------|---------------------------------------|
//! | framing error (see [`FrameError`]) | warn, close this connection only      |
//! | unknown opcode or value            | warn, ignore, keep reading            |
//! | unknown id / rejected transition   | registry logs it; `NG` if acks are on |
//! | peer closes mid-command            | [`FrameError::Unterminated`]          |

use std::io;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use lgdisplay_core::protocol::{CR, MAX_FRAME_LEN};
use lgdisplay_core::{decode_frame, encode_ack, ControlCommand, FrameError, PowerAction, RawCommand};

use crate::application::DisplayService;

/// How often the accept loop re-checks the `running` flag.
pub(crate) const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Startup failures for the network listeners.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Why a single control connection ended early.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The bound control port.
pub struct CommandServer {
    listener: TcpListener,
    service: Arc<dyn DisplayService>,
    ack: bool,
}

impl CommandServer {
    /// Binds the control port.  Use port 0 for an ephemeral port.
    ///
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(
        addr: SocketAddr,
        service: Arc<dyn DisplayService>,
        ack: bool,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        Ok(Self {
            listener,
            service,
            ack,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `running` is cleared, then drops the
    /// listener.  Connections already accepted finish on their own.
    pub async fn run(self, running: Arc<AtomicBool>) {
        match self.listener.local_addr() {
            Ok(addr) => info!("control port listening on {addr}"),
            Err(e) => warn!("control port listening (address unavailable: {e})"),
        }

        while running.load(Ordering::Relaxed) {
            match timeout(ACCEPT_POLL, self.listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    info!("control connection from {peer}");
                    let service = Arc::clone(&self.service);
                    let ack = self.ack;
                    tokio::spawn(async move {
                        let peer = peer.to_string();
                        match handle_connection(stream, &peer, service.as_ref(), ack).await {
                            Ok(()) => info!("control connection {peer} closed"),
                            Err(e) => warn!("control connection {peer} dropped: {e}"),
                        }
                    });
                }
                Ok(Err(e)) => error!("control port accept error: {e}"),
                Err(_) => {}
            }
        }
        info!("control port stopped");
    }
}

/// Reads and executes commands from one connection until the peer closes it
/// or a framing error occurs.
///
/// Several commands may arrive in one read, and one command may be split
/// across reads.  Blank frames are skipped.  With `ack` set, every
/// recognised command is answered with `<op> <id> OK\r` or `<op> <id> NG\r`.
///
/// # Parameters
///
/// - `stream`  – The connection; any async byte stream works.
/// - `peer`    – Label used in log lines.
/// - `service` – Registry the commands are executed against.
/// - `ack`     – Whether to write acknowledgement frames.
///
/// # Errors
///
/// [`ConnectionError::Frame`] for malformed or unterminated input,
/// [`ConnectionError::Io`] for socket failures.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: &str,
    service: &dyn DisplayService,
    ack: bool,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf: Vec<u8> = Vec::with_capacity(MAX_FRAME_LEN);
    let mut chunk = [0u8; 256];

    loop {
        while let Some((raw, consumed)) = decode_frame(&buf)? {
            buf.drain(..consumed);
            debug!("{peer}: {raw}");
            if let Some(applied) = execute(&raw, peer, service).await {
                if ack {
                    stream
                        .write_all(&encode_ack(&raw.opcode, raw.set_id, applied))
                        .await?;
                }
            }
        }
        // Every CR-terminated frame left in the buffer is blank.
        if let Some(last_cr) = buf.iter().rposition(|&b| b == CR) {
            buf.drain(..=last_cr);
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.iter().all(u8::is_ascii_whitespace) {
                return Ok(());
            }
            return Err(FrameError::Unterminated(buf.len()).into());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Runs one decoded command.  Returns whether the registry applied it, or
/// `None` for codes outside the supported set.
async fn execute(raw: &RawCommand, peer: &str, service: &dyn DisplayService) -> Option<bool> {
    let command = match raw.interpret() {
        Ok(command) => command,
        Err(e) => {
            warn!("{peer}: ignoring {raw}: {e}");
            return None;
        }
    };
    let applied = match command {
        ControlCommand::Power { set_id, action } => match action {
            PowerAction::On => service.power_on(set_id).await,
            PowerAction::Off => service.power_off(set_id).await,
            PowerAction::Restart => service.restart(set_id).await,
        },
        ControlCommand::Input { set_id, input } => service.set_input(set_id, input).await,
    };
    Some(applied)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
