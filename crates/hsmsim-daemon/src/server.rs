//! TCP server and per-connection session loop.
//!
//! One spawned task per accepted connection; within a connection the
//! protocol is strictly paired and non-pipelined: one frame in, one frame
//! out, in order. The only state shared across connections is the
//! immutable [`HsmContext`] plus policy, so no coordination is needed.
//!
//! Frame and grammar violations close the connection without a reply:
//! once framing is lost the peer cannot be resynchronised in-band. All
//! semantic failures have already been turned into well-formed responses
//! by the handlers before the bytes get here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use hsmsim_core::{command, frame, handler, HsmContext};

/// Initial capacity of the per-connection read buffer. Frames are capped
/// at 64 KiB + 2 by the 16-bit length field; the buffer grows on demand.
const READ_BUFFER_CAPACITY: usize = 4096;

/// Shared, immutable per-process server state.
#[derive(Debug)]
pub struct SimulatorState {
    /// The protocol engine context (LMK + policy).
    pub ctx: HsmContext,
    /// Header every frame must carry; empty when unconfigured.
    pub header: Vec<u8>,
    /// Emit per-field traces of every parsed request.
    pub trace_fields: bool,
    shutdown: AtomicBool,
}

/// Shared handle to the server state.
pub type SharedState = Arc<SimulatorState>;

impl SimulatorState {
    /// Creates the shared state.
    #[must_use]
    pub fn new(ctx: HsmContext, header: Vec<u8>, trace_fields: bool) -> SharedState {
        Arc::new(Self {
            ctx,
            header,
            trace_fields,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Flags the server for shutdown; the accept loop drains on its next
    /// poll.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// `true` once shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Accept loop: spawns one session task per connection until shutdown is
/// requested.
///
/// # Errors
///
/// Returns an error only when accepting fails unrecoverably; individual
/// session errors are logged and absorbed.
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<()> {
    info!(addr = %listener.local_addr()?, "simulator listening");

    loop {
        if state.is_shutdown_requested() {
            info!("accept loop shutting down");
            break;
        }

        // Bounded accept so the shutdown flag is polled.
        let accepted =
            tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;

        match accepted {
            Ok(Ok((stream, peer))) => {
                let conn_state = Arc::clone(&state);
                tokio::spawn(async move {
                    debug!(%peer, "connection accepted");
                    if let Err(e) = handle_connection(stream, conn_state).await {
                        warn!(%peer, error = %e, "session error");
                    }
                    debug!(%peer, "connection closed");
                });
            },
            Ok(Err(e)) => {
                error!(error = %e, "failed to accept connection");
            },
            Err(_) => {
                // Timeout; re-check the shutdown flag.
            },
        }
    }

    Ok(())
}

/// Session loop for one connection: read a frame, answer it, repeat.
///
/// Each `read` is treated as one frame; the device being simulated
/// answers per recv and drops peers whose framing is broken, so a frame
/// split across reads is handled the same way as a corrupt one.
///
/// # Errors
///
/// Returns an error when the socket read or write fails.
pub async fn handle_connection(mut stream: TcpStream, state: SharedState) -> Result<()> {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);

    loop {
        buf.clear();
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            // Peer closed; partially read bytes are discarded.
            return Ok(());
        }

        let Some(response) = process_frame(&state, &buf) else {
            // Frame or grammar violation: close without replying.
            return Ok(());
        };

        stream.write_all(&response).await?;
    }
}

/// Runs one frame through the engine. `None` means the connection must be
/// closed without a reply.
fn process_frame(state: &SimulatorState, bytes: &[u8]) -> Option<Vec<u8>> {
    let (cmd, payload) = match frame::parse(bytes, &state.header) {
        Ok(parts) => parts,
        Err(e) => {
            warn!(error = %e, "dropping connection: bad frame");
            return None;
        },
    };

    let request = match command::parse_request(cmd, payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "dropping connection: bad command payload");
            return None;
        },
    };

    if state.trace_fields {
        debug!(
            command = %String::from_utf8_lossy(&request.code),
            description = request.description,
            "request"
        );
        for (name, value) in request.fields.iter() {
            debug!(field = name, value = %hex::encode_upper(value), "request field");
        }
    }

    let response = handler::dispatch(&state.ctx, &request);
    debug!(
        command = %String::from_utf8_lossy(&request.code),
        response = %String::from_utf8_lossy(&response.code),
        error = %String::from_utf8_lossy(&response.error),
        "handled"
    );

    match frame::build(&state.header, &response.body_bytes()) {
        Ok(frame) => Some(frame),
        Err(e) => {
            // Unreachable in practice: response bodies are far below the
            // 16-bit cap. Treated as a connection error all the same.
            error!(error = %e, "failed to frame response");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hsmsim_core::{Policy, DEFAULT_LMK_HEX};

    fn state(header: &[u8]) -> SharedState {
        let ctx = HsmContext::new(DEFAULT_LMK_HEX, Policy::default()).unwrap();
        SimulatorState::new(ctx, header.to_vec(), false)
    }

    #[test]
    fn test_process_frame_answers_nc() {
        let state = state(b"SSSS");
        let request = frame::build(b"SSSS", b"NC\x00\x00").unwrap();
        let response = process_frame(&state, &request).unwrap();
        assert_eq!(&response[2..6], b"SSSS");
        assert_eq!(&response[6..10], b"ND00");
    }

    #[test]
    fn test_process_frame_rejects_bad_header() {
        let state = state(b"SSSS");
        let request = frame::build(b"XXXX", b"NC").unwrap();
        assert!(process_frame(&state, &request).is_none());
    }

    #[test]
    fn test_process_frame_rejects_length_mismatch() {
        let state = state(b"");
        let mut request = frame::build(b"", b"NC").unwrap();
        request[1] ^= 0x04;
        assert!(process_frame(&state, &request).is_none());
    }

    #[test]
    fn test_shutdown_flag() {
        let state = state(b"");
        assert!(!state.is_shutdown_requested());
        state.request_shutdown();
        assert!(state.is_shutdown_requested());
    }
}
