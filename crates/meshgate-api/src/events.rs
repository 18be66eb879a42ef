//! Inbound UDP event stream.
//!
//! The gateway pushes [`UpdateFrame`]s as JSON datagrams to port 56000
//! whenever an output changes and in reply to a status broadcast.
//! [`EventListener`] owns the socket and turns it into an infinite lazy
//! stream; the socket is dropped exactly once, when the stream ends.
//!
//! ```rust,ignore
//! let listener = EventListener::bind(addr, Duration::from_secs(1)).await?;
//! let closer = listener.close_handle();
//! let mut frames = std::pin::pin!(listener.into_stream());
//! while let Some(frame) = frames.next().await {
//!     println!("{frame:?}");
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use futures_core::Stream;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::frame::UpdateFrame;

pub const DEFAULT_EVENT_PORT: u16 = 56000;

/// Default pause after a failed receive before trying again.
pub const DEFAULT_RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

const MAX_DATAGRAM_LEN: usize = 4096;

// ── CloseHandle ──────────────────────────────────────────────────────

/// Cloneable handle that ends an [`EventListener`] stream from any task.
#[derive(Debug, Clone)]
pub struct CloseHandle(CancellationToken);

impl CloseHandle {
    /// Idempotent.
    pub fn close(&self) {
        self.0.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_cancelled()
    }
}

// ── EventListener ────────────────────────────────────────────────────

/// A bound event socket, not yet consuming datagrams.
#[derive(Debug)]
pub struct EventListener {
    socket: UdpSocket,
    backoff: Duration,
    cancel: CancellationToken,
}

impl EventListener {
    /// Bind the event socket. `backoff` is the pause after a receive error.
    pub async fn bind(addr: SocketAddr, backoff: Duration) -> Result<Self, Error> {
        let socket = UdpSocket::bind(addr).await?;
        debug!(addr = %addr, "event listener bound");
        Ok(Self {
            socket,
            backoff,
            cancel: CancellationToken::new(),
        })
    }

    /// Tie the listener's lifetime to an outer token (typically a session's).
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle(self.cancel.clone())
    }

    /// Close the stream (or pre-close it, if not yet consumed).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Consume the listener, yielding frames in arrival order until closed.
    ///
    /// Receive errors pause for the configured backoff instead of spinning;
    /// datagrams that fail to decode are logged and dropped.
    pub fn into_stream(self) -> impl Stream<Item = UpdateFrame> + Send + 'static {
        let Self {
            socket,
            backoff,
            cancel,
        } = self;

        async_stream::stream! {
            let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
            loop {
                let received = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    r = socket.recv_from(&mut buf) => r,
                };

                match received {
                    Ok((len, peer)) => match UpdateFrame::from_slice(&buf[..len]) {
                        Ok(frame) => {
                            trace!(peer = %peer, board = %frame.board_id, "event frame");
                            yield frame;
                        }
                        Err(e) => {
                            warn!(peer = %peer, error = %e, "dropping undecodable event datagram");
                        }
                    },
                    Err(e) => {
                        warn!(
                            error = %e,
                            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            "event receive failed, backing off"
                        );
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
            debug!("event listener closed");
        }
    }
}
