//! TCP bridge to the external tracker device.
//!
//! Each channel owns exactly one outbound connection, opened once at startup.
//! Every primitive (`connect`, `send`, `receive`) blocks the frame thread for
//! at most the channel's timeout budget, so a flaky device can never stall
//! the interactive loop. Receives follow the device's request/ACK duty cycle:
//! the peer blocks on a send mutex until it sees our "ACK".
//!
//! No fault propagates past this module as a hard failure — callers log the
//! error and keep their last known good state.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Handshake payload sent once after a successful connect.
pub const HELLO: &str = "I'm Alive";
/// Flow-control payload sent before every receive.
pub const ACK: &str = "ACK";

/// Per-call budget for the IR pointer channel.
pub const TRACKER_TIMEOUT: Duration = Duration::from_millis(5000);
/// Per-call budget for the gesture/button channel. Much tighter: button
/// frames are a high-rate broadcast and a missed one is harmless.
pub const GESTURE_TIMEOUT: Duration = Duration::from_millis(5);

/// Receive buffer size for the IR pointer channel.
pub const TRACKER_BUFFER: usize = 128;
/// Receive buffer size for the gesture/button channel.
pub const GESTURE_BUFFER: usize = 64;

// ── Errors ───────────────────────────────────────────────────

/// A transport fault. Captured and logged by the caller, never raised
/// past the fusion tick.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No completion within the channel's timeout budget.
    #[error("operation timeout")]
    Timeout,
    #[error("link is not connected")]
    NotConnected,
    #[error("peer closed the connection")]
    Closed,
    #[error("socket error: {0}")]
    Socket(std::io::Error),
}

fn classify(err: std::io::Error) -> LinkError {
    match err.kind() {
        // Both kinds appear depending on platform when a socket deadline fires
        ErrorKind::WouldBlock | ErrorKind::TimedOut => LinkError::Timeout,
        _ => LinkError::Socket(err),
    }
}

// ── Configuration ────────────────────────────────────────────

/// Endpoint and budgets for one tracker channel.
///
/// Endpoints are external configuration, never compiled-in constants.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub endpoint: SocketAddr,
    pub timeout: Duration,
    pub recv_buffer: usize,
}

impl ChannelConfig {
    /// Reference budgets for the IR pointer channel.
    pub fn tracker(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            timeout: TRACKER_TIMEOUT,
            recv_buffer: TRACKER_BUFFER,
        }
    }

    /// Reference budgets for the gesture/button channel.
    pub fn gesture(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            timeout: GESTURE_TIMEOUT,
            recv_buffer: GESTURE_BUFFER,
        }
    }
}

// ── Link ─────────────────────────────────────────────────────

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Faulted,
}

/// One outbound TCP connection to a tracker channel.
pub struct TrackerLink {
    config: ChannelConfig,
    stream: Option<TcpStream>,
    state: LinkState,
}

impl TrackerLink {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            stream: None,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Open the connection and send the "I'm Alive" handshake. Called once at
    /// startup; there is no retry or reconnect — a permanently unreachable
    /// device degrades to "no new samples" rather than crashing the study.
    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.state = LinkState::Connecting;
        let stream =
            TcpStream::connect_timeout(&self.config.endpoint, self.config.timeout).map_err(
                |err| {
                    self.state = LinkState::Faulted;
                    warn!(endpoint = %self.config.endpoint, %err, "tracker connect failed");
                    classify(err)
                },
            )?;

        stream
            .set_read_timeout(Some(self.config.timeout))
            .map_err(LinkError::Socket)?;
        stream
            .set_write_timeout(Some(self.config.timeout))
            .map_err(LinkError::Socket)?;
        // Frames are tiny and latency-sensitive
        let _ = stream.set_nodelay(true);

        self.stream = Some(stream);
        self.state = LinkState::Connected;
        info!(endpoint = %self.config.endpoint, "tracker link connected");

        self.send(HELLO)
    }

    /// Write a payload in full, blocking up to the channel timeout.
    pub fn send(&mut self, payload: &str) -> Result<(), LinkError> {
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        match stream.write_all(payload.as_bytes()) {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = classify(err);
                self.fault_on_hard_error(&err);
                Err(err)
            }
        }
    }

    /// One receive duty cycle: send "ACK" to release the peer's send mutex,
    /// then read a single frame, blocking up to the channel timeout. The
    /// returned text has its NUL padding stripped.
    pub fn receive(&mut self) -> Result<String, LinkError> {
        self.send(ACK)?;

        let recv_buffer = self.config.recv_buffer;
        let stream = self.stream.as_mut().ok_or(LinkError::NotConnected)?;
        let mut buffer = vec![0u8; recv_buffer];
        let read = match stream.read(&mut buffer) {
            Ok(0) => {
                self.state = LinkState::Faulted;
                debug!(endpoint = %self.config.endpoint, "tracker peer closed connection");
                return Err(LinkError::Closed);
            }
            Ok(n) => n,
            Err(err) => {
                let err = classify(err);
                self.fault_on_hard_error(&err);
                return Err(err);
            }
        };

        let text: String = String::from_utf8_lossy(&buffer[..read])
            .chars()
            .filter(|&c| c != '\0')
            .collect();
        Ok(text)
    }

    /// A timed-out operation is simply abandoned (the next tick reuses the
    /// same connection); only hard socket errors fault the link.
    fn fault_on_hard_error(&mut self, err: &LinkError) {
        if matches!(err, LinkError::Socket(_)) {
            self.state = LinkState::Faulted;
            warn!(endpoint = %self.config.endpoint, %err, "tracker link faulted");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
