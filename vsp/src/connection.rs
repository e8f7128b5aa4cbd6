//! Owns one TCP socket plus an exclusive in-flight lock.

use std::{
    io::{ErrorKind, Read, Write},
    net::TcpStream,
    sync::Mutex,
};

use tracing::{debug, info, instrument, trace, warn};
use vsp_protocol::{check_response, encode_frame, split_fields, DecodeOutcome, Decoder, VspError, ACK, NACK};

use crate::config::ConnectConfig;

/// How many times `command` will resend a frame after receiving a NACK
/// in reply to the *sent* frame, before giving up.
const SEND_RETRY_LIMIT: u32 = 5;

struct ConnState {
    stream: Option<TcpStream>,
    peer: String,
}

/// Owns one TCP socket to a VSP simulator and serializes command/response
/// pairs across callers.
pub struct Connection {
    host: String,
    port: u16,
    config: ConnectConfig,
    state: Mutex<ConnState>,
}

impl Connection {
    pub fn new(host: impl Into<String>, port: u16) -> Connection {
        Connection::with_config(host, port, ConnectConfig::default())
    }

    pub fn with_config(host: impl Into<String>, port: u16, config: ConnectConfig) -> Connection {
        Connection {
            host: host.into(),
            port,
            config,
            state: Mutex::new(ConnState { stream: None, peer: String::new() }),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The remote peer address, or `""` if not connected.
    pub fn peer(&self) -> String {
        self.state.lock().unwrap().peer.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().stream.is_some()
    }

    /// Opens the socket. Idempotent: a second call while already
    /// connected is a no-op. Failures are silent — check
    /// [`Connection::is_connected`] afterward.
    #[instrument(skip(self), fields(host = %self.host, port = self.port))]
    pub fn connect(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stream.is_some() {
            return;
        }

        match TcpStream::connect((self.host.as_str(), self.port)) {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                if let Some(timeout) = self.config.read_timeout {
                    let _ = stream.set_read_timeout(Some(timeout));
                }
                info!(%peer, "connected");
                state.stream = Some(stream);
                state.peer = peer;
            }
            Err(err) => {
                warn!(error = %err, "connect failed");
            }
        }
    }

    /// Closes the socket. Idempotent.
    #[instrument(skip(self))]
    pub fn disconnect(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stream.take().is_some() {
            info!("disconnected");
        }
        state.peer.clear();
    }

    /// Sends `cmd`, waits for a framed response, and returns its decoded
    /// fields. Returns `None` on any transport-level failure; the
    /// connection disconnects itself in that case. Holds the in-flight
    /// lock for the entire round trip, serializing concurrent callers.
    #[instrument(skip(self, cmd), fields(cmd))]
    pub fn command(&self, cmd: &str) -> Option<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.stream.as_ref()?;

        if !Self::send(&mut state, cmd) {
            state.stream = None;
            return None;
        }

        match Self::recv(&mut state, &self.config) {
            Some(payload) => Some(split_fields(&payload)),
            None => {
                state.stream = None;
                None
            }
        }
    }

    /// Sends `cmd` and waits for it to be ACKed, but does not wait for a
    /// response frame. Used for `quit`, which the simulator never
    /// answers.
    #[instrument(skip(self, cmd), fields(cmd))]
    pub fn command_no_reply(&self, cmd: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.stream.is_none() {
            return false;
        }
        Self::send(&mut state, cmd)
    }

    /// Like [`Connection::command`], but surfaces a typed [`VspError`]
    /// instead of `None` on transport failure. Most callers are meant to
    /// use the terser `command`/`check_response` pair, which suppresses
    /// the distinction between transport and protocol failure; this
    /// exists for the few call sites — `Command::execute` among them —
    /// that need to propagate a distinct error to their own caller.
    pub fn command_checked(&self, cmd: &str) -> Result<Vec<String>, VspError> {
        self.command(cmd).ok_or(VspError::TransportClosed)
    }

    /// `true` iff `resp` has exactly `expected_field_count` fields and
    /// `resp[0] == "OK"`.
    pub fn check_response(resp: &Option<Vec<String>>, expected_field_count: usize) -> bool {
        match resp {
            Some(fields) => check_response(fields, expected_field_count),
            None => false,
        }
    }

    fn send(state: &mut ConnState, cmd: &str) -> bool {
        let frame = encode_frame(cmd.as_bytes());
        let stream = match state.stream.as_mut() {
            Some(s) => s,
            None => return false,
        };

        for attempt in 0..SEND_RETRY_LIMIT {
            if stream.write_all(&frame).is_err() {
                return false;
            }
            let mut ack = [0u8; 1];
            match stream.read_exact(&mut ack) {
                Ok(()) if ack[0] == ACK => return true,
                Ok(()) if ack[0] == NACK => {
                    trace!(attempt, "send NACKed, resending");
                    continue;
                }
                _ => return false,
            }
        }
        false
    }

    fn recv(state: &mut ConnState, config: &ConnectConfig) -> Option<String> {
        let stream = state.stream.as_mut()?;
        let mut decoder = Decoder::with_limits(config.nack_retry_limit, config.max_frame_bytes);
        let mut byte = [0u8; 1];

        loop {
            match stream.read_exact(&mut byte) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => return None,
                Err(_) => return None,
            }

            match decoder.feed_byte(byte[0]) {
                DecodeOutcome::Pending => continue,
                DecodeOutcome::Frame(payload) => {
                    if stream.write_all(&[ACK]).is_err() {
                        return None;
                    }
                    debug!(len = payload.len(), "received frame");
                    return Some(String::from_utf8_lossy(&payload).into_owned());
                }
                DecodeOutcome::ChecksumMismatch => {
                    if stream.write_all(&[NACK]).is_err() {
                        return None;
                    }
                }
                DecodeOutcome::RetriesExhausted | DecodeOutcome::Overflow => {
                    return None;
                }
            }
        }
    }
}
