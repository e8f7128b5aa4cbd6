//! Packet framing: escaping, checksumming, and the byte-at-a-time decode
//! state machine. This module performs no I/O; the caller feeds it bytes
//! read from a socket and is told when to send an ACK (`+`) or NACK (`-`)
//! in response.

use tracing::{debug, trace, warn};

/// Bytes that must be escaped in a payload before it is framed.
const ESCAPED: [u8; 4] = [b'$', b'#', b'*', b'}'];

fn needs_escape(b: u8) -> bool {
    ESCAPED.contains(&b)
}

/// Escapes `payload` : each of `$ # * }` becomes `}` followed
/// by the byte XORed with `0x20`.
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    for &b in payload {
        if needs_escape(b) {
            out.push(b'}');
            out.push(b ^ 0x20);
        } else {
            out.push(b);
        }
    }
    out
}

/// Unsigned 8-bit sum of `bytes`, mod 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frames `payload` as `'$' escaped '#' hex2(checksum)`, ready to write to
/// the wire.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let escaped = escape(payload);
    let sum = checksum(&escaped);
    let mut out = Vec::with_capacity(escaped.len() + 4);
    out.push(b'$');
    out.extend_from_slice(&escaped);
    out.push(b'#');
    out.extend_from_slice(format!("{:02x}", sum).as_bytes());
    out
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// What the byte-at-a-time decoder wants the caller to do next.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Keep feeding bytes; nothing to send yet.
    Pending,
    /// A full frame decoded with a matching checksum. The caller must
    /// send an ACK (`+`) and may take the payload.
    Frame(Vec<u8>),
    /// The frame's checksum didn't match. The caller must send a NACK
    /// (`-`); the decoder keeps waiting for a resend (or a resync on the
    /// next `$`).
    ChecksumMismatch,
    /// The NACK retry budget for this frame was exhausted.
    RetriesExhausted,
    /// The payload exceeded the configured safety cap.
    Overflow,
}

/// Default NACK retry budget: give up after 5 consecutive NACKs.
pub const DEFAULT_NACK_RETRY_LIMIT: u8 = 5;

/// Default payload size cap: 10 MiB.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Byte-at-a-time decoder for one response frame.
///
/// A fresh `Decoder` is used per command round trip, matching the
/// reference implementation's per-call `repeat` counter.
pub struct Decoder {
    buf: Vec<u8>,
    sum: u8,
    escape_pending: bool,
    awaiting_checksum_start: bool,
    checksum_hi: Option<u8>,
    attempts_left: u8,
    max_frame_bytes: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_NACK_RETRY_LIMIT, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_limits(nack_retry_limit: u8, max_frame_bytes: usize) -> Self {
        Decoder {
            buf: Vec::new(),
            sum: 0,
            escape_pending: false,
            awaiting_checksum_start: false,
            checksum_hi: None,
            attempts_left: nack_retry_limit.max(1),
            max_frame_bytes,
        }
    }

    fn push(&mut self, b: u8) -> Option<DecodeOutcome> {
        self.buf.push(b);
        if self.buf.len() > self.max_frame_bytes {
            Some(DecodeOutcome::Overflow)
        } else {
            None
        }
    }

    /// Feed one byte read from the stream into the decoder.
    pub fn feed_byte(&mut self, b: u8) -> DecodeOutcome {
        if let Some(hi) = self.checksum_hi.take() {
            let lo = match hex_val(b) {
                Some(v) => v,
                None => {
                    debug!("non-hex checksum digit, nacking frame");
                    return DecodeOutcome::ChecksumMismatch;
                }
            };
            let refsum = (hi << 4) | lo;
            self.awaiting_checksum_start = false;
            if self.sum == refsum {
                let frame = std::mem::take(&mut self.buf);
                return DecodeOutcome::Frame(frame);
            }
            self.attempts_left -= 1;
            if self.attempts_left == 0 {
                warn!("checksum mismatch, nack retry budget exhausted");
                return DecodeOutcome::RetriesExhausted;
            }
            debug!(attempts_left = self.attempts_left, "checksum mismatch, nacking frame");
            return DecodeOutcome::ChecksumMismatch;
        }

        if self.awaiting_checksum_start {
            return match hex_val(b) {
                Some(hi) => {
                    self.checksum_hi = Some(hi);
                    DecodeOutcome::Pending
                }
                None => {
                    debug!("non-hex checksum digit, nacking frame");
                    DecodeOutcome::ChecksumMismatch
                }
            };
        }

        if self.escape_pending {
            self.escape_pending = false;
            self.sum = self.sum.wrapping_add(b);
            if let Some(out) = self.push(b ^ 0x20) {
                return out;
            }
            return DecodeOutcome::Pending;
        }

        match b {
            b'$' => {
                if !self.buf.is_empty() {
                    trace!(discarded = self.buf.len(), "resynced on '$', discarding partial frame");
                }
                self.buf.clear();
                self.sum = 0;
                DecodeOutcome::Pending
            }
            b'#' => {
                self.awaiting_checksum_start = true;
                DecodeOutcome::Pending
            }
            b'}' => {
                self.sum = self.sum.wrapping_add(b);
                self.escape_pending = true;
                DecodeOutcome::Pending
            }
            _ => {
                self.sum = self.sum.wrapping_add(b);
                if let Some(out) = self.push(b) {
                    return out;
                }
                DecodeOutcome::Pending
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn feed_all(dec: &mut Decoder, bytes: &[u8]) -> Vec<DecodeOutcome> {
        bytes.iter().map(|&b| dec.feed_byte(b)).collect()
    }

    #[test]
    fn encode_computes_checksum() {
        assert_eq!(encode_frame(b"test"), b"$test#c0");
    }

    #[test]
    fn escape_then_decode_roundtrip() {
        let payload = b"a$b#c*d}e".to_vec();
        let frame = encode_frame(&payload);

        let mut dec = Decoder::new();
        let mut got = None;
        for &b in &frame {
            match dec.feed_byte(b) {
                DecodeOutcome::Frame(f) => got = Some(f),
                DecodeOutcome::Pending => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(got.unwrap(), payload);
    }

    #[test]
    fn checksum_mismatch_detected() {
        let mut frame = encode_frame(b"test").to_vec();
        // tamper the checksum hex digits
        let len = frame.len();
        frame[len - 1] = b'9';
        frame[len - 2] = b'9';

        let mut dec = Decoder::new();
        let mut saw_mismatch = false;
        for &b in &frame {
            if let DecodeOutcome::ChecksumMismatch = dec.feed_byte(b) {
                saw_mismatch = true;
            }
        }
        assert!(saw_mismatch);
    }

    #[test]
    fn five_consecutive_mismatches_exhaust_retries() {
        let mut dec = Decoder::new();
        let mut frame = encode_frame(b"test").to_vec();
        let len = frame.len();
        frame[len - 1] = b'9';
        frame[len - 2] = b'9';

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.extend(feed_all(&mut dec, &frame));
        }
        assert!(outcomes.contains(&DecodeOutcome::RetriesExhausted));
    }

    #[test]
    fn overflow_detected() {
        let mut dec = Decoder::with_limits(DEFAULT_NACK_RETRY_LIMIT, 4);
        dec.feed_byte(b'$');
        for &b in b"abcde" {
            let outcome = dec.feed_byte(b);
            if outcome == DecodeOutcome::Overflow {
                return;
            }
        }
        panic!("expected overflow");
    }
}
