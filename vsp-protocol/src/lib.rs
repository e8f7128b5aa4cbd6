//! Wire-format types for the VSP debug protocol: packet framing, response
//! field splitting, stop-reason parsing, and the client error taxonomy.
//!
//! This crate performs no I/O — it is the shared vocabulary between the
//! `vsp` client library and its tests.

mod error;
mod fields;
mod frame;
mod stop_reason;

pub use error::VspError;
pub use fields::{join_fields, split_fields};
pub use frame::{
    checksum, encode_frame, escape, DecodeOutcome, Decoder, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_NACK_RETRY_LIMIT,
};
pub use stop_reason::{parse_state_word, RunState, StopReason};

/// Out-of-band acknowledgement byte.
pub const ACK: u8 = b'+';
/// Out-of-band negative-acknowledgement byte.
pub const NACK: u8 = b'-';

/// `true` iff `resp` has exactly `expected_field_count` fields and
/// `resp[0] == "OK"`.
pub fn check_response(resp: &[String], expected_field_count: usize) -> bool {
    resp.len() == expected_field_count && resp.first().map(String::as_str) == Some("OK")
}
