use thiserror::Error;

/// The error taxonomy for the VSP debug protocol.
///
/// Each variant is distinct and must never be conflated with another: a
/// transport failure is not a protocol refusal, and a protocol refusal is
/// not a "no such entity" lookup miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VspError {
    /// The socket closed, or could not be opened.
    #[error("transport closed")]
    TransportClosed,

    /// Checksum retries were exhausted, or the framing was malformed.
    #[error("transport corruption: {0}")]
    TransportCorruption(String),

    /// The response exceeded the safety cap on frame size.
    #[error("transport overflow: response exceeded {limit} bytes")]
    TransportOverflow { limit: usize },

    /// The response was present and well-formed, but the simulator
    /// refused the command (`resp[0] == "E"`).
    #[error("protocol refused: {message}")]
    ProtocolRefused { message: String },

    /// The response was present and well-formed, but its field count or
    /// `"OK"` prefix disagreed with what the caller expected.
    #[error("protocol shape mismatch: expected {expected}, got {got}")]
    ProtocolShape { expected: String, got: String },

    /// A lookup (module/attribute/command/target/register) found
    /// nothing; no wire request was issued.
    #[error("no such {what}")]
    Semantic { what: String },

    /// `Command::execute` was called with the wrong number of
    /// arguments; no wire request was issued.
    #[error("need {expected} arguments, have {got}")]
    ArgumentMismatch { expected: usize, got: usize },
}
