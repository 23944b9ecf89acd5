//! The error type returned by fallible Rampart operations.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::ClientId;

/// This enum contains all error messages this library can return. Most API functions will generally return a [`Result<(), RampartError>`].
///
/// Transport faults (reordering, loss) are environmental assumptions and never show up here; the
/// visible symptom of those is a position correction at reconciliation time, see [`Correction`].
///
/// [`Result<(), RampartError>`]: std::result::Result
/// [`Correction`]: crate::Correction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RampartError {
    /// You made an invalid request, usually by using wrong parameters for function calls.
    InvalidRequest {
        /// Further specifies why the request was invalid.
        info: String,
    },
    /// Capturing another command would grow the unacknowledged buffer beyond its configured bound.
    ///
    /// The client has lost contact with the authority for too long. Treat this as a fatal desync:
    /// obtain a fresh authoritative position and call
    /// [`PredictionState::resynchronize`](crate::PredictionState::resynchronize).
    UnacknowledgedOverflow {
        /// Number of commands currently awaiting acknowledgement.
        pending: usize,
        /// The configured bound.
        limit: usize,
    },
    /// Every sequence identifier has been handed out; identifiers are never reused.
    SequenceExhausted,
    /// The server session has no link registered for this client.
    UnknownClient {
        /// The client that was referenced.
        client: ClientId,
    },
    /// Serialization or deserialization of data failed.
    SerializationError {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
}

impl Display for RampartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RampartError::InvalidRequest { info } => {
                write!(f, "Invalid Request: {}", info)
            },
            RampartError::UnacknowledgedOverflow { pending, limit } => {
                write!(
                    f,
                    "Unacknowledged buffer is full ({} pending, limit {}); resynchronization required.",
                    pending, limit
                )
            },
            RampartError::SequenceExhausted => {
                write!(f, "All sequence identifiers for this session have been used.")
            },
            RampartError::UnknownClient { client } => {
                write!(f, "No link registered for {}", client)
            },
            RampartError::SerializationError { context } => {
                write!(f, "Serialization error: {}", context)
            },
        }
    }
}

impl Error for RampartError {}
