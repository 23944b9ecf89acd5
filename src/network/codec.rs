//! Binary codec for network message serialization.
//!
//! This module provides a centralized interface for encoding and decoding
//! network messages using bincode. It encapsulates the bincode configuration to
//! ensure consistent, deterministic serialization on both client and server.
//!
//! # Examples
//!
//! ```
//! use rampart::network::codec::{decode_message, encode_message};
//! use rampart::{InputBatch, Message};
//!
//! let msg = Message::input_batch(InputBatch::default());
//! let bytes = encode_message(&msg).expect("encoding should succeed");
//! let decoded = decode_message(&bytes).expect("decoding should succeed");
//! assert_eq!(msg, decoded);
//! ```

use std::fmt;

use crate::network::messages::Message;
use crate::RampartError;

/// Largest payload the decoder will accept.
///
/// A batch of 60 Hz input flushed twice per second is well under a kilobyte;
/// the limit only exists so that garbage length prefixes cannot trigger huge
/// allocations.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

// Fixed-size integers keep message sizes independent of sequence id magnitude.
fn config() -> impl bincode::config::Config {
    bincode::config::standard()
        .with_fixed_int_encoding()
        .with_limit::<MAX_MESSAGE_SIZE>()
}

/// Represents what operation was being performed when a codec error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecOperation {
    /// Encoding a network message.
    EncodeMessage,
    /// Decoding a network message.
    DecodeMessage,
}

impl fmt::Display for CodecOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeMessage => write!(f, "encoding network message"),
            Self::DecodeMessage => write!(f, "decoding network message"),
        }
    }
}

/// Errors that can occur during encoding or decoding.
///
/// Bincode errors are opaque and only expose a `Display` implementation, so
/// their text is kept as a `String`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// The encoding operation failed.
    EncodeError {
        /// The underlying bincode error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The decoding operation failed.
    DecodeError {
        /// The underlying bincode error message.
        message: String,
        /// The operation that was being performed.
        operation: CodecOperation,
    },
    /// The payload decoded, but does not belong to this protocol.
    ForeignMagic {
        /// The magic that was found.
        magic: u16,
    },
    /// The payload decoded, but left unread bytes behind.
    TrailingBytes {
        /// Number of bytes left over.
        remaining: usize,
    },
}

impl CodecError {
    /// Creates a new encode error with the given message and operation.
    pub fn encode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::EncodeError {
            message: message.into(),
            operation,
        }
    }

    /// Creates a new decode error with the given message and operation.
    pub fn decode(message: impl Into<String>, operation: CodecOperation) -> Self {
        Self::DecodeError {
            message: message.into(),
            operation,
        }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodeError { message, operation } => {
                write!(f, "encoding failed while {operation}: {message}")
            },
            Self::DecodeError { message, operation } => {
                write!(f, "decoding failed while {operation}: {message}")
            },
            Self::ForeignMagic { magic } => {
                write!(f, "message carries foreign magic {magic:#06x}")
            },
            Self::TrailingBytes { remaining } => {
                write!(f, "message followed by {remaining} unread bytes")
            },
        }
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for RampartError {
    fn from(err: CodecError) -> Self {
        Self::SerializationError {
            context: err.to_string(),
        }
    }
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes a protocol message.
pub fn encode_message(msg: &Message) -> CodecResult<Vec<u8>> {
    bincode::serde::encode_to_vec(msg, config())
        .map_err(|e| CodecError::encode(e.to_string(), CodecOperation::EncodeMessage))
}

/// Decodes a protocol message, rejecting foreign magic and trailing garbage.
pub fn decode_message(bytes: &[u8]) -> CodecResult<Message> {
    let (msg, read): (Message, usize) = bincode::serde::decode_from_slice(bytes, config())
        .map_err(|e| CodecError::decode(e.to_string(), CodecOperation::DecodeMessage))?;
    if !msg.has_valid_magic() {
        return Err(CodecError::ForeignMagic {
            magic: msg.header.magic,
        });
    }
    if read != bytes.len() {
        return Err(CodecError::TrailingBytes {
            remaining: bytes.len() - read,
        });
    }
    Ok(msg)
}
