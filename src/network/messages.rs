//! The two wire messages of the protocol.

use serde::{Deserialize, Serialize};

use crate::command::{Acknowledgement, InputBatch};

/// Identifies Rampart traffic. Messages carrying any other magic are dropped.
pub const PROTOCOL_MAGIC: u16 = 0x5250;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MessageHeader {
    pub magic: u16,
}

impl Default for MessageHeader {
    fn default() -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
        }
    }
}

/// Payload of a [`Message`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Client → server: commands captured since the previous flush.
    InputBatch(InputBatch),
    /// Server → client: the answer to exactly one input batch.
    Acknowledgement(Acknowledgement),
}

/// A message that a [`Channel`] sends and receives.
///
/// [`Channel`]: crate::Channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub(crate) header: MessageHeader,
    /// What the message carries.
    pub body: MessageBody,
}

impl Message {
    /// Wraps an input batch.
    #[must_use]
    pub fn input_batch(batch: InputBatch) -> Self {
        Self {
            header: MessageHeader::default(),
            body: MessageBody::InputBatch(batch),
        }
    }

    /// Wraps an acknowledgement.
    #[must_use]
    pub fn acknowledgement(ack: Acknowledgement) -> Self {
        Self {
            header: MessageHeader::default(),
            body: MessageBody::Acknowledgement(ack),
        }
    }

    /// Returns `true` if the header carries [`PROTOCOL_MAGIC`].
    #[must_use]
    pub fn has_valid_magic(&self) -> bool {
        self.header.magic == PROTOCOL_MAGIC
    }

    /// Short name of the body variant, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.body {
            MessageBody::InputBatch(_) => "input_batch",
            MessageBody::Acknowledgement(_) => "acknowledgement",
        }
    }
}
