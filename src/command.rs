//! The data units that travel between client and server.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::input::InputSymbol;
use crate::{Position, SequenceId};

/// Inline capacity for acknowledged ids. At the default four flushes per second a
/// 60 Hz client captures at most 15 commands per batch.
const INLINE_ACK_IDS: usize = 16;

/// The ids carried by one [`Acknowledgement`], in the order the server processed them.
pub type AckIds = SmallVec<[SequenceId; INLINE_ACK_IDS]>;

/// One captured input event.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputCommand {
    /// Strictly increasing per client; used to match acknowledgements.
    pub sequence_id: SequenceId,
    /// The action recognized on the tick this command was captured.
    pub symbol: InputSymbol,
    /// The client's predicted position right before this command was applied locally.
    ///
    /// Carried for diagnostics only; neither side reads it for correctness.
    pub captured_position: Position,
}

impl InputCommand {
    /// Creates a new command.
    #[must_use]
    pub const fn new(sequence_id: SequenceId, symbol: InputSymbol, captured_position: Position) -> Self {
        Self {
            sequence_id,
            symbol,
            captured_position,
        }
    }
}

/// Commands captured since the previous flush, in capture order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputBatch {
    /// The commands, oldest first.
    pub commands: Vec<InputCommand>,
}

impl InputBatch {
    /// Wraps a list of commands.
    #[must_use]
    pub const fn new(commands: Vec<InputCommand>) -> Self {
        Self { commands }
    }

    /// Number of commands in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if the batch carries no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Sequence id of the oldest command.
    #[must_use]
    pub fn first_id(&self) -> Option<SequenceId> {
        self.commands.first().map(|c| c.sequence_id)
    }

    /// Sequence id of the newest command.
    #[must_use]
    pub fn last_id(&self) -> Option<SequenceId> {
        self.commands.last().map(|c| c.sequence_id)
    }

    /// Returns `true` if ids strictly increase through the batch.
    #[must_use]
    pub fn is_ascending(&self) -> bool {
        self.commands
            .windows(2)
            .all(|pair| pair[0].sequence_id < pair[1].sequence_id)
    }
}

/// The server's answer to one [`InputBatch`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// The authoritative position after the batch was applied.
    pub server_position: Position,
    /// Every id of the batch this acknowledgement answers.
    pub acknowledged_ids: AckIds,
}

impl Acknowledgement {
    /// Creates a new acknowledgement.
    #[must_use]
    pub const fn new(server_position: Position, acknowledged_ids: AckIds) -> Self {
        Self {
            server_position,
            acknowledged_ids,
        }
    }
}
