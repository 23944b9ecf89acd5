//! Client-side prediction: capture, local application and batching of input commands.
//!
//! [`PredictionState`] is the per-client data; [`PredictionEngine`] is the tick
//! function an external driver invokes once per simulation step.

use std::collections::VecDeque;

use tracing::{debug, trace};
use web_time::Duration;

use crate::command::{InputBatch, InputCommand};
use crate::input::{Displacement, InputState, InputSymbol};
use crate::sessions::config::PredictionConfig;
use crate::{Position, RampartError, SequenceId};

/// Everything one client knows about its own predicted entity.
///
/// Created when the client gains ownership of its entity, dropped on
/// disconnect. Two buffers are kept:
///
/// - the *outbound* buffer holds commands captured since the last flush;
/// - the *unacknowledged* buffer holds every command from capture until the
///   server acknowledges its id. It always contains the outbound buffer.
///
/// Both buffers are in ascending sequence order, which is also capture order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionState {
    next_sequence_id: Option<SequenceId>,
    outbound: Vec<InputCommand>,
    unacknowledged: VecDeque<InputCommand>,
    local_position: Position,
}

impl PredictionState {
    /// Creates the state for a freshly owned entity at `spawn`.
    #[must_use]
    pub fn new(spawn: Position) -> Self {
        Self {
            next_sequence_id: Some(SequenceId::ZERO),
            outbound: Vec::new(),
            unacknowledged: VecDeque::new(),
            local_position: spawn,
        }
    }

    /// The client's predicted position. Rendering reads this once per frame.
    #[inline]
    #[must_use]
    pub fn local_position(&self) -> Position {
        self.local_position
    }

    /// The id the next captured command will receive, or `None` once exhausted.
    #[inline]
    #[must_use]
    pub fn next_sequence_id(&self) -> Option<SequenceId> {
        self.next_sequence_id
    }

    /// Commands captured since the last flush.
    #[must_use]
    pub fn outbound(&self) -> &[InputCommand] {
        &self.outbound
    }

    /// Commands the server has not acknowledged yet, oldest first.
    #[must_use]
    pub fn unacknowledged(&self) -> &VecDeque<InputCommand> {
        &self.unacknowledged
    }

    /// Discards every buffered command and snaps to a fresh authoritative position.
    ///
    /// This is the recovery path after [`RampartError::UnacknowledgedOverflow`].
    /// Sequence numbering continues where it left off so that a late
    /// acknowledgement for a discarded command can never match a new one.
    pub fn resynchronize(&mut self, authoritative: Position) {
        debug!(
            dropped = self.unacknowledged.len(),
            position = %authoritative,
            "Resynchronizing prediction state"
        );
        self.outbound.clear();
        self.unacknowledged.clear();
        self.local_position = authoritative;
    }

    #[cfg(test)]
    pub(crate) fn set_next_sequence_id(&mut self, next: Option<SequenceId>) {
        self.next_sequence_id = next;
    }

    pub(crate) fn set_local_position(&mut self, position: Position) {
        self.local_position = position;
    }

    pub(crate) fn unacknowledged_mut(&mut self) -> &mut VecDeque<InputCommand> {
        &mut self.unacknowledged
    }

    /// Allocates the next sequence id and records the command in both buffers.
    fn capture(&mut self, symbol: InputSymbol) -> Result<InputCommand, RampartError> {
        let sequence_id = self.next_sequence_id.ok_or(RampartError::SequenceExhausted)?;
        self.next_sequence_id = sequence_id.next();
        let command = InputCommand::new(sequence_id, symbol, self.local_position);
        self.outbound.push(command);
        self.unacknowledged.push_back(command);
        Ok(command)
    }

    fn take_outbound(&mut self) -> Option<InputBatch> {
        if self.outbound.is_empty() {
            return None;
        }
        Some(InputBatch::new(std::mem::take(&mut self.outbound)))
    }
}

/// Samples input, predicts its effect and batches commands for the server.
///
/// The engine itself only carries configuration and the flush timer; all
/// per-client data lives in the [`PredictionState`] passed to each call.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    displacement: Displacement,
    flush_interval: Duration,
    since_flush: Duration,
    max_unacknowledged: Option<usize>,
}

impl PredictionEngine {
    /// Creates an engine from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if the configuration or the
    /// displacement is invalid.
    pub fn new(config: PredictionConfig, displacement: Displacement) -> Result<Self, RampartError> {
        config.validate()?;
        displacement.validate()?;
        Ok(Self {
            displacement,
            flush_interval: config.flush_interval(),
            since_flush: Duration::ZERO,
            max_unacknowledged: config.max_unacknowledged,
        })
    }

    /// The displacement function used for prediction.
    #[must_use]
    pub fn displacement(&self) -> Displacement {
        self.displacement
    }

    /// Time between flushes.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Runs one simulation tick.
    ///
    /// 1. Advances the flush timer by `elapsed`. Once a full interval has
    ///    passed the timer restarts from zero and any buffered commands are
    ///    returned as one batch for the caller to send.
    /// 2. Resolves `input` and, if it yields a symbol, captures a command and
    ///    applies its displacement to the local position immediately.
    ///
    /// The flush happens before sampling, so a command captured on a flush
    /// tick travels with the following batch.
    ///
    /// # Errors
    ///
    /// - [`RampartError::UnacknowledgedOverflow`] if a bound is configured
    ///   and capturing would exceed it. Nothing is captured. If a flush was
    ///   due on this tick its commands go back into the outbound buffer and
    ///   the timer stays due, so the next tick (or [`flush`](Self::flush))
    ///   sends them.
    /// - [`RampartError::SequenceExhausted`] once every id has been used.
    pub fn tick(
        &mut self,
        state: &mut PredictionState,
        input: InputState,
        elapsed: Duration,
    ) -> Result<Option<InputBatch>, RampartError> {
        let batch = self.advance_timer(state, elapsed);
        if let Some(batch) = &batch {
            trace!(
                commands = batch.len(),
                pending = state.unacknowledged.len(),
                "Flushing input batch"
            );
        }

        let symbol = input.resolve();
        if symbol.is_some() {
            if let Err(err) = self.predict(state, symbol) {
                if let Some(batch) = batch {
                    let mut commands = batch.commands;
                    commands.append(&mut state.outbound);
                    state.outbound = commands;
                    self.since_flush = self.flush_interval;
                }
                return Err(err);
            }
        }
        Ok(batch)
    }

    /// Drains the outbound buffer immediately, regardless of the timer.
    ///
    /// Returns `None` when nothing is buffered; empty batches are never produced.
    pub fn flush(&mut self, state: &mut PredictionState) -> Option<InputBatch> {
        self.since_flush = Duration::ZERO;
        state.take_outbound()
    }

    fn advance_timer(&mut self, state: &mut PredictionState, elapsed: Duration) -> Option<InputBatch> {
        self.since_flush = self.since_flush.saturating_add(elapsed);
        if self.since_flush < self.flush_interval {
            return None;
        }
        self.since_flush = Duration::ZERO;
        state.take_outbound()
    }

    fn predict(&self, state: &mut PredictionState, symbol: InputSymbol) -> Result<(), RampartError> {
        if let Some(limit) = self.max_unacknowledged {
            let pending = state.unacknowledged.len();
            if pending >= limit {
                return Err(RampartError::UnacknowledgedOverflow { pending, limit });
            }
        }
        let command = state.capture(symbol)?;
        state.local_position += self.displacement.apply(symbol);
        trace!(
            sequence = %command.sequence_id,
            symbol = ?symbol,
            position = %state.local_position,
            "Predicted input locally"
        );
        Ok(())
    }
}
