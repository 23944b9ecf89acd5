//! The client half of a Rampart connection.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;
use web_time::Duration;

use crate::command::{InputBatch, InputCommand};
use crate::input::InputState;
use crate::network::channel::Channel;
use crate::network::messages::{Message, MessageBody};
use crate::network::stats::PredictionStats;
use crate::prediction::{PredictionEngine, PredictionState};
use crate::reconciler::{ClientReconciler, Correction};
use crate::report_violation_to;
use crate::telemetry::{report_to_observer, ProtocolViolation, ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{Position, RampartError};

/// The owning client's side of the protocol.
///
/// A `ClientSession` predicts local input, ships batches over its [`Channel`]
/// and reconciles with every acknowledgement the server sends back. Drive it
/// with [`advance_tick`](Self::advance_tick) once per simulation step and
/// [`poll_remote`](Self::poll_remote) whenever you want to process incoming
/// messages; once per step is typical.
///
/// Create one with [`SessionBuilder::start_client_session`].
///
/// [`SessionBuilder::start_client_session`]: crate::SessionBuilder::start_client_session
pub struct ClientSession<C: Channel> {
    channel: C,
    state: PredictionState,
    engine: PredictionEngine,
    reconciler: ClientReconciler,
    batches_sent: u64,
    commands_sent: u64,
    acks_received: u64,
    last_correction: f32,
    max_correction: f32,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<C: Channel> std::fmt::Debug for ClientSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            channel: _,
            state,
            engine,
            reconciler,
            batches_sent,
            commands_sent,
            acks_received,
            last_correction,
            max_correction,
            violation_observer,
        } = self;

        f.debug_struct("ClientSession")
            .field("state", state)
            .field("engine", engine)
            .field("reconciler", reconciler)
            .field("batches_sent", batches_sent)
            .field("commands_sent", commands_sent)
            .field("acks_received", acks_received)
            .field("last_correction", last_correction)
            .field("max_correction", max_correction)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: Channel> ClientSession<C> {
    pub(crate) fn new(
        channel: C,
        spawn: Position,
        engine: PredictionEngine,
        violation_observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        let reconciler = ClientReconciler::new(engine.displacement());
        Self {
            channel,
            state: PredictionState::new(spawn),
            engine,
            reconciler,
            batches_sent: 0,
            commands_sent: 0,
            acks_received: 0,
            last_correction: 0.0,
            max_correction: 0.0,
            violation_observer,
        }
    }

    /// Runs one simulation tick: predicts `input` locally and, if the flush
    /// interval has elapsed, sends the buffered commands to the server.
    ///
    /// # Errors
    ///
    /// Propagates [`RampartError::UnacknowledgedOverflow`] and
    /// [`RampartError::SequenceExhausted`] from the prediction engine. A batch
    /// that was due on a failing tick stays buffered and goes out on the next
    /// tick, or right away through [`flush`](Self::flush).
    pub fn advance_tick(&mut self, input: InputState, elapsed: Duration) -> Result<(), RampartError> {
        match self.engine.tick(&mut self.state, input, elapsed) {
            Ok(Some(batch)) => self.send_batch(batch),
            Ok(None) => {},
            Err(err @ RampartError::UnacknowledgedOverflow { pending, limit }) => {
                report_violation_to!(
                    &self.violation_observer,
                    ViolationSeverity::Error,
                    ViolationKind::Buffer,
                    "Unacknowledged buffer full ({} of {}); input dropped until resynchronized",
                    pending,
                    limit
                );
                return Err(err);
            },
            Err(err @ RampartError::SequenceExhausted) => {
                report_violation_to!(
                    &self.violation_observer,
                    ViolationSeverity::Critical,
                    ViolationKind::Sequencing,
                    "Sequence ids exhausted with {} commands unacknowledged; no further input can be captured",
                    self.state.unacknowledged().len()
                );
                return Err(err);
            },
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Sends whatever is buffered right away. Returns `true` if a batch was sent.
    pub fn flush(&mut self) -> bool {
        match self.engine.flush(&mut self.state) {
            Some(batch) => {
                self.send_batch(batch);
                true
            },
            None => false,
        }
    }

    /// Receives and applies every pending acknowledgement, in arrival order.
    ///
    /// Returns one [`Correction`] per acknowledgement applied.
    pub fn poll_remote(&mut self) -> Vec<Correction> {
        let mut corrections = Vec::new();
        for msg in self.channel.receive_all_messages() {
            match msg.body {
                MessageBody::Acknowledgement(ack) => {
                    let correction = self.reconciler.apply(&mut self.state, &ack);
                    if let (0, Some(&first)) = (correction.acknowledged, ack.acknowledged_ids.first()) {
                        let violation = ProtocolViolation::new(
                            ViolationSeverity::Warning,
                            ViolationKind::Acknowledgement,
                            format!(
                                "Acknowledgement for {} ids matched no pending command",
                                ack.acknowledged_ids.len()
                            ),
                            concat!(file!(), ":", line!()),
                        )
                        .with_sequence(first);
                        report_to_observer(self.violation_observer.as_ref(), &violation);
                    }
                    self.acks_received += 1;
                    self.last_correction = correction.error;
                    self.max_correction = self.max_correction.max(correction.error);
                    if !correction.is_seamless() {
                        debug!(
                            error = correction.error,
                            replayed = correction.replayed,
                            "Prediction corrected by authority"
                        );
                    }
                    corrections.push(correction);
                },
                MessageBody::InputBatch(batch) => {
                    report_violation_to!(
                        &self.violation_observer,
                        ViolationSeverity::Warning,
                        ViolationKind::NetworkProtocol,
                        "Client received an input batch of {} commands; only the server accepts input",
                        batch.len()
                    );
                },
            }
        }
        corrections
    }

    /// The predicted position to render.
    #[must_use]
    pub fn local_position(&self) -> Position {
        self.state.local_position()
    }

    /// Commands sent or buffered but not yet acknowledged, oldest first.
    #[must_use]
    pub fn unacknowledged(&self) -> &VecDeque<InputCommand> {
        self.state.unacknowledged()
    }

    /// Read access to the full prediction state.
    #[must_use]
    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    /// Counters for this session.
    #[must_use]
    pub fn stats(&self) -> PredictionStats {
        PredictionStats {
            pending_outbound: self.state.outbound().len(),
            unacknowledged: self.state.unacknowledged().len(),
            batches_sent: self.batches_sent,
            commands_sent: self.commands_sent,
            acks_received: self.acks_received,
            last_correction: self.last_correction,
            max_correction: self.max_correction,
        }
    }

    /// Discards all buffered commands and snaps to `authoritative`.
    ///
    /// See [`PredictionState::resynchronize`].
    pub fn resynchronize(&mut self, authoritative: Position) {
        self.state.resynchronize(authoritative);
    }

    /// The underlying channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The underlying channel, mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    fn send_batch(&mut self, batch: InputBatch) {
        self.batches_sent += 1;
        self.commands_sent += batch.len() as u64;
        debug!(
            commands = batch.len(),
            first = ?batch.first_id(),
            last = ?batch.last_id(),
            "Sending input batch"
        );
        self.channel.send(&Message::input_batch(batch));
    }
}
