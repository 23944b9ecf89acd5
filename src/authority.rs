//! Server-side authority: integrates input batches into the authoritative position.

use std::sync::Arc;

use tracing::trace;

use crate::command::{AckIds, Acknowledgement, InputBatch};
use crate::input::{Displacement, InputState};
use crate::network::stats::AuthorityStats;
use crate::telemetry::{report_to_observer, ProtocolViolation, ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{Position, SequenceId};

/// What the authority does with a command whose id it has already processed.
///
/// The protocol assumes a transport that never duplicates messages. Under
/// that assumption both policies behave identically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DuplicatePolicy {
    /// Skip commands at or below the highest id already processed. They are
    /// still acknowledged, which is harmless on the client.
    #[default]
    Discard,
    /// Apply every received command, duplicates included.
    Apply,
}

/// Ground truth for one client's entity.
///
/// Created when the server spawns the entity. Only [`ReconciliationEngine`]
/// moves it, and client input can never roll it back.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoritativeState {
    server_position: Position,
    highest_processed: Option<SequenceId>,
    stats: AuthorityStats,
}

impl AuthoritativeState {
    /// Creates the authoritative state for an entity spawned at `spawn`.
    #[must_use]
    pub fn new(spawn: Position) -> Self {
        Self {
            server_position: spawn,
            highest_processed: None,
            stats: AuthorityStats::default(),
        }
    }

    /// The authoritative position.
    #[inline]
    #[must_use]
    pub fn server_position(&self) -> Position {
        self.server_position
    }

    /// The highest sequence id applied so far.
    #[must_use]
    pub fn highest_processed(&self) -> Option<SequenceId> {
        self.highest_processed
    }

    /// Counters for this entity.
    #[must_use]
    pub fn stats(&self) -> AuthorityStats {
        self.stats
    }

    fn is_duplicate(&self, id: SequenceId) -> bool {
        self.highest_processed.is_some_and(|highest| id <= highest)
    }
}

/// Applies client batches to authoritative state and produces acknowledgements.
///
/// No input legality checks are performed beyond the displacement mapping.
#[derive(Clone, Default)]
pub struct ReconciliationEngine {
    displacement: Displacement,
    duplicate_policy: DuplicatePolicy,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            displacement,
            duplicate_policy,
            violation_observer,
        } = self;

        f.debug_struct("ReconciliationEngine")
            .field("displacement", displacement)
            .field("duplicate_policy", duplicate_policy)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl ReconciliationEngine {
    /// Creates an engine with the default [`DuplicatePolicy`].
    #[must_use]
    pub fn new(displacement: Displacement) -> Self {
        Self {
            displacement,
            duplicate_policy: DuplicatePolicy::default(),
            violation_observer: None,
        }
    }

    /// Sets the duplicate policy.
    #[must_use]
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Routes violations to `observer` instead of the tracing log.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        self.violation_observer = observer;
        self
    }

    /// The displacement function used for integration.
    #[must_use]
    pub fn displacement(&self) -> Displacement {
        self.displacement
    }

    /// The active duplicate policy.
    #[must_use]
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy
    }

    /// Processes one batch in received order.
    ///
    /// Each applied command's displacement is added in sequence order to a
    /// copy of the authoritative position, which is committed in a single
    /// update at the end. The order of additions matches the client's
    /// prediction and replay exactly. The acknowledgement carries the
    /// post-update position and every id of the batch, including ids that were
    /// skipped as duplicates.
    pub fn process_batch(&self, state: &mut AuthoritativeState, batch: &InputBatch) -> Acknowledgement {
        if !batch.is_ascending() {
            let mut violation = ProtocolViolation::new(
                ViolationSeverity::Error,
                ViolationKind::Sequencing,
                format!("Batch of {} commands is not in ascending sequence order", batch.len()),
                concat!(file!(), ":", line!()),
            )
            .with_context("batch_len", batch.len().to_string());
            if let Some(first) = batch.first_id() {
                violation = violation.with_sequence(first);
            }
            report_to_observer(self.violation_observer.as_ref(), &violation);
        }

        let mut next = state.server_position;
        let mut acknowledged_ids = AckIds::with_capacity(batch.len());
        let mut applied = 0usize;
        let mut skipped = 0usize;
        let mut first_skipped = None;

        for command in &batch.commands {
            acknowledged_ids.push(command.sequence_id);
            if self.duplicate_policy == DuplicatePolicy::Discard && state.is_duplicate(command.sequence_id) {
                skipped += 1;
                first_skipped.get_or_insert(command.sequence_id);
                continue;
            }
            next += self.displacement.apply(command.symbol);
            state.highest_processed = Some(
                state
                    .highest_processed
                    .map_or(command.sequence_id, |highest| highest.max(command.sequence_id)),
            );
            applied += 1;
        }

        if let Some(first) = first_skipped {
            let violation = ProtocolViolation::new(
                ViolationSeverity::Warning,
                ViolationKind::Sequencing,
                format!("Skipped {skipped} already-processed commands"),
                concat!(file!(), ":", line!()),
            )
            .with_sequence(first)
            .with_context("batch_len", batch.len().to_string())
            .with_context("highest_processed", format!("{:?}", state.highest_processed));
            report_to_observer(self.violation_observer.as_ref(), &violation);
        }

        state.server_position = next;
        state.stats.batches_processed += 1;
        state.stats.commands_applied += applied as u64;
        state.stats.duplicates_discarded += skipped as u64;

        trace!(
            applied,
            skipped,
            position = %state.server_position,
            "Processed input batch"
        );

        Acknowledgement::new(state.server_position, acknowledged_ids)
    }

    /// Applies one tick of input that the authority owns itself.
    ///
    /// This is the listen-server path: the hosting peer's own entity is moved
    /// straight away with the same displacement and tie-break as client input.
    /// Nothing is buffered, no sequence id is allocated and no acknowledgement
    /// is produced.
    pub fn apply_host_input(&self, state: &mut AuthoritativeState, input: InputState) -> Position {
        let symbol = input.resolve();
        if symbol.is_some() {
            state.server_position += self.displacement.apply(symbol);
            state.stats.commands_applied += 1;
            trace!(symbol = ?symbol, position = %state.server_position, "Applied host input");
        }
        state.server_position
    }
}
