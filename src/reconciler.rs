//! Client-side reconciliation: acknowledge, snap, replay.

use tracing::trace;

use crate::command::Acknowledgement;
use crate::input::Displacement;
use crate::prediction::PredictionState;

/// The outcome of applying one [`Acknowledgement`].
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[must_use = "Correction reports how far the prediction was off"]
pub struct Correction {
    /// Commands removed from the unacknowledged buffer by this acknowledgement.
    pub acknowledged: usize,
    /// Still-unacknowledged commands replayed on top of the authoritative position.
    pub replayed: usize,
    /// Distance between the local position before the acknowledgement and after replay.
    ///
    /// Zero whenever prediction and authority agree; anything else shows up on
    /// screen as a correction.
    pub error: f32,
}

impl Correction {
    /// Returns `true` if reconciliation left the local position where it was.
    #[must_use]
    pub fn is_seamless(&self) -> bool {
        self.error == 0.0
    }
}

/// Applies server acknowledgements to a client's [`PredictionState`].
///
/// Each buffered command moves through `Pending → Acknowledged → Removed`
/// exactly once; a removed command is never looked at again.
#[derive(Debug, Copy, Clone, Default)]
pub struct ClientReconciler {
    displacement: Displacement,
}

impl ClientReconciler {
    /// Creates a reconciler replaying with `displacement`.
    ///
    /// This must be the same displacement the prediction engine and the
    /// server use.
    #[must_use]
    pub const fn new(displacement: Displacement) -> Self {
        Self { displacement }
    }

    /// Applies one acknowledgement.
    ///
    /// 1. Removes every acknowledged id from the unacknowledged buffer. Ids
    ///    that are not present were already removed and are ignored, which
    ///    makes repeated acknowledgements harmless.
    /// 2. Sets the local position to the authoritative position.
    /// 3. Re-applies the displacement of every remaining command in ascending
    ///    order, without sending, renumbering or removing anything.
    ///
    /// The outbound buffer is left untouched.
    pub fn apply(&self, state: &mut PredictionState, ack: &Acknowledgement) -> Correction {
        let before = state.local_position();

        let buffer = state.unacknowledged_mut();
        let mut acknowledged = 0;
        for id in &ack.acknowledged_ids {
            if let Ok(index) = buffer.binary_search_by_key(id, |command| command.sequence_id) {
                if buffer.remove(index).is_some() {
                    acknowledged += 1;
                }
            }
        }

        let position = self
            .displacement
            .integrate(ack.server_position, buffer.iter().map(|command| command.symbol));
        let replayed = buffer.len();
        state.set_local_position(position);

        let correction = Correction {
            acknowledged,
            replayed,
            error: before.distance(position),
        };
        trace!(
            acknowledged,
            replayed,
            error = correction.error,
            position = %position,
            "Reconciled with authority"
        );
        correction
    }
}
