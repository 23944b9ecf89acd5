//! Counters exposed by client and server sessions.

/// Statistics about one client session.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[must_use = "PredictionStats should be inspected or used after being queried"]
pub struct PredictionStats {
    /// Commands captured since the last flush.
    pub pending_outbound: usize,
    /// Commands sent but not yet acknowledged. A growing value means the
    /// server is slow to answer or messages are being lost.
    pub unacknowledged: usize,
    /// Input batches sent to the server.
    pub batches_sent: u64,
    /// Commands sent to the server, across all batches.
    pub commands_sent: u64,
    /// Acknowledgements applied.
    pub acks_received: u64,
    /// Correction distance of the most recent acknowledgement.
    pub last_correction: f32,
    /// Largest correction distance seen so far.
    pub max_correction: f32,
}

impl PredictionStats {
    /// Creates a new `PredictionStats` instance with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for PredictionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            pending_outbound,
            unacknowledged,
            batches_sent,
            commands_sent,
            acks_received,
            last_correction,
            max_correction,
        } = self;

        write!(
            f,
            "PredictionStats {{ outbound: {}, unacked: {}, batches: {}, commands: {}, acks: {}, correction: {:.3} (max {:.3}) }}",
            pending_outbound,
            unacknowledged,
            batches_sent,
            commands_sent,
            acks_received,
            last_correction,
            max_correction
        )
    }
}

/// Statistics about one client's entity on the server.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "AuthorityStats should be inspected or used after being queried"]
pub struct AuthorityStats {
    /// Input batches processed.
    pub batches_processed: u64,
    /// Commands whose displacement was applied.
    pub commands_applied: u64,
    /// Commands acknowledged but skipped because their id was already processed.
    pub duplicates_discarded: u64,
}

impl AuthorityStats {
    /// Creates a new `AuthorityStats` instance with default values.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Display for AuthorityStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            batches_processed,
            commands_applied,
            duplicates_discarded,
        } = self;

        write!(
            f,
            "AuthorityStats {{ batches: {}, applied: {}, duplicates: {} }}",
            batches_processed, commands_applied, duplicates_discarded
        )
    }
}
