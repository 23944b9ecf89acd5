//! Property-based tests for the prediction and reconciliation engines.
//!
//! The engines are driven directly, without channels, so that every
//! interleaving of capture, flush and acknowledgement can be generated.
//!
//! # Properties
//!
//! - Sequence ids are dense, strictly ascending and never reused
//! - Every batch is non-empty and ascending
//! - After any acknowledgement the local position is the authoritative
//!   position plus the replay of the remaining buffer, with no visible
//!   correction, at the default step as well as at an exact one
//! - Applying an acknowledgement twice equals applying it once
//! - Once every batch is acknowledged, client and server agree exactly

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::collections::VecDeque;

use crate::common::{input, quarter, TICK};
use proptest::prelude::*;
use rampart::test_config::miri_case_count;
use rampart::{
    Acknowledgement, AuthoritativeState, ClientReconciler, Correction, Displacement, InputBatch,
    InputSymbol, Position, PredictionConfig, PredictionEngine, PredictionState,
    ReconciliationEngine, SequenceId,
};

// ============================================================================
// Strategies
// ============================================================================

/// One simulation step: the held directions, and whether the server gets to
/// answer the oldest batch in flight.
fn step_strategy() -> impl Strategy<Value = ((bool, bool), bool)> {
    (any::<(bool, bool)>(), prop::bool::weighted(0.3))
}

fn schedule_strategy() -> impl Strategy<Value = Vec<((bool, bool), bool)>> {
    prop::collection::vec(step_strategy(), 1..300)
}

fn rate_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![Just(1), Just(4), Just(10), Just(20), Just(60)]
}

/// An exactly representable step, and the default one, which is not.
fn displacement_strategy() -> impl Strategy<Value = Displacement> {
    prop_oneof![Just(quarter()), Just(Displacement::default())]
}

fn spawn_strategy() -> impl Strategy<Value = Position> {
    (-64i32..64, -64i32..64, -64i32..64)
        .prop_map(|(x, y, z)| Position::new(x as f32 * 0.5, y as f32 * 0.5, z as f32 * 0.5))
}

// ============================================================================
// Harness
// ============================================================================

struct Sim {
    displacement: Displacement,
    engine: PredictionEngine,
    client: PredictionState,
    authority: ReconciliationEngine,
    server: AuthoritativeState,
    reconciler: ClientReconciler,
    in_flight: VecDeque<InputBatch>,
    batches: Vec<InputBatch>,
    intended: Position,
}

impl Sim {
    fn new(updates_per_second: u32, spawn: Position) -> Self {
        Self::with_displacement(updates_per_second, spawn, quarter())
    }

    fn with_displacement(updates_per_second: u32, spawn: Position, displacement: Displacement) -> Self {
        let config = PredictionConfig {
            updates_per_second,
            ..PredictionConfig::default()
        };
        Self {
            displacement,
            engine: PredictionEngine::new(config, displacement).unwrap(),
            client: PredictionState::new(spawn),
            authority: ReconciliationEngine::new(displacement),
            server: AuthoritativeState::new(spawn),
            reconciler: ClientReconciler::new(displacement),
            in_flight: VecDeque::new(),
            batches: Vec::new(),
            intended: spawn,
        }
    }

    fn tick(&mut self, held: (bool, bool)) {
        let state = input(held);
        self.intended += self.displacement.apply(state.resolve());
        if let Some(batch) = self.engine.tick(&mut self.client, state, TICK).unwrap() {
            self.send(batch);
        }
    }

    fn send(&mut self, batch: InputBatch) {
        self.batches.push(batch.clone());
        self.in_flight.push_back(batch);
    }

    /// Lets the server answer the oldest batch and the client reconcile.
    fn deliver_one(&mut self) -> Option<(Acknowledgement, Correction)> {
        let batch = self.in_flight.pop_front()?;
        let ack = self.authority.process_batch(&mut self.server, &batch);
        let correction = self.reconciler.apply(&mut self.client, &ack);
        Some((ack, correction))
    }

    fn drain(&mut self) {
        if let Some(batch) = self.engine.flush(&mut self.client) {
            self.send(batch);
        }
        while self.deliver_one().is_some() {}
    }

    fn replayed_position(&self) -> Position {
        self.client
            .unacknowledged()
            .iter()
            .fold(self.server.server_position(), |position, command| {
                position + self.displacement.apply(command.symbol)
            })
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(miri_case_count()))]

    /// Client and server agree exactly once the link drains.
    #[test]
    fn prop_drained_link_converges(
        rate in rate_strategy(),
        spawn in spawn_strategy(),
        displacement in displacement_strategy(),
        schedule in schedule_strategy(),
    ) {
        let mut sim = Sim::with_displacement(rate, spawn, displacement);
        for (held, deliver) in schedule {
            sim.tick(held);
            if deliver {
                sim.deliver_one();
            }
        }
        sim.drain();

        prop_assert!(sim.client.unacknowledged().is_empty());
        prop_assert!(sim.client.outbound().is_empty());
        prop_assert_eq!(sim.server.server_position(), sim.intended);
        prop_assert_eq!(sim.client.local_position(), sim.intended);
    }

    /// Local position is always authority plus replay of what is still pending,
    /// and an honest authority never causes a visible correction.
    #[test]
    fn prop_local_position_is_authority_plus_replay(
        rate in rate_strategy(),
        displacement in displacement_strategy(),
        schedule in schedule_strategy(),
    ) {
        let mut sim = Sim::with_displacement(rate, Position::ZERO, displacement);
        for (held, deliver) in schedule {
            sim.tick(held);
            if deliver {
                if let Some((_, correction)) = sim.deliver_one() {
                    prop_assert!(correction.is_seamless(), "step {}: {:?}", displacement.step(), correction);
                    prop_assert_eq!(sim.client.local_position(), sim.replayed_position());
                }
            }
            // Prediction alone always tracks intent exactly.
            prop_assert_eq!(sim.client.local_position(), sim.intended);
        }
    }

    /// Sequence ids are dense from zero, ascending, and never repeated.
    #[test]
    fn prop_sequence_ids_are_dense_and_unique(
        rate in rate_strategy(),
        schedule in schedule_strategy(),
    ) {
        let mut sim = Sim::new(rate, Position::ZERO);
        let mut captured = 0u32;
        for (held, deliver) in schedule {
            sim.tick(held);
            if input(held).resolve() != InputSymbol::None {
                captured += 1;
            }
            if deliver {
                sim.deliver_one();
            }

            let pending: Vec<_> = sim.client.unacknowledged().iter().map(|c| c.sequence_id).collect();
            prop_assert!(pending.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(sim.client.next_sequence_id(), Some(SequenceId::new(captured)));
        }
        sim.drain();

        let sent: Vec<u32> = sim
            .batches
            .iter()
            .flat_map(|batch| batch.commands.iter().map(|c| c.sequence_id.as_u32()))
            .collect();
        prop_assert_eq!(sent, (0..captured).collect::<Vec<_>>());
        for batch in &sim.batches {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.is_ascending());
        }
    }

    /// A repeated acknowledgement changes nothing.
    #[test]
    fn prop_repeated_acknowledgement_is_idempotent(
        rate in rate_strategy(),
        schedule in schedule_strategy(),
    ) {
        let mut sim = Sim::new(rate, Position::ZERO);
        let mut last_ack = None;
        for (held, deliver) in schedule {
            sim.tick(held);
            if deliver {
                last_ack = sim.deliver_one().map(|(ack, _)| ack).or(last_ack);
            }
        }
        prop_assume!(last_ack.is_some());
        let ack = last_ack.unwrap();

        let before = sim.client.clone();
        let correction = sim.reconciler.apply(&mut sim.client, &ack);

        prop_assert_eq!(correction.acknowledged, 0);
        prop_assert!(correction.is_seamless());
        prop_assert_eq!(sim.client, before);
    }

    /// The server integrates each batch in order, exactly once.
    #[test]
    fn prop_server_applies_each_batch_once(
        spawn in spawn_strategy(),
        displacement in displacement_strategy(),
        symbols in prop::collection::vec(
            prop_oneof![Just(InputSymbol::Left), Just(InputSymbol::Right), Just(InputSymbol::None)],
            0..64,
        ),
    ) {
        let batch = InputBatch::new(
            symbols
                .iter()
                .enumerate()
                .map(|(id, &symbol)| rampart::InputCommand::new(SequenceId::new(id as u32), symbol, spawn))
                .collect(),
        );
        let engine = ReconciliationEngine::new(displacement);
        let mut server = AuthoritativeState::new(spawn);

        let ack = engine.process_batch(&mut server, &batch);
        let expected = displacement.integrate(spawn, symbols.iter().copied());

        prop_assert_eq!(server.server_position(), expected);
        prop_assert_eq!(ack.server_position, expected);
        prop_assert_eq!(ack.acknowledged_ids.len(), symbols.len());

        let replay = engine.process_batch(&mut server, &batch);
        prop_assert_eq!(replay, ack);
    }
}
