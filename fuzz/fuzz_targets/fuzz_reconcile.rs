//! Fuzz target for the prediction and reconciliation engines.
//!
//! Arbitrary sequences of ticks, flushes, deliveries, duplicate deliveries
//! and resynchronizations are applied to one client and one server.
//!
//! # Safety Properties Tested
//! - No panics on any operation sequence
//! - The unacknowledged buffer stays strictly ascending
//! - Sequence ids are never reused, even across resynchronization
//! - Acknowledging a batch twice never moves the client

#![no_main]

use std::collections::VecDeque;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rampart::{
    AuthoritativeState, ClientReconciler, Displacement, InputBatch, InputState, Position,
    PredictionConfig, PredictionEngine, PredictionState, ReconciliationEngine,
};
use web_time::Duration;

#[derive(Debug, Arbitrary)]
enum Op {
    Tick { left: bool, right: bool, millis: u8 },
    Flush,
    Deliver,
    DeliverTwice,
    Drop,
    Resynchronize,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    updates_per_second: u8,
    max_unacknowledged: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: FuzzInput| {
    let config = PredictionConfig {
        updates_per_second: u32::from(input.updates_per_second.max(1)),
        max_unacknowledged: (input.max_unacknowledged > 0)
            .then_some(usize::from(input.max_unacknowledged)),
    };
    let displacement = Displacement::default();
    let Ok(mut engine) = PredictionEngine::new(config, displacement) else {
        return;
    };
    let authority = ReconciliationEngine::new(displacement);
    let reconciler = ClientReconciler::new(displacement);
    let mut client = PredictionState::new(Position::ZERO);
    let mut server = AuthoritativeState::new(Position::ZERO);
    let mut in_flight: VecDeque<InputBatch> = VecDeque::new();
    let mut next_id = client.next_sequence_id();

    for op in input.ops.into_iter().take(1024) {
        match op {
            Op::Tick { left, right, millis } => {
                let elapsed = Duration::from_millis(u64::from(millis));
                if let Ok(Some(batch)) = engine.tick(&mut client, InputState::new(left, right), elapsed) {
                    in_flight.push_back(batch);
                }
            }
            Op::Flush => {
                if let Some(batch) = engine.flush(&mut client) {
                    assert!(!batch.is_empty(), "flush never yields an empty batch");
                    in_flight.push_back(batch);
                }
            }
            Op::Deliver => {
                if let Some(batch) = in_flight.pop_front() {
                    let ack = authority.process_batch(&mut server, &batch);
                    let _ = reconciler.apply(&mut client, &ack);
                }
            }
            Op::DeliverTwice => {
                if let Some(batch) = in_flight.pop_front() {
                    let ack = authority.process_batch(&mut server, &batch);
                    let _ = reconciler.apply(&mut client, &ack);
                    let settled = client.local_position();
                    let again = authority.process_batch(&mut server, &batch);
                    let _ = reconciler.apply(&mut client, &again);
                    assert_eq!(client.local_position(), settled, "repeated ack moved the client");
                }
            }
            Op::Drop => {
                in_flight.pop_front();
            }
            Op::Resynchronize => {
                client.resynchronize(server.server_position());
            }
        }

        let pending = client.unacknowledged();
        assert!(
            pending
                .iter()
                .zip(pending.iter().skip(1))
                .all(|(a, b)| a.sequence_id < b.sequence_id),
            "unacknowledged buffer out of order"
        );
        let next = client.next_sequence_id();
        assert!(
            next.is_none() || next >= next_id,
            "sequence ids went backwards"
        );
        next_id = next;
    }
});
