//! Metamorphic tests: pairs of runs whose outcomes must be related.
//!
//! None of these check an absolute answer. Each changes one knob the
//! protocol promises not to care about (flush rate, link delay, delivery
//! schedule, spawn point) and checks the outcome moves accordingly.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::{input, quarter, Loopback, CLIENT};
use proptest::prelude::*;
use rampart::{
    ChaosChannel, ChaosConfig, Displacement, InputState, LocalChannel, Position, SessionBuilder,
};

fn inputs_strategy() -> impl Strategy<Value = Vec<(bool, bool)>> {
    prop::collection::vec(any::<(bool, bool)>(), 1..240)
}

/// Runs `inputs` through a loopback and returns the settled `(client, server)` positions.
fn run(builder: SessionBuilder, chaos: ChaosConfig, inputs: &[(bool, bool)]) -> (Position, Position) {
    run_at(quarter(), builder, chaos, inputs)
}

fn run_at(
    displacement: Displacement,
    builder: SessionBuilder,
    chaos: ChaosConfig,
    inputs: &[(bool, bool)],
) -> (Position, Position) {
    let mut link = Loopback::new(builder.with_displacement(displacement), chaos);
    for &held in inputs {
        link.step(input(held)).unwrap();
    }
    link.settle();
    (link.client.local_position(), link.server_position())
}

proptest! {
    // Each case drives whole sessions; keep the count modest.
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Batching more or less often never changes where the entity ends up.
    #[test]
    fn flush_rate_does_not_change_outcome(
        inputs in inputs_strategy(),
        slow in 1u32..5,
        fast in 10u32..61,
    ) {
        let a = run(SessionBuilder::new().with_updates_per_second(slow), ChaosConfig::passthrough(), &inputs);
        let b = run(SessionBuilder::new().with_updates_per_second(fast), ChaosConfig::passthrough(), &inputs);
        prop_assert_eq!(a, b);
        prop_assert_eq!(a.0, a.1);
    }

    /// The same holds bit for bit at the default step, which `f32` cannot
    /// represent exactly.
    #[test]
    fn flush_rate_does_not_change_outcome_at_the_default_step(
        inputs in inputs_strategy(),
        slow in 1u32..5,
        fast in 10u32..61,
    ) {
        let step = Displacement::default();
        let a = run_at(step, SessionBuilder::new().with_updates_per_second(slow), ChaosConfig::passthrough(), &inputs);
        let b = run_at(step, SessionBuilder::new().with_updates_per_second(fast), ChaosConfig::passthrough(), &inputs);
        prop_assert_eq!(a, b);
        prop_assert_eq!(a.0, a.1);
    }

    /// Delay on the link changes when corrections arrive, never the result.
    #[test]
    fn link_delay_does_not_change_outcome(
        inputs in inputs_strategy(),
        latency in 0u32..20,
        jitter in 0u32..8,
        seed in any::<u64>(),
    ) {
        let delayed = ChaosConfig::builder()
            .latency_ticks(latency)
            .jitter_ticks(jitter)
            .seed(seed)
            .build();
        let a = run(SessionBuilder::new(), ChaosConfig::passthrough(), &inputs);
        let b = run(SessionBuilder::new(), delayed, &inputs);
        prop_assert_eq!(a, b);
    }

    /// Moving the spawn point moves the final position by the same offset.
    #[test]
    fn spawn_offset_carries_through(
        inputs in inputs_strategy(),
        dx in -16i32..16,
        dy in -16i32..16,
    ) {
        let offset = Position::new(dx as f32, dy as f32, 0.0);
        let builder = SessionBuilder::new().with_displacement(quarter());

        let mut at_origin = Loopback::new(builder.clone(), ChaosConfig::passthrough());
        let mut shifted = Loopback::new(builder, ChaosConfig::passthrough());
        shifted.client.resynchronize(offset);
        shifted.server.remove_client(CLIENT).unwrap();
        // Re-register at the offset so both ends agree on the spawn.
        let (client_end, server_end) = LocalChannel::pair();
        shifted
            .server
            .add_client(
                CLIENT,
                ChaosChannel::new(server_end, ChaosConfig::passthrough()),
                offset,
            )
            .unwrap();
        *shifted.client.channel_mut() = ChaosChannel::new(client_end, ChaosConfig::passthrough());

        for &held in &inputs {
            at_origin.step(input(held)).unwrap();
            shifted.step(input(held)).unwrap();
        }
        at_origin.settle();
        shifted.settle();

        prop_assert_eq!(shifted.server_position(), at_origin.server_position() + offset);
        prop_assert_eq!(shifted.client.local_position(), shifted.server_position());
    }

    /// Holding both directions is indistinguishable from holding only "right".
    #[test]
    fn both_held_matches_right_held(inputs in inputs_strategy()) {
        let normalized: Vec<_> = inputs
            .iter()
            .map(|&(left, right)| if left && right { (false, true) } else { (left, right) })
            .collect();
        let a = run(SessionBuilder::new(), ChaosConfig::passthrough(), &inputs);
        let b = run(SessionBuilder::new(), ChaosConfig::passthrough(), &normalized);
        prop_assert_eq!(a, b);
        prop_assert_eq!(InputState::BOTH.resolve(), InputState::RIGHT.resolve());
    }
}
