//! Resilience of sessions running over chaos links.
//!
//! Latency, jitter and duplication are conditions the protocol tolerates:
//! the client must end up exactly where the server is, with no visible
//! corrections when every step is exact. Loss breaks the reliability
//! assumption; the tests show the symptom and the recovery path.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use crate::common::{init_tracing, quarter, Loopback, CLIENT};
use rampart::rng::{Pcg32, Rng, SeedableRng};
use rampart::{ChaosConfig, DuplicatePolicy, InputState, Position, SessionBuilder};

fn random_input(rng: &mut Pcg32) -> InputState {
    InputState::new(rng.gen_bool(0.4), rng.gen_bool(0.4))
}

fn quarter_builder() -> SessionBuilder {
    SessionBuilder::new().with_displacement(quarter())
}

#[test]
fn latency_and_jitter_never_show_as_corrections() {
    init_tracing();
    let chaos = ChaosConfig::builder()
        .latency_ticks(6)
        .jitter_ticks(3)
        .seed(42)
        .build();
    let mut link = Loopback::new(quarter_builder(), chaos);
    let mut rng = Pcg32::seed_from_u64(7);

    for _ in 0..600 {
        link.step(random_input(&mut rng)).unwrap();
    }
    link.settle();

    assert!(!link.corrections.is_empty());
    assert!(link.corrections.iter().all(|c| c.is_seamless()));
    assert_eq!(link.client.local_position(), link.server_position());
}

#[test]
fn in_flight_commands_grow_with_latency() {
    let fast = {
        let mut link = Loopback::new(quarter_builder(), ChaosConfig::passthrough());
        for _ in 0..120 {
            link.step(InputState::RIGHT).unwrap();
        }
        link.client.unacknowledged().len()
    };
    let slow = {
        let mut link = Loopback::new(quarter_builder(), ChaosConfig::high_latency(30));
        for _ in 0..120 {
            link.step(InputState::RIGHT).unwrap();
        }
        link.client.unacknowledged().len()
    };
    assert!(slow > fast, "slow={slow} fast={fast}");
}

#[test]
fn duplicated_batches_are_applied_once() {
    let chaos = ChaosConfig::builder()
        .duplication_rate(1.0)
        .latency_ticks(2)
        .seed(3)
        .build();
    let mut link = Loopback::new(quarter_builder(), chaos);

    for _ in 0..90 {
        link.step(InputState::RIGHT).unwrap();
    }
    link.settle();

    // 90 rights at a quarter step each.
    assert_eq!(link.server_position(), Position::new(22.5, 0.0, 0.0));
    assert_eq!(link.client.local_position(), link.server_position());
    assert!(link.corrections.iter().all(|c| c.is_seamless()));

    let stats = link.server.stats(CLIENT).unwrap();
    assert_eq!(stats.commands_applied, 90);
    assert_eq!(stats.duplicates_discarded, 90);
}

#[test]
fn applying_duplicates_desynchronizes_authority_from_intent() {
    // Duplicate only the client's outgoing traffic.
    let client_chaos = ChaosConfig::builder().duplication_rate(1.0).build();
    let mut link = Loopback::with_links(
        quarter_builder().with_duplicate_policy(DuplicatePolicy::Apply),
        client_chaos,
        ChaosConfig::passthrough(),
    );

    for _ in 0..30 {
        link.step(InputState::RIGHT).unwrap();
    }
    link.settle();

    // Every command counted twice; the client still snaps to the authority.
    assert_eq!(link.server_position(), Position::new(15.0, 0.0, 0.0));
    assert_eq!(link.client.local_position(), link.server_position());
    assert!(link.client.stats().max_correction > 0.0);
}

#[test]
fn lost_batches_stay_unacknowledged_until_resynchronized() {
    let mut link = Loopback::new(quarter_builder(), ChaosConfig::passthrough());
    for _ in 0..30 {
        link.step(InputState::RIGHT).unwrap();
    }
    link.settle();

    // The client's uplink drops everything for a while.
    link.client
        .channel_mut()
        .set_config(ChaosConfig::builder().loss_rate(1.0).build());
    for _ in 0..30 {
        link.step(InputState::RIGHT).unwrap();
    }
    link.client.flush();
    let lost = link.client.unacknowledged().len();
    assert_eq!(lost, 30);

    // Uplink restored: later batches are acknowledged, the lost ones never are
    // and keep getting replayed on top of every authoritative position.
    link.client
        .channel_mut()
        .set_config(ChaosConfig::passthrough());
    for _ in 0..30 {
        link.step(InputState::LEFT).unwrap();
    }
    link.client.flush();
    link.server.poll();
    let _ = link.client.poll_remote();

    assert_eq!(link.client.unacknowledged().len(), lost);
    assert_eq!(link.server_position(), Position::new(0.0, 0.0, 0.0));
    assert_eq!(link.client.local_position(), Position::new(7.5, 0.0, 0.0));

    link.client.resynchronize(link.server_position());
    for _ in 0..30 {
        link.step(InputState::RIGHT).unwrap();
    }
    link.settle();
    assert_eq!(link.client.local_position(), link.server_position());
    assert_eq!(link.server_position(), Position::new(7.5, 0.0, 0.0));
}

#[test]
fn poor_network_converges_over_a_long_session() {
    let mut link = Loopback::with_links(
        quarter_builder().with_updates_per_second(10),
        ChaosConfig {
            seed: 11,
            ..ChaosConfig::poor_network()
        },
        ChaosConfig {
            seed: 12,
            ..ChaosConfig::poor_network()
        },
    );
    let mut rng = Pcg32::seed_from_u64(2024);
    let mut expected = 0.0_f32;

    for _ in 0..3_000 {
        let input = random_input(&mut rng);
        expected += match input.resolve() {
            rampart::InputSymbol::Right => 0.25,
            rampart::InputSymbol::Left => -0.25,
            rampart::InputSymbol::None => 0.0,
        };
        link.step(input).unwrap();
    }
    link.settle();

    assert_eq!(link.server_position(), Position::new(expected, 0.0, 0.0));
    assert_eq!(link.client.local_position(), link.server_position());
    assert!(link.corrections.iter().all(|c| c.is_seamless()));
}
