//! Fuzz target for session configuration.
//!
//! This target tests that arbitrary configuration values are handled gracefully
//! by `SessionBuilder`, `PredictionConfig` and `Displacement`.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary configuration values
//! - Invalid values are rejected with an error, valid ones start sessions
//! - Client and server agree on what is valid

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use rampart::{
    Displacement, DuplicatePolicy, InputState, LocalChannel, Position, PredictionConfig,
    SessionBuilder,
};
use web_time::Duration;

/// Arbitrary configuration inputs for the session builder
#[derive(Debug, Arbitrary)]
struct FuzzConfig {
    updates_per_second: u32,
    /// Zero means "unbounded"
    max_unacknowledged: u16,
    /// Raw step, including NaN and infinities
    step: f32,
    apply_duplicates: bool,
    spawn: (f32, f32, f32),
    ticks: u8,
}

fuzz_target!(|config: FuzzConfig| {
    let prediction = PredictionConfig {
        updates_per_second: config.updates_per_second,
        max_unacknowledged: (config.max_unacknowledged > 0)
            .then_some(usize::from(config.max_unacknowledged)),
    };
    let _ = prediction.validate();
    let _ = prediction.flush_interval();

    let displacement = Displacement::new(config.step);
    if config.step.is_finite() {
        assert!(displacement.is_ok(), "finite steps are accepted");
    } else {
        assert!(displacement.is_err(), "non-finite steps are rejected");
    }

    let policy = if config.apply_duplicates {
        DuplicatePolicy::Apply
    } else {
        DuplicatePolicy::Discard
    };
    let mut builder = SessionBuilder::new()
        .with_prediction_config(prediction)
        .with_duplicate_policy(policy);
    if let Ok(displacement) = displacement {
        builder = builder.with_displacement(displacement);
    }

    let (client_end, server_end) = LocalChannel::pair();
    let spawn = Position::new(config.spawn.0, config.spawn.1, config.spawn.2);
    let client = builder.clone().start_client_session(client_end, spawn);
    let server = builder.start_server_session::<LocalChannel>();

    assert_eq!(client.is_ok(), prediction.validate().is_ok());
    let (Ok(mut client), Ok(mut server)) = (client, server) else {
        return;
    };
    if server.add_client(rampart::ClientId::new(0), server_end, spawn).is_err() {
        return;
    }

    for tick in 0..config.ticks {
        let input = InputState::new(tick % 3 == 0, tick % 2 == 0);
        if client.advance_tick(input, Duration::from_millis(16)).is_err() {
            break;
        }
        server.poll();
        let _ = client.poll_remote();
    }
});
