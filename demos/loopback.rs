//! # Loopback demo
//!
//! Runs one client and one server in the same process, joined by a pair of
//! chaos channels, and prints where each side thinks the avatar is once per
//! simulated second.
//!
//! Run with: `cargo run --example loopback -- --seconds 10 --latency 6 --jitter 3`

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::disallowed_macros,
    clippy::unwrap_used,
    clippy::expect_used
)]

use clap::Parser;
use rampart::rng::{Pcg32, Rng, SeedableRng};
use rampart::{
    ChaosChannel, ChaosConfig, ClientId, Displacement, DuplicatePolicy, InputState, LocalChannel,
    Position, SessionBuilder,
};
use tracing::info;
use web_time::Duration;

const FPS: u32 = 60;

#[derive(Parser)]
struct Opt {
    /// Simulated seconds to run
    #[arg(short, long, default_value_t = 10)]
    seconds: u32,
    /// Batches sent to the server per second
    #[arg(short, long, default_value_t = 4)]
    updates_per_second: u32,
    /// One-way delay in ticks
    #[arg(short, long, default_value_t = 0)]
    latency: u32,
    /// Extra random delay in ticks
    #[arg(short, long, default_value_t = 0)]
    jitter: u32,
    /// Probability of a message being delivered twice
    #[arg(long, default_value_t = 0.0)]
    duplication: f64,
    /// Apply duplicated commands instead of discarding them
    #[arg(long)]
    apply_duplicates: bool,
    /// Distance moved per command
    #[arg(long, default_value_t = 0.1)]
    step: f32,
    /// Seed for input generation and fault injection
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // configure logging: output Rampart logs to standard out
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    )
    .expect("setting up tracing subscriber failed");

    let opt = Opt::parse();
    let tick = Duration::from_secs(1) / FPS;

    let policy = if opt.apply_duplicates {
        DuplicatePolicy::Apply
    } else {
        DuplicatePolicy::Discard
    };
    let builder = SessionBuilder::new()
        .with_updates_per_second(opt.updates_per_second)
        .with_displacement(Displacement::new(opt.step)?)
        .with_duplicate_policy(policy);

    let chaos = |seed| {
        ChaosConfig::builder()
            .latency_ticks(opt.latency)
            .jitter_ticks(opt.jitter)
            .duplication_rate(opt.duplication)
            .seed(seed)
            .build()
    };
    let id = ClientId::new(1);
    let (client_end, server_end) = LocalChannel::pair();
    let mut client = builder
        .clone()
        .start_client_session(ChaosChannel::new(client_end, chaos(opt.seed)), Position::ZERO)?;
    let mut server = builder.start_server_session()?;
    server.add_client(
        id,
        ChaosChannel::new(server_end, chaos(opt.seed.wrapping_add(1))),
        Position::ZERO,
    )?;

    // A "player" who changes their mind about twice a second.
    let mut rng = Pcg32::seed_from_u64(opt.seed);
    let mut held = InputState::IDLE;

    for frame in 0..opt.seconds * FPS {
        if rng.gen_bool(1.0 / 30.0) {
            held = InputState::new(rng.gen_bool(0.5), rng.gen_bool(0.5));
        }
        client.advance_tick(held, tick)?;
        server.poll();
        for correction in client.poll_remote() {
            if !correction.is_seamless() {
                info!(error = correction.error, "Visible correction");
            }
        }

        if (frame + 1) % FPS == 0 {
            println!(
                "t={:>3}s client={} server={} unacked={}",
                (frame + 1) / FPS,
                client.local_position(),
                server.server_position(id)?,
                client.unacknowledged().len(),
            );
        }
    }

    // Let everything in flight arrive.
    client.flush();
    while !client.unacknowledged().is_empty() {
        client.advance_tick(InputState::IDLE, tick)?;
        server.poll();
        let _ = client.poll_remote();
    }

    println!("{}", client.stats());
    println!("{}", server.stats(id)?);
    println!(
        "final: client={} server={}",
        client.local_position(),
        server.server_position(id)?
    );
    Ok(())
}
