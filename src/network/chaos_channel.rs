//! A configurable channel wrapper for fault injection testing.
//!
//! [`ChaosChannel`] wraps any [`Channel`] and injects the adverse conditions
//! the protocol is expected to survive: latency, jitter and duplication.
//! Message loss can be switched on as well to observe how the client behaves
//! when the transport breaks its reliability promise.
//!
//! Time is measured in ticks. Every call to
//! [`receive_all_messages`](Channel::receive_all_messages) is one tick, which
//! matches a session that polls once per simulation step.
//!
//! # Example
//!
//! ```rust
//! use rampart::{ChaosChannel, ChaosConfig, LocalChannel};
//!
//! let config = ChaosConfig::builder()
//!     .latency_ticks(6)
//!     .jitter_ticks(3)
//!     .duplication_rate(0.1)
//!     .seed(42)
//!     .build();
//!
//! let (client, server) = LocalChannel::pair();
//! let client = ChaosChannel::new(client, config.clone());
//! let server = ChaosChannel::new(server, config);
//! ```
//!
//! # Ordering
//!
//! Jitter never reorders. A message is never delivered before one that was
//! received from the inner channel earlier; a fast message waits behind a
//! slow one.

use std::collections::VecDeque;

use crate::network::channel::Channel;
use crate::network::messages::Message;
use crate::report_violation;
use crate::rng::{Pcg32, Rng, SeedableRng};
use crate::telemetry::{ViolationKind, ViolationSeverity};

/// Seed used when none is configured.
const DEFAULT_SEED: u64 = 0x5EED_C4A0_5EED;

/// Configuration for fault injection.
///
/// Use [`ChaosConfig::builder()`] for a fluent configuration API.
/// Everything defaults to zero (no effect).
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosConfig {
    /// Ticks every message is held before delivery (default: 0)
    pub latency_ticks: u32,

    /// Maximum extra ticks added on top of the latency (default: 0).
    /// The actual extra delay is uniformly distributed in `[0, jitter_ticks]`.
    pub jitter_ticks: u32,

    /// Probability of sending a message twice (0.0 - 1.0, default: 0.0)
    pub duplication_rate: f64,

    /// Probability of silently dropping a sent message (0.0 - 1.0, default: 0.0)
    pub loss_rate: f64,

    /// Random seed; identical seeds replay identical fault sequences
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 0,
            jitter_ticks: 0,
            duplication_rate: 0.0,
            loss_rate: 0.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl ChaosConfig {
    /// Creates a new builder for fluent configuration.
    pub fn builder() -> ChaosConfigBuilder {
        ChaosConfigBuilder::new()
    }

    /// Creates a config with no chaos.
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Creates a config holding every message for `ticks` ticks.
    pub fn high_latency(ticks: u32) -> Self {
        Self {
            latency_ticks: ticks,
            ..Default::default()
        }
    }

    /// Creates a config simulating a laggy link that occasionally repeats itself.
    ///
    /// About 100 ms of latency and 50 ms of jitter at 60 Hz, with 5% duplication.
    pub fn poor_network() -> Self {
        Self {
            latency_ticks: 6,
            jitter_ticks: 3,
            duplication_rate: 0.05,
            ..Default::default()
        }
    }
}

/// Builder for [`ChaosConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChaosConfigBuilder {
    config: ChaosConfig,
}

impl ChaosConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base latency in ticks.
    pub fn latency_ticks(mut self, ticks: u32) -> Self {
        self.config.latency_ticks = ticks;
        self
    }

    /// Sets the maximum jitter in ticks.
    pub fn jitter_ticks(mut self, ticks: u32) -> Self {
        self.config.jitter_ticks = ticks;
        self
    }

    /// Sets the duplication rate. Values outside `[0, 1]` are clamped and reported.
    pub fn duplication_rate(mut self, rate: f64) -> Self {
        self.config.duplication_rate = clamp_rate("duplication_rate", rate);
        self
    }

    /// Sets the loss rate. Values outside `[0, 1]` are clamped and reported.
    pub fn loss_rate(mut self, rate: f64) -> Self {
        self.config.loss_rate = clamp_rate("loss_rate", rate);
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ChaosConfig {
        self.config
    }
}

fn clamp_rate(name: &str, rate: f64) -> f64 {
    if !(0.0..=1.0).contains(&rate) {
        report_violation!(
            ViolationSeverity::Warning,
            ViolationKind::Configuration,
            "{} of {} is not a probability; clamped to [0, 1]",
            name,
            rate
        );
    }
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// A message waiting for its delivery tick.
#[derive(Debug, Clone)]
struct InFlightMessage {
    msg: Message,
    deliver_at: u64,
}

/// Statistics about chaos channel behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaosStats {
    /// Messages handed to [`Channel::send`]
    pub messages_sent: u64,
    /// Messages dropped on send
    pub messages_dropped: u64,
    /// Extra copies sent
    pub messages_duplicated: u64,
    /// Messages handed out by [`Channel::receive_all_messages`]
    pub messages_delivered: u64,
}

/// A channel wrapper that injects configurable faults.
///
/// Faults on send (loss, duplication) apply to this end's outgoing traffic.
/// Delay applies to this end's incoming traffic.
#[derive(Debug)]
pub struct ChaosChannel<C: Channel> {
    inner: C,
    config: ChaosConfig,
    rng: Pcg32,
    tick: u64,
    /// Delivery ticks are non-decreasing front to back.
    in_flight: VecDeque<InFlightMessage>,
    stats: ChaosStats,
}

impl<C: Channel> ChaosChannel<C> {
    /// Creates a new chaos channel wrapping `inner`.
    pub fn new(inner: C, config: ChaosConfig) -> Self {
        let rng = Pcg32::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            rng,
            tick: 0,
            in_flight: VecDeque::new(),
            stats: ChaosStats::default(),
        }
    }

    /// Returns a reference to the inner channel.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Returns a mutable reference to the inner channel.
    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    /// Consumes the chaos channel and returns the inner channel.
    ///
    /// Messages still in flight are lost.
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Replaces the configuration. Messages already in flight keep their delivery tick.
    pub fn set_config(&mut self, config: ChaosConfig) {
        self.config = config;
    }

    /// Returns statistics about chaos behavior.
    pub fn stats(&self) -> ChaosStats {
        self.stats
    }

    /// Returns the number of messages received from the inner channel but not yet delivered.
    pub fn messages_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn delivery_tick(&mut self) -> u64 {
        let jitter = if self.config.jitter_ticks > 0 {
            self.rng.gen_range(0..self.config.jitter_ticks.saturating_add(1))
        } else {
            0
        };
        let scheduled = self.tick + u64::from(self.config.latency_ticks) + u64::from(jitter);
        // Head-of-line blocking: never overtake the message in front.
        self.in_flight
            .back()
            .map_or(scheduled, |last| scheduled.max(last.deliver_at))
    }
}

impl<C: Channel> Channel for ChaosChannel<C> {
    fn send(&mut self, msg: &Message) {
        self.stats.messages_sent += 1;

        if self.rng.gen_bool(self.config.loss_rate) {
            self.stats.messages_dropped += 1;
            return;
        }

        self.inner.send(msg);

        if self.rng.gen_bool(self.config.duplication_rate) {
            self.stats.messages_duplicated += 1;
            self.inner.send(msg);
        }
    }

    fn receive_all_messages(&mut self) -> Vec<Message> {
        for msg in self.inner.receive_all_messages() {
            let deliver_at = self.delivery_tick();
            self.in_flight.push_back(InFlightMessage { msg, deliver_at });
        }

        let mut ready = Vec::new();
        while self
            .in_flight
            .front()
            .is_some_and(|front| front.deliver_at <= self.tick)
        {
            if let Some(entry) = self.in_flight.pop_front() {
                ready.push(entry.msg);
            }
        }

        self.tick += 1;
        self.stats.messages_delivered += ready.len() as u64;
        ready
    }
}
