//! Common test infrastructure shared across integration tests.
//!
//! # Usage
//!
//! From any integration test file:
//! ```ignore
//! #[path = "common/mod.rs"]
//! mod common;
//! use common::{Loopback, quarter, TICK};
//! ```

// Each integration crate only uses a subset of these helpers.
#![allow(dead_code)]

use rampart::{
    ChaosChannel, ChaosConfig, ClientId, ClientSession, Correction, Displacement, InputState,
    LocalChannel, Position, RampartError, ServerSession, SessionBuilder,
};
use web_time::Duration;

/// One simulation step at 60 Hz.
pub const TICK: Duration = Duration::from_micros(16_667);

/// Upper bound on idle steps spent waiting for the link to drain.
pub const MAX_SETTLE_STEPS: usize = 10_000;

/// The client id every [`Loopback`] registers.
pub const CLIENT: ClientId = ClientId::new(1);

/// A displacement whose sums are exact in `f32`.
pub fn quarter() -> Displacement {
    Displacement::new(0.25).expect("0.25 is a finite step")
}

/// Routes library logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Maps a `(left, right)` pair, as proptest generates them, to an input state.
pub fn input(pair: (bool, bool)) -> InputState {
    InputState::new(pair.0, pair.1)
}

type Link = ChaosChannel<LocalChannel>;

/// One client and one server joined by a pair of chaos channels.
pub struct Loopback {
    pub client: ClientSession<Link>,
    pub server: ServerSession<Link>,
    pub corrections: Vec<Correction>,
}

impl Loopback {
    /// Connects a fresh client to a fresh server, both spawned at the origin.
    pub fn new(builder: SessionBuilder, chaos: ChaosConfig) -> Self {
        Self::with_links(builder, chaos.clone(), chaos)
    }

    /// Like [`Loopback::new`], with separate fault settings for each end.
    ///
    /// Delay configured on an end applies to the traffic that end receives.
    pub fn with_links(builder: SessionBuilder, client_chaos: ChaosConfig, server_chaos: ChaosConfig) -> Self {
        let (client_end, server_end) = LocalChannel::pair();
        let client = builder
            .clone()
            .start_client_session(ChaosChannel::new(client_end, client_chaos), Position::ZERO)
            .expect("valid client configuration");
        let mut server = builder
            .start_server_session()
            .expect("valid server configuration");
        server
            .add_client(CLIENT, ChaosChannel::new(server_end, server_chaos), Position::ZERO)
            .expect("first registration");
        Self {
            client,
            server,
            corrections: Vec::new(),
        }
    }

    /// One full step: predict, let the server answer, reconcile.
    pub fn step(&mut self, input: InputState) -> Result<(), RampartError> {
        self.client.advance_tick(input, TICK)?;
        self.server.poll();
        self.corrections.extend(self.client.poll_remote());
        Ok(())
    }

    /// Flushes and idles until every command has been acknowledged.
    ///
    /// # Panics
    ///
    /// Panics if the link does not drain within [`MAX_SETTLE_STEPS`].
    pub fn settle(&mut self) {
        self.client.flush();
        for _ in 0..MAX_SETTLE_STEPS {
            if self.client.unacknowledged().is_empty() {
                return;
            }
            self.step(InputState::IDLE).expect("idle steps never capture");
        }
        panic!(
            "link did not drain: {} commands still unacknowledged",
            self.client.unacknowledged().len()
        );
    }

    /// The server's authoritative position for the client.
    pub fn server_position(&self) -> Position {
        self.server
            .server_position(CLIENT)
            .expect("client is registered")
    }
}
