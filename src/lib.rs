//! # Rampart
//!
//! Rampart implements client-side prediction with server reconciliation for a
//! single owning client's avatar, written in 100% safe Rust.
//!
//! The client applies each input locally the moment it is sampled, buffers it,
//! and ships buffered inputs to the server in periodic batches. The server is the
//! only authority: it integrates every batch into its own position and answers
//! with an [`Acknowledgement`]. On receipt the client drops acknowledged inputs,
//! snaps to the authoritative position and replays whatever is still in flight.
//!
//! There are no engine callbacks. Every piece of state is an explicit value
//! ([`PredictionState`], [`AuthoritativeState`]) handed to an engine by an
//! external scheduler, and every message crosses an abstract [`Channel`].
//!
//! ```
//! use rampart::{ClientReconciler, Displacement, InputState, PredictionConfig, PredictionEngine,
//!     PredictionState, ReconciliationEngine, AuthoritativeState, Position};
//! use web_time::Duration;
//!
//! let displacement = Displacement::default();
//! let mut engine = PredictionEngine::new(PredictionConfig::default(), displacement)?;
//! let mut client = PredictionState::new(Position::ZERO);
//! let mut server = AuthoritativeState::new(Position::ZERO);
//!
//! // Two ticks holding "right", then force the batch out.
//! engine.tick(&mut client, InputState::RIGHT, Duration::from_millis(16))?;
//! engine.tick(&mut client, InputState::RIGHT, Duration::from_millis(16))?;
//! let batch = engine.flush(&mut client).expect("two commands are buffered");
//!
//! let ack = ReconciliationEngine::new(displacement).process_batch(&mut server, &batch);
//! let correction = ClientReconciler::new(displacement).apply(&mut client, &ack);
//! assert!(correction.is_seamless());
//!
//! assert!(client.unacknowledged().is_empty());
//! assert_eq!(client.local_position(), server.server_position());
//! # Ok::<(), rampart::RampartError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use authority::{AuthoritativeState, DuplicatePolicy, ReconciliationEngine};
pub use command::{Acknowledgement, AckIds, InputBatch, InputCommand};
pub use error::RampartError;
pub use input::{Displacement, InputState, InputSymbol};
pub use network::channel::{Channel, LocalChannel};
pub use network::chaos_channel::{ChaosChannel, ChaosConfig, ChaosConfigBuilder, ChaosStats};
pub use network::messages::{Message, MessageBody};
pub use network::stats::{AuthorityStats, PredictionStats};
pub use prediction::{PredictionEngine, PredictionState};
pub use reconciler::{ClientReconciler, Correction};
pub use sessions::builder::SessionBuilder;
pub use sessions::client_session::ClientSession;
pub use sessions::config::{AuthorityConfig, PredictionConfig};
pub use sessions::server_session::ServerSession;

pub mod authority;
pub mod command;
pub mod error;
pub mod input;
pub mod prediction;
pub mod prelude;
pub mod reconciler;
/// Internal random number generator module based on PCG32.
///
/// Drives the deterministic fault injection of [`ChaosChannel`].
pub mod rng;
#[doc(hidden)]
pub mod sync;
pub mod telemetry;
#[doc(hidden)]
pub mod test_config;
pub mod sessions {
    //! Client and server sessions plus the builder that configures them.
    pub mod builder;
    pub mod client_session;
    pub mod config;
    pub mod server_session;
}
pub mod network {
    //! Wire messages, their codec, and the channels that carry them.
    pub mod channel;
    pub mod chaos_channel;
    pub mod codec;
    pub mod messages;
    pub mod stats;
}

// #############
// # CORE TYPES #
// #############

/// Identifies one captured input command.
///
/// Sequence identifiers are assigned by a single [`PredictionState`] at capture
/// time, start at [`SequenceId::ZERO`] and strictly increase. They are never
/// reused: [`next`](SequenceId::next) refuses to wrap around.
///
/// # Examples
///
/// ```
/// use rampart::SequenceId;
///
/// let first = SequenceId::ZERO;
/// let second = first.next().unwrap();
/// assert!(second > first);
/// assert_eq!(second.as_u32(), 1);
/// assert_eq!(SequenceId::new(u32::MAX).next(), None);
/// ```
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct SequenceId(u32);

impl SequenceId {
    /// The first identifier handed out in a session.
    pub const ZERO: Self = Self(0);

    /// Creates a `SequenceId` from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the identifier that follows this one, or `None` once the id space is exhausted.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for SequenceId {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SequenceId> for u32 {
    #[inline]
    fn from(id: SequenceId) -> Self {
        id.0
    }
}

/// Identifies one client link on a [`ServerSession`].
///
/// Session lifecycle (who gets which id) is decided outside this crate; the
/// server only uses the id to route acknowledgements back to the originating
/// client.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ClientId(u32);

impl ClientId {
    /// Creates a new `ClientId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A position (or position delta) in 3D space.
///
/// Both sides of the protocol store positions as `f32` triples. Arithmetic is
/// plain component-wise `f32` arithmetic so that client and server produce the
/// same bits for the same sequence of operations.
#[derive(Debug, Copy, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Position {
    /// X component. Left/right movement happens along this axis.
    pub x: f32,
    /// Y component.
    pub y: f32,
    /// Z component.
    pub z: f32,
}

impl Position {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean length of this vector.
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Euclidean distance between two positions.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Returns `true` if every component is finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Position {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Neg for Position {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ###################
// # UNIT TESTS      #
// ###################
