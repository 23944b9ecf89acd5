//! Configuration types for Rampart sessions.
//!
//! # Overview
//!
//! | Config Type | Purpose | Key Presets |
//! |-------------|---------|-------------|
//! | `PredictionConfig` | Client flush rate and buffer bound | `responsive()`, `bandwidth_saver()`, `hardened()` |
//! | `AuthorityConfig` | Server duplicate handling | `canonical()` |
//!
//! # Example
//!
//! ```
//! use rampart::{PredictionConfig, SessionBuilder};
//!
//! let builder = SessionBuilder::new()
//!     .with_prediction_config(PredictionConfig::responsive());
//! ```

use web_time::Duration;

use crate::authority::DuplicatePolicy;
use crate::RampartError;

/// Default number of input flushes per second.
const DEFAULT_UPDATES_PER_SECOND: u32 = 4;
/// Upper bound for the flush rate; faster than one flush per millisecond is meaningless.
const MAX_UPDATES_PER_SECOND: u32 = 1000;

/// Configuration for the client side of the protocol.
///
/// # Forward Compatibility
///
/// New fields may be added to this struct in future versions. Always use the
/// `..PredictionConfig::default()` pattern when constructing instances.
///
/// # Example
///
/// ```
/// use rampart::PredictionConfig;
/// use web_time::Duration;
///
/// let config = PredictionConfig {
///     updates_per_second: 10,
///     ..PredictionConfig::default()
/// };
/// assert_eq!(config.flush_interval(), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "PredictionConfig has no effect unless passed to SessionBuilder::with_prediction_config()"]
pub struct PredictionConfig {
    /// How many times per second buffered commands are sent to the server.
    /// Independent of the simulation tick rate.
    ///
    /// Default: 4
    pub updates_per_second: u32,

    /// Upper bound on commands awaiting acknowledgement. `None` lets the
    /// buffer grow without limit while the server is unreachable.
    ///
    /// Default: `None`
    pub max_unacknowledged: Option<usize>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            updates_per_second: DEFAULT_UPDATES_PER_SECOND,
            max_unacknowledged: None,
        }
    }
}

impl PredictionConfig {
    /// Creates a new `PredictionConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration preset for fast acknowledgement turnaround.
    ///
    /// Flushes 20 times per second, so corrections arrive sooner and the
    /// unacknowledged buffer stays short.
    pub fn responsive() -> Self {
        Self {
            updates_per_second: 20,
            ..Self::default()
        }
    }

    /// Configuration preset for constrained links.
    ///
    /// Flushes twice per second, producing fewer, larger batches.
    pub fn bandwidth_saver() -> Self {
        Self {
            updates_per_second: 2,
            ..Self::default()
        }
    }

    /// Configuration preset that treats a long silence from the server as fatal.
    ///
    /// Allows ten seconds of 60 Hz input to stay unacknowledged.
    pub fn hardened() -> Self {
        Self {
            max_unacknowledged: Some(600),
            ..Self::default()
        }
    }

    /// Time between flushes.
    ///
    /// Returns [`Duration::ZERO`] for a zero rate; [`validate`](Self::validate) rejects that.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        if self.updates_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(1) / self.updates_per_second
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if `updates_per_second` is zero
    /// or above 1000, or if `max_unacknowledged` is `Some(0)`.
    pub fn validate(&self) -> Result<(), RampartError> {
        if self.updates_per_second == 0 || self.updates_per_second > MAX_UPDATES_PER_SECOND {
            return Err(RampartError::InvalidRequest {
                info: format!(
                    "updates_per_second must be between 1 and {}, got {}",
                    MAX_UPDATES_PER_SECOND, self.updates_per_second
                ),
            });
        }
        if self.max_unacknowledged == Some(0) {
            return Err(RampartError::InvalidRequest {
                info: "max_unacknowledged must allow at least one command".to_owned(),
            });
        }
        Ok(())
    }
}

/// Configuration for the server side of the protocol.
///
/// # Example
///
/// ```
/// use rampart::{AuthorityConfig, DuplicatePolicy};
///
/// let config = AuthorityConfig::canonical();
/// assert_eq!(config.duplicate_policy, DuplicatePolicy::Apply);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use = "AuthorityConfig has no effect unless passed to SessionBuilder::with_authority_config()"]
pub struct AuthorityConfig {
    /// What to do with commands whose id has already been processed.
    ///
    /// Default: [`DuplicatePolicy::Discard`]
    pub duplicate_policy: DuplicatePolicy,
}

impl AuthorityConfig {
    /// Creates a new `AuthorityConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies every received command, trusting the transport never to duplicate.
    pub fn canonical() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Apply,
        }
    }
}
