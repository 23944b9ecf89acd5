//! Convenient re-exports for common usage.
//!
//! ```rust
//! use rampart::prelude::*;
//!
//! let (client_end, _server_end) = LocalChannel::pair();
//! let mut client = SessionBuilder::new().start_client_session(client_end, Position::ZERO)?;
//! client.advance_tick(InputState::RIGHT, web_time::Duration::from_millis(16))?;
//! assert_eq!(client.unacknowledged().len(), 1);
//! # Ok::<(), RampartError>(())
//! ```

// Sessions
pub use crate::sessions::builder::SessionBuilder;
pub use crate::sessions::client_session::ClientSession;
pub use crate::sessions::server_session::ServerSession;

// Channels
pub use crate::{Channel, LocalChannel};

// Fundamental types
pub use crate::{ClientId, Position, SequenceId};

// Input
pub use crate::{Displacement, InputState, InputSymbol};

// Results of reconciliation
pub use crate::Correction;

// Error handling
pub use crate::RampartError;

// Monitoring
pub use crate::{AuthorityStats, PredictionStats};

// Configuration
pub use crate::{AuthorityConfig, DuplicatePolicy, PredictionConfig};
