//! [`SessionBuilder`] configures and starts client and server sessions.

use std::sync::Arc;

use crate::authority::{DuplicatePolicy, ReconciliationEngine};
use crate::input::Displacement;
use crate::network::channel::Channel;
use crate::prediction::PredictionEngine;
use crate::sessions::client_session::ClientSession;
use crate::sessions::config::{AuthorityConfig, PredictionConfig};
use crate::sessions::server_session::ServerSession;
use crate::telemetry::ViolationObserver;
use crate::{Position, RampartError};

/// The [`SessionBuilder`] builds all Rampart sessions.
///
/// Client and server must agree on the [`Displacement`]; configure it once
/// and start both sessions from clones of the same builder.
///
/// # Example
///
/// ```
/// use rampart::{ClientId, Displacement, LocalChannel, Position, SessionBuilder};
///
/// let builder = SessionBuilder::new()
///     .with_updates_per_second(10)
///     .with_displacement(Displacement::new(0.25)?);
///
/// let (client_end, server_end) = LocalChannel::pair();
/// let _client = builder.clone().start_client_session(client_end, Position::ZERO)?;
/// let mut server = builder.start_server_session()?;
/// server.add_client(ClientId::new(1), server_end, Position::ZERO)?;
/// # Ok::<(), rampart::RampartError>(())
/// ```
#[derive(Clone, Default)]
#[must_use = "SessionBuilder does nothing until a session is started"]
pub struct SessionBuilder {
    prediction_config: PredictionConfig,
    authority_config: AuthorityConfig,
    displacement: Displacement,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            prediction_config,
            authority_config,
            displacement,
            violation_observer,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("prediction_config", prediction_config)
            .field("authority_config", authority_config)
            .field("displacement", displacement)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl SessionBuilder {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole client configuration.
    pub fn with_prediction_config(mut self, config: PredictionConfig) -> Self {
        self.prediction_config = config;
        self
    }

    /// Replaces the whole server configuration.
    pub fn with_authority_config(mut self, config: AuthorityConfig) -> Self {
        self.authority_config = config;
        self
    }

    /// Change how often the client flushes buffered input. Default is 4.
    ///
    /// Checked when the client session starts.
    pub fn with_updates_per_second(mut self, updates_per_second: u32) -> Self {
        self.prediction_config.updates_per_second = updates_per_second;
        self
    }

    /// Change the displacement shared by prediction, authority and replay.
    pub fn with_displacement(mut self, displacement: Displacement) -> Self {
        self.displacement = displacement;
        self
    }

    /// Bound the client's unacknowledged buffer. Unbounded by default.
    pub fn with_max_unacknowledged(mut self, limit: usize) -> Self {
        self.prediction_config.max_unacknowledged = Some(limit);
        self
    }

    /// Change what the server does with already-processed commands.
    /// Default is [`DuplicatePolicy::Discard`].
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.authority_config.duplicate_policy = policy;
        self
    }

    /// Sets a custom observer for protocol violations.
    ///
    /// Without one, violations are logged through `tracing`.
    ///
    /// # Example
    ///
    /// ```
    /// use rampart::{SessionBuilder, telemetry::CollectingObserver};
    /// use std::sync::Arc;
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let builder = SessionBuilder::new().with_violation_observer(observer.clone());
    /// // After operations, check observer.violations() for any issues
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Consumes the builder to create a [`ClientSession`] for an entity spawned at `spawn`.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if the prediction configuration
    /// or the displacement is invalid.
    pub fn start_client_session<C: Channel>(self, channel: C, spawn: Position) -> Result<ClientSession<C>, RampartError> {
        let engine = PredictionEngine::new(self.prediction_config, self.displacement)?;
        Ok(ClientSession::new(channel, spawn, engine, self.violation_observer))
    }

    /// Consumes the builder to create an empty [`ServerSession`].
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if the displacement is invalid.
    pub fn start_server_session<C: Channel>(self) -> Result<ServerSession<C>, RampartError> {
        self.displacement.validate()?;
        let engine = ReconciliationEngine::new(self.displacement)
            .with_duplicate_policy(self.authority_config.duplicate_policy)
            .with_violation_observer(self.violation_observer.clone());
        Ok(ServerSession::new(engine, self.violation_observer))
    }
}
