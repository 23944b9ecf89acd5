//! The authoritative half of a Rampart connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::authority::{AuthoritativeState, ReconciliationEngine};
use crate::input::InputState;
use crate::network::channel::Channel;
use crate::network::messages::{Message, MessageBody};
use crate::network::stats::AuthorityStats;
use crate::report_violation_to;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{ClientId, Position, RampartError};

/// One connected client as seen by the server.
struct ClientLink<C> {
    channel: C,
    state: AuthoritativeState,
}

/// The server's side of the protocol, for any number of clients.
///
/// Every client gets its own [`AuthoritativeState`] and [`Channel`]. Batches
/// from a client are processed in the order they arrive on that client's
/// channel and the acknowledgement goes back over the same channel only.
///
/// A listen server can also own entities itself. Those are registered with
/// [`add_host`](Self::add_host) and moved directly by
/// [`apply_host_input`](Self::apply_host_input); they have no channel and take
/// no part in batching or acknowledgement.
///
/// Create one with [`SessionBuilder::start_server_session`].
///
/// [`SessionBuilder::start_server_session`]: crate::SessionBuilder::start_server_session
pub struct ServerSession<C: Channel> {
    engine: ReconciliationEngine,
    clients: BTreeMap<ClientId, ClientLink<C>>,
    hosts: BTreeMap<ClientId, AuthoritativeState>,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<C: Channel> std::fmt::Debug for ServerSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            engine,
            clients,
            hosts,
            violation_observer,
        } = self;

        f.debug_struct("ServerSession")
            .field("engine", engine)
            .field("clients", &clients.keys().collect::<Vec<_>>())
            .field("hosts", &hosts.keys().collect::<Vec<_>>())
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl<C: Channel> ServerSession<C> {
    pub(crate) fn new(engine: ReconciliationEngine, violation_observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        Self {
            engine,
            clients: BTreeMap::new(),
            hosts: BTreeMap::new(),
            violation_observer,
        }
    }

    /// Registers a client whose entity spawns at `spawn`.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if `client` is already
    /// registered, as a remote client or as a host entity.
    pub fn add_client(&mut self, client: ClientId, channel: C, spawn: Position) -> Result<(), RampartError> {
        self.ensure_unregistered(client)?;
        debug!(%client, position = %spawn, "Client connected");
        self.clients.insert(
            client,
            ClientLink {
                channel,
                state: AuthoritativeState::new(spawn),
            },
        );
        Ok(())
    }

    /// Disconnects a client, discarding its authoritative state.
    ///
    /// Returns the client's channel.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `client` is not registered.
    pub fn remove_client(&mut self, client: ClientId) -> Result<C, RampartError> {
        let link = self
            .clients
            .remove(&client)
            .ok_or(RampartError::UnknownClient { client })?;
        debug!(%client, position = %link.state.server_position(), "Client disconnected");
        Ok(link.channel)
    }

    /// Registers an entity owned by the server itself, spawned at `spawn`.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::InvalidRequest`] if `host` is already registered.
    pub fn add_host(&mut self, host: ClientId, spawn: Position) -> Result<(), RampartError> {
        self.ensure_unregistered(host)?;
        debug!(%host, position = %spawn, "Host entity spawned");
        self.hosts.insert(host, AuthoritativeState::new(spawn));
        Ok(())
    }

    /// Applies one tick of the host's own input and returns the new position.
    ///
    /// See [`ReconciliationEngine::apply_host_input`].
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `host` is not a host entity.
    pub fn apply_host_input(&mut self, host: ClientId, input: InputState) -> Result<Position, RampartError> {
        let state = self
            .hosts
            .get_mut(&host)
            .ok_or(RampartError::UnknownClient { client: host })?;
        Ok(self.engine.apply_host_input(state, input))
    }

    /// Removes a host entity, returning its final position.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `host` is not a host entity.
    pub fn remove_host(&mut self, host: ClientId) -> Result<Position, RampartError> {
        let state = self
            .hosts
            .remove(&host)
            .ok_or(RampartError::UnknownClient { client: host })?;
        debug!(%host, position = %state.server_position(), "Host entity removed");
        Ok(state.server_position())
    }

    /// Processes every batch that has arrived from every client and sends the
    /// acknowledgements.
    ///
    /// Returns the number of batches processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        for (client, link) in &mut self.clients {
            for msg in link.channel.receive_all_messages() {
                match msg.body {
                    MessageBody::InputBatch(batch) => {
                        let ack = self.engine.process_batch(&mut link.state, &batch);
                        trace!(
                            %client,
                            acknowledged = ack.acknowledged_ids.len(),
                            position = %ack.server_position,
                            "Acknowledging batch"
                        );
                        link.channel.send(&Message::acknowledgement(ack));
                        processed += 1;
                    },
                    MessageBody::Acknowledgement(_) => {
                        report_violation_to!(
                            &self.violation_observer,
                            ViolationSeverity::Warning,
                            ViolationKind::NetworkProtocol,
                            "Server received an acknowledgement from {}; only clients accept acknowledgements",
                            client
                        );
                    },
                }
            }
        }
        processed
    }

    /// The authoritative position of `client`'s entity. Host entities are
    /// looked up too.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `client` is not registered.
    pub fn server_position(&self, client: ClientId) -> Result<Position, RampartError> {
        self.entity(client).map(AuthoritativeState::server_position)
    }

    /// Read access to `client`'s authoritative state.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `client` is not registered.
    pub fn state(&self, client: ClientId) -> Result<&AuthoritativeState, RampartError> {
        self.entity(client)
    }

    /// Counters for `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `client` is not registered.
    pub fn stats(&self, client: ClientId) -> Result<AuthorityStats, RampartError> {
        self.entity(client).map(AuthoritativeState::stats)
    }

    /// Registered remote clients in ascending id order.
    #[must_use]
    pub fn clients(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.clients.keys().copied()
    }

    /// Host entities in ascending id order.
    #[must_use]
    pub fn hosts(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.hosts.keys().copied()
    }

    /// Number of registered remote clients.
    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.clients.len()
    }

    /// `client`'s channel, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`RampartError::UnknownClient`] if `client` is not registered.
    pub fn channel_mut(&mut self, client: ClientId) -> Result<&mut C, RampartError> {
        self.clients
            .get_mut(&client)
            .map(|link| &mut link.channel)
            .ok_or(RampartError::UnknownClient { client })
    }

    fn entity(&self, client: ClientId) -> Result<&AuthoritativeState, RampartError> {
        self.clients
            .get(&client)
            .map(|link| &link.state)
            .or_else(|| self.hosts.get(&client))
            .ok_or(RampartError::UnknownClient { client })
    }

    fn ensure_unregistered(&self, client: ClientId) -> Result<(), RampartError> {
        if self.clients.contains_key(&client) || self.hosts.contains_key(&client) {
            return Err(RampartError::InvalidRequest {
                info: format!("{client} is already registered"),
            });
        }
        Ok(())
    }
}
