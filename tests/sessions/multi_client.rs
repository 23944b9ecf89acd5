//! Several clients sharing one server session.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::Arc;

use crate::common::{quarter, TICK};
use rampart::telemetry::{CollectingObserver, ViolationKind};
use rampart::{
    Channel, ClientId, ClientSession, InputState, LocalChannel, Message, Position, RampartError,
    ServerSession, SessionBuilder,
};

struct World {
    server: ServerSession<LocalChannel>,
    clients: Vec<(ClientId, ClientSession<LocalChannel>)>,
}

impl World {
    fn new(builder: &SessionBuilder, spawns: &[Position]) -> Self {
        let mut server = builder.clone().start_server_session().unwrap();
        let mut clients = Vec::new();
        for (index, &spawn) in spawns.iter().enumerate() {
            let id = ClientId::new(index as u32 + 1);
            let (client_end, server_end) = LocalChannel::pair();
            server.add_client(id, server_end, spawn).unwrap();
            let session = builder
                .clone()
                .start_client_session(client_end, spawn)
                .unwrap();
            clients.push((id, session));
        }
        Self { server, clients }
    }

    fn step(&mut self, inputs: &[InputState]) {
        for ((_, client), &input) in self.clients.iter_mut().zip(inputs) {
            client.advance_tick(input, TICK).unwrap();
        }
        self.server.poll();
        for (_, client) in &mut self.clients {
            let _ = client.poll_remote();
        }
    }

    fn settle(&mut self) {
        for (_, client) in &mut self.clients {
            client.flush();
        }
        self.server.poll();
        for (_, client) in &mut self.clients {
            let _ = client.poll_remote();
        }
    }
}

#[test]
fn clients_are_integrated_independently() {
    let builder = SessionBuilder::new().with_displacement(quarter());
    let mut world = World::new(
        &builder,
        &[Position::ZERO, Position::new(0.0, 5.0, 0.0), Position::new(-3.0, 0.0, 1.0)],
    );

    for _ in 0..40 {
        world.step(&[InputState::RIGHT, InputState::LEFT, InputState::IDLE]);
    }
    world.settle();

    let expected = [
        Position::new(10.0, 0.0, 0.0),
        Position::new(-10.0, 5.0, 0.0),
        Position::new(-3.0, 0.0, 1.0),
    ];
    for ((id, client), expected) in world.clients.iter().zip(expected) {
        assert_eq!(world.server.server_position(*id).unwrap(), expected, "{id}");
        assert_eq!(client.local_position(), expected, "{id}");
        assert!(client.unacknowledged().is_empty());
    }
}

#[test]
fn disconnect_discards_state_and_leaves_others_running() {
    let builder = SessionBuilder::new().with_displacement(quarter());
    let mut world = World::new(&builder, &[Position::ZERO, Position::ZERO]);
    world.step(&[InputState::RIGHT, InputState::RIGHT]);
    world.settle();

    let (gone, _) = world.clients.remove(0);
    world.server.remove_client(gone).unwrap();
    assert_eq!(
        world.server.server_position(gone),
        Err(RampartError::UnknownClient { client: gone })
    );

    world.step(&[InputState::LEFT]);
    world.settle();
    let (remaining, client) = &world.clients[0];
    assert_eq!(world.server.server_position(*remaining).unwrap(), Position::ZERO);
    assert_eq!(client.local_position(), Position::ZERO);
    assert_eq!(world.server.clients().collect::<Vec<_>>(), vec![*remaining]);
}

#[test]
fn clients_echoing_acknowledgements_are_reported() {
    let observer = Arc::new(CollectingObserver::new());
    let builder = SessionBuilder::new()
        .with_displacement(quarter())
        .with_violation_observer(observer.clone());
    let mut world = World::new(&builder, &[Position::ZERO]);

    world.clients[0]
        .1
        .channel_mut()
        .send(&Message::acknowledgement(Default::default()));
    world.server.poll();

    assert_eq!(observer.violations_of_kind(ViolationKind::NetworkProtocol).len(), 1);
    assert_eq!(world.server.server_position(ClientId::new(1)).unwrap(), Position::ZERO);
}
