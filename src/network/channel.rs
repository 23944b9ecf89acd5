//! The [`Channel`] abstraction and an in-process implementation.

use std::collections::VecDeque;

use tracing::trace;

use crate::network::codec;
use crate::network::messages::Message;
use crate::report_violation;
use crate::sync::{Arc, Mutex};
use crate::telemetry::{ViolationKind, ViolationSeverity};

/// A bidirectional link between one client and the server.
///
/// Implement this to run Rampart over your own transport. The protocol
/// expects the link to be reliable and ordered: every message arrives, in the
/// order it was sent. Latency is fine. A link that loses messages leaves
/// commands unacknowledged forever; see [`PredictionState::resynchronize`].
///
/// [`PredictionState::resynchronize`]: crate::PredictionState::resynchronize
pub trait Channel {
    /// Sends a message to the other end.
    fn send(&mut self, msg: &Message);

    /// Returns every message received since the previous call, oldest first.
    fn receive_all_messages(&mut self) -> Vec<Message>;
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn send(&mut self, msg: &Message) {
        (**self).send(msg);
    }

    fn receive_all_messages(&mut self) -> Vec<Message> {
        (**self).receive_all_messages()
    }
}

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// An in-process, reliable and ordered [`Channel`].
///
/// Messages are encoded to bytes on [`send`](Channel::send) and decoded on
/// receive, so everything that crosses a `LocalChannel` has survived the
/// wire format. Payloads that fail to decode are dropped and reported.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    outgoing: Queue,
    incoming: Queue,
}

impl LocalChannel {
    /// Creates two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let a_to_b: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a: Queue = Arc::new(Mutex::new(VecDeque::new()));
        let a = Self {
            outgoing: Arc::clone(&a_to_b),
            incoming: Arc::clone(&b_to_a),
        };
        let b = Self {
            outgoing: b_to_a,
            incoming: a_to_b,
        };
        (a, b)
    }

    /// Pushes raw bytes to the other end, bypassing the encoder.
    pub fn send_raw(&mut self, bytes: Vec<u8>) {
        self.outgoing.lock().push_back(bytes);
    }

    /// Number of payloads waiting to be received on this end.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.incoming.lock().len()
    }
}

impl Channel for LocalChannel {
    fn send(&mut self, msg: &Message) {
        match codec::encode_message(msg) {
            Ok(bytes) => {
                trace!(kind = msg.kind(), len = bytes.len(), "Queued message");
                self.outgoing.lock().push_back(bytes);
            },
            Err(e) => {
                report_violation!(
                    ViolationSeverity::Error,
                    ViolationKind::Codec,
                    "Failed to encode {} message: {}",
                    msg.kind(),
                    e
                );
            },
        }
    }

    fn receive_all_messages(&mut self) -> Vec<Message> {
        let payloads: Vec<Vec<u8>> = self.incoming.lock().drain(..).collect();
        let mut received = Vec::with_capacity(payloads.len());
        for bytes in payloads {
            match codec::decode_message(&bytes) {
                Ok(msg) => received.push(msg),
                Err(e) => {
                    report_violation!(
                        ViolationSeverity::Warning,
                        ViolationKind::Codec,
                        "Dropped undecodable payload of {} bytes: {}",
                        bytes.len(),
                        e
                    );
                },
            }
        }
        received
    }
}
