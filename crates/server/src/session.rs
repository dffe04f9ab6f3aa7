//! Per-participant session with a buffered one-way event stream.
use crate::{expiring::HasExpiry, ring::RingBuffer};
use roast_protocol::{Expiry, ParticipantId, ServerEvent, SessionId};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;

/// Events buffered per session while no subscriber is consuming.
///
/// Overflow drops the oldest event; clients re-hydrate the full
/// state on their next login.
pub const EVENT_BUFFER_CAPACITY: usize = 100;

/// Bound of the channel feeding a session's websocket writer.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A logged-in participant: identity, expiry and the event sink the
/// server pushes protocol events into.
///
/// The stream is *active* while a subscriber consumes the channel
/// and *paused* otherwise; paused events land in a ring buffer that
/// is flushed before any newer live event once the subscriber
/// attaches.
#[derive(Debug)]
pub struct ClientSession {
    participant_id: ParticipantId,
    session_id: SessionId,
    pub(crate) expiry: Expiry,
    sink: Option<mpsc::Sender<ServerEvent>>,
    buffer: RingBuffer<ServerEvent>,
    keepalive: Option<AbortHandle>,
}

impl HasExpiry for ClientSession {
    fn expiry(&self) -> Expiry {
        self.expiry
    }
}

impl ClientSession {
    pub(crate) fn new(
        participant_id: ParticipantId,
        session_id: SessionId,
        ttl: Duration,
    ) -> Self {
        Self {
            participant_id,
            session_id,
            expiry: Expiry::after(ttl),
            sink: None,
            buffer: RingBuffer::new(EVENT_BUFFER_CAPACITY),
            keepalive: None,
        }
    }

    /// Identifier of the participant owning this session.
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    /// Identifier of this session.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Refresh the expiry, returning the new deadline.
    pub(crate) fn extend(&mut self, ttl: Duration) -> Expiry {
        self.expiry = Expiry::after(ttl);
        self.expiry
    }

    /// Install a subscriber, flushing buffered events first.
    pub(crate) fn attach(&mut self, tx: mpsc::Sender<ServerEvent>) {
        self.sink = Some(tx);
        self.flush();
    }

    /// Enqueue an event for delivery.
    ///
    /// Never blocks: with no subscriber, or with the channel full,
    /// the event is buffered and the oldest buffered event may be
    /// dropped.
    pub(crate) fn send_event(&mut self, event: ServerEvent) {
        self.flush();
        if !self.buffer.is_empty() {
            self.buffer.push(event);
            return;
        }
        let Some(tx) = &self.sink else {
            self.buffer.push(event);
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                self.buffer.push(event);
            }
            Err(TrySendError::Closed(event)) => {
                self.sink = None;
                self.buffer.push(event);
            }
        }
    }

    /// Move buffered events into the live stream, oldest first.
    fn flush(&mut self) {
        loop {
            let Some(tx) = &self.sink else { return };
            let Some(event) = self.buffer.pop() else { return };
            match tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    self.buffer.push_front(event);
                    return;
                }
                Err(TrySendError::Closed(event)) => {
                    self.sink = None;
                    self.buffer.push_front(event);
                    return;
                }
            }
        }
    }

    pub(crate) fn set_keepalive(&mut self, handle: AbortHandle) {
        self.keepalive = Some(handle);
    }

    /// Close the event sink and stop the keepalive task.
    pub(crate) fn shutdown(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
        self.sink = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ClientSession {
        ClientSession::new(
            ParticipantId::new(*b"id01"),
            SessionId::new_v4(),
            Duration::from_secs(60),
        )
    }

    fn status(n: u8) -> ServerEvent {
        ServerEvent::ParticipantStatus {
            participant_id: ParticipantId::new([b'i', b'd', b'0', n]),
            logged_in: true,
        }
    }

    #[tokio::test]
    async fn buffers_while_paused_and_flushes_on_attach() {
        let mut session = session();
        session.send_event(status(1));
        session.send_event(status(2));

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER_CAPACITY + 1);
        session.attach(tx);
        session.send_event(status(3));

        for expected in 1..=3u8 {
            match rx.try_recv().expect("event delivered") {
                ServerEvent::ParticipantStatus {
                    participant_id,
                    ..
                } => {
                    assert_eq!(
                        ParticipantId::new([b'i', b'd', b'0', expected]),
                        participant_id
                    );
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn oldest_event_is_dropped_at_capacity() {
        let mut session = session();
        for n in 0..(EVENT_BUFFER_CAPACITY + 5) {
            session.send_event(status((n % 200) as u8));
        }

        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER_CAPACITY + 8);
        session.attach(tx);

        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        assert_eq!(EVENT_BUFFER_CAPACITY, received.len());
        // The first five events were overwritten.
        match &received[0] {
            ServerEvent::ParticipantStatus {
                participant_id, ..
            } => {
                assert_eq!(
                    ParticipantId::new([b'i', b'd', b'0', 5]),
                    *participant_id
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_subscriber_pauses_the_stream() {
        let mut session = session();
        let (tx, rx) = mpsc::channel(4);
        session.attach(tx);
        drop(rx);

        session.send_event(status(1));
        let (tx, mut rx) = mpsc::channel(4);
        session.attach(tx);
        assert!(rx.try_recv().is_ok());
    }
}
