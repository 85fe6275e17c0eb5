use tokio::sync::broadcast;

use crate::{alarm::AlarmEvent, sync::LinkState};

/// Event fanned out to local consumers (UI bindings, audio, logging).
#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    /// The session changed, locally or from a remote snapshot.
    StateChanged,
    /// An alarm should sound.
    Alarm(AlarmEvent),
    /// The store link changed state.
    Link(LinkState),
}

/// Broadcast hub fanning [`BoardEvent`]s out to every subscriber.
pub struct UpdateHub {
    sender: broadcast::Sender<BoardEvent>,
}

impl UpdateHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: BoardEvent) {
        let _ = self.sender.send(event);
    }
}
