//! Push channel: broadcasts change events to every websocket subscriber.

use std::io::{Read, Write};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use swatch_core::wire::PushEvent;
use tracing::{debug, info};
use tungstenite::{Message, WebSocket};

/// How often idle subscribers are pinged.
pub const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Fan-out of push events. Subscribers only receive events broadcast after
/// they subscribed; nothing is replayed.
#[derive(Debug, Default)]
pub struct PushHub {
    subscribers: Mutex<Vec<Sender<PushEvent>>>,
}

impl PushHub {
    /// Hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber that receives every later broadcast.
    pub fn subscribe(&self) -> Receiver<PushEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber and returns how many got it.
    pub fn broadcast(&self, event: &PushEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(
            "push {} for {} to {} subscriber(s)",
            event.event.as_str(),
            event.component,
            subscribers.len()
        );
        subscribers.len()
    }

    /// Subscribers known to be alive as of the last broadcast.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Writes events to one websocket until the peer goes away.
///
/// Idle connections get a ping every `ping_interval`, so dead peers are
/// noticed even when nothing changes.
pub fn run_subscriber<S: Read + Write>(
    mut socket: WebSocket<S>,
    events: &Receiver<PushEvent>,
    ping_interval: Duration,
) {
    loop {
        let message = match events.recv_timeout(ping_interval) {
            Ok(event) => Message::text(event.to_json()),
            Err(RecvTimeoutError::Timeout) => Message::Ping(Vec::new().into()),
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Err(err) = socket.send(message) {
            info!("push subscriber dropped: {err}");
            break;
        }
    }
    let _ = socket.close(None);
    let _ = socket.flush();
}
