//! Push channel subscription.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use swatch_core::wire::PushEvent;
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

use crate::error::ClientError;

const READ_POLL: Duration = Duration::from_millis(200);

/// A websocket connection to `/ws`; disconnects when dropped.
///
/// There is no reconnect and no replay of events missed while
/// disconnected.
#[derive(Debug)]
pub struct PushSubscription {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PushSubscription {
    /// Connects to `url` and calls `on_event` for every well-formed event.
    pub fn connect<F>(url: &str, mut on_event: F) -> Result<Self, ClientError>
    where
        F: FnMut(PushEvent) + Send + 'static,
    {
        let (mut socket, _) = tungstenite::connect(url)
            .map_err(|err| ClientError::Push(format!("{url}: {err}").into()))?;
        if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
            stream
                .set_read_timeout(Some(READ_POLL))
                .map_err(|err| ClientError::Push(err.to_string().into()))?;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let handle = thread::spawn(move || {
            while !stop_for_thread.load(Ordering::SeqCst) {
                match socket.read() {
                    Ok(Message::Text(text)) => match PushEvent::parse(text.as_str()) {
                        Some(event) => on_event(event),
                        None => debug!("ignoring push frame {}", text.as_str()),
                    },
                    Ok(Message::Close(_)) => {
                        info!("push channel closed by server");
                        break;
                    }
                    Ok(_) => {}
                    Err(tungstenite::Error::Io(err))
                        if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                    Err(
                        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                    ) => break,
                    Err(err) => {
                        warn!("push channel read failed: {err}");
                        break;
                    }
                }
            }
            let _ = socket.close(None);
            let _ = socket.flush();
        });
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Whether the reader thread is still running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops reading and waits for the reader thread.
    pub fn disconnect(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}
