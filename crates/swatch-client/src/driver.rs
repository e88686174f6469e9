//! Event loop around a [`ComponentView`].
//!
//! Requests run on worker threads. Their completions and push events come
//! back over one channel and are applied on the thread that owns the
//! driver, so the view itself is never shared.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use swatch_core::wire::PushEvent;
use tracing::debug;

use crate::error::ClientError;
use crate::push::PushSubscription;
use crate::transport::Transport;
use crate::view::{ComponentView, Response, Ticket};

/// What arrives on the driver channel.
#[derive(Debug)]
pub enum DriverEvent {
    /// A request finished on a worker thread.
    Completed {
        /// Ticket the view issued with the request.
        ticket: Ticket,
        /// Decoded response or transport error.
        result: Result<Response, ClientError>,
    },
    /// A push frame from the server.
    Push(PushEvent),
}

/// Owns a [`ComponentView`] and feeds it from workers and push.
pub struct ViewDriver<T> {
    view: ComponentView,
    transport: Arc<T>,
    events_tx: Sender<DriverEvent>,
    events_rx: Receiver<DriverEvent>,
    in_flight: usize,
    push: Option<PushSubscription>,
}

impl<T> std::fmt::Debug for ViewDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewDriver")
            .field("view", &self.view)
            .field("in_flight", &self.in_flight)
            .field("push", &self.push.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> ViewDriver<T> {
    /// Driver with nothing in flight and no push subscription.
    pub fn new(view: ComponentView, transport: Arc<T>) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            view,
            transport,
            events_tx,
            events_rx,
            in_flight: 0,
            push: None,
        }
    }

    /// The driven view.
    #[must_use]
    pub fn view(&self) -> &ComponentView {
        &self.view
    }

    /// Runs `op` against the view and dispatches whatever it queued.
    pub fn update<R>(&mut self, op: impl FnOnce(&mut ComponentView, Instant) -> R) -> R {
        let result = op(&mut self.view, Instant::now());
        self.dispatch();
        result
    }

    /// Mounts the view and, given a push url, subscribes to push events.
    pub fn mount(&mut self, push_url: Option<&str>) -> Result<(), ClientError> {
        if let Some(url) = push_url {
            let events = self.events_tx.clone();
            self.push = Some(PushSubscription::connect(url, move |event| {
                let _ = events.send(DriverEvent::Push(event));
            })?);
        }
        self.view.mount();
        self.dispatch();
        Ok(())
    }

    /// Disconnects push and unmounts; late completions are ignored.
    pub fn unmount(&mut self) {
        if let Some(push) = self.push.take() {
            push.disconnect();
        }
        self.view.unmount();
        self.dispatch();
    }

    /// Requests dispatched and not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn dispatch(&mut self) {
        for outgoing in self.view.take_requests() {
            self.in_flight += 1;
            let transport = Arc::clone(&self.transport);
            let events = self.events_tx.clone();
            thread::spawn(move || {
                let result = transport.execute(&outgoing.component, &outgoing.request);
                let _ = events.send(DriverEvent::Completed {
                    ticket: outgoing.ticket,
                    result,
                });
            });
        }
    }

    /// Waits up to `max_wait` for one event or the next debounce deadline,
    /// applies it and dispatches the follow-up requests. Returns whether an
    /// event was handled.
    pub fn step(&mut self, max_wait: Duration) -> bool {
        let now = Instant::now();
        let wait = self
            .view
            .next_deadline()
            .map_or(max_wait, |deadline| deadline.saturating_duration_since(now))
            .min(max_wait);
        let handled = match self.events_rx.recv_timeout(wait) {
            Ok(event) => {
                self.handle(event);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        };
        self.view.poll(Instant::now());
        self.dispatch();
        handled
    }

    fn handle(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Completed { ticket, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.view.complete(ticket, result, Instant::now());
            }
            DriverEvent::Push(event) => self.view.push(&event),
        }
    }

    /// Steps until nothing is in flight or pending, or `timeout` passes.
    /// Returns whether the view settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight == 0 && self.view.is_idle() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                debug!("view did not settle within {timeout:?}");
                return false;
            };
            self.step(remaining);
        }
    }

    /// Steps until `done` holds for the view, or `timeout` passes.
    pub fn run_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&ComponentView) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        while !done(&self.view) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            self.step(remaining);
        }
        true
    }
}
