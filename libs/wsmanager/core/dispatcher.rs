//! Observer event dispatch
//!
//! # Architecture
//!
//! Every observer callback runs on one designated execution context:
//!
//! ```text
//! transport task ──┐
//! timer task ──────┼──> Unbounded Channel (FIFO) ──> designated context ──> StatusObserver
//! caller thread ───┘
//! ```
//!
//! Events produced on the designated context itself are delivered
//! synchronously. Everything else is queued and delivered in order.
//!
//! Two designated contexts are supported:
//!
//! - [`DispatchMode::Dedicated`]: a named OS thread owned by the dispatcher
//! - [`DispatchMode::Manual`]: the thread that built the manager; queued
//!   events are delivered when that thread calls [`Dispatcher::pump`]

use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, trace, warn};

/// Name of the dedicated dispatch thread
pub const DISPATCH_THREAD_NAME: &str = "wsmanager-dispatch";

/// Where observer callbacks execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// A dedicated thread delivers every event
    #[default]
    Dedicated,
    /// The constructing thread delivers events when it calls `pump_events`
    Manual,
}

/// A lifecycle event on its way to the observer
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    Open(HandshakeResponse),
    Message(WsMessage),
    Reconnect,
    Closing {
        code: u16,
        reason: String,
    },
    Closed {
        code: u16,
        reason: String,
    },
    Failure {
        error: WsManagerError,
        response: Option<HandshakeResponse>,
    },
}

impl ObserverEvent {
    fn deliver(&self, observer: &dyn StatusObserver) {
        match self {
            ObserverEvent::Open(response) => observer.on_open(response),
            ObserverEvent::Message(WsMessage::Text(text)) => observer.on_text(text),
            ObserverEvent::Message(WsMessage::Binary(data)) => observer.on_binary(data),
            ObserverEvent::Reconnect => observer.on_reconnect(),
            ObserverEvent::Closing { code, reason } => observer.on_closing(*code, reason),
            ObserverEvent::Closed { code, reason } => observer.on_closed(*code, reason),
            ObserverEvent::Failure { error, response } => {
                observer.on_failure(error, response.as_ref())
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ObserverEvent::Open(_) => "open",
            ObserverEvent::Message(_) => "message",
            ObserverEvent::Reconnect => "reconnect",
            ObserverEvent::Closing { .. } => "closing",
            ObserverEvent::Closed { .. } => "closed",
            ObserverEvent::Failure { .. } => "failure",
        }
    }
}

enum Envelope {
    Event(ObserverEvent),
    Shutdown,
}

type ObserverSlot = Arc<RwLock<Option<Arc<dyn StatusObserver>>>>;

/// Delivers observer events on the designated context
pub struct Dispatcher {
    mode: DispatchMode,
    observer: ObserverSlot,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    designated: ThreadId,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Create a dispatcher
    ///
    /// In `Manual` mode the calling thread becomes the designated context.
    pub fn new(mode: DispatchMode) -> Result<Self> {
        let (tx, rx) = unbounded();
        let observer: ObserverSlot = Arc::new(RwLock::new(None));

        let (designated, worker) = match mode {
            DispatchMode::Manual => (thread::current().id(), None),
            DispatchMode::Dedicated => {
                let worker_rx = rx.clone();
                let worker_observer = Arc::clone(&observer);
                let handle = thread::Builder::new()
                    .name(DISPATCH_THREAD_NAME.to_string())
                    .spawn(move || dispatch_loop(worker_rx, worker_observer))
                    .map_err(|e| {
                        WsManagerError::Configuration(format!(
                            "failed to spawn dispatch thread: {}",
                            e
                        ))
                    })?;
                (handle.thread().id(), Some(handle))
            }
        };

        Ok(Self {
            mode,
            observer,
            tx,
            rx,
            designated,
            worker,
        })
    }

    /// Register the observer; replaces any previous registration
    pub fn set_observer(&self, observer: Arc<dyn StatusObserver>) {
        *self.observer.write() = Some(observer);
    }

    /// Unregister the observer; later events are dropped
    pub fn clear_observer(&self) {
        *self.observer.write() = None;
    }

    /// Check whether the caller is running on the designated context
    #[inline]
    pub fn on_designated_context(&self) -> bool {
        thread::current().id() == self.designated
    }

    /// Hand an event to the observer on the designated context
    pub fn dispatch(&self, event: ObserverEvent) {
        if self.on_designated_context() {
            if self.mode == DispatchMode::Manual {
                // Older queued events go first
                self.pump();
            }
            deliver(&self.observer, &event);
            return;
        }

        trace!("Queueing {} event for dispatch", event.name());
        if self.tx.send(Envelope::Event(event)).is_err() {
            debug!("Dispatch channel closed, dropping event");
        }
    }

    /// Deliver every queued event (manual mode only)
    ///
    /// Returns the number of events taken off the queue. Does nothing in
    /// dedicated mode or when called off the designated thread.
    pub fn pump(&self) -> usize {
        if self.mode != DispatchMode::Manual {
            return 0;
        }
        if !self.on_designated_context() {
            warn!("pump_events called off the designated thread, ignoring");
            return 0;
        }

        let mut count = 0;
        while let Ok(envelope) = self.rx.try_recv() {
            if let Envelope::Event(event) = envelope {
                deliver(&self.observer, &event);
            }
            count += 1;
        }
        count
    }

    /// Number of events waiting for delivery
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = self.tx.send(Envelope::Shutdown);
            // Dropped from inside a callback: the worker exits on its own
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn deliver(observer: &ObserverSlot, event: &ObserverEvent) {
    // Clone out of the lock so callbacks may re-register observers
    let current = observer.read().clone();
    match current {
        Some(observer) => event.deliver(observer.as_ref()),
        None => trace!("No observer registered, dropping {} event", event.name()),
    }
}

fn dispatch_loop(rx: Receiver<Envelope>, observer: ObserverSlot) {
    debug!("Dispatch thread started");
    loop {
        match rx.recv() {
            Ok(Envelope::Event(event)) => deliver(&observer, &event),
            Ok(Envelope::Shutdown) => break,
            Err(_) => break,
        }
    }
    debug!("Dispatch thread exiting");
}
