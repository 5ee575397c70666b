//! Connectivity and state-change notifications.
//!
//! Nothing in here may block the session loops. The status channel holds a single
//! value and a newer status replaces an unread one; event emission to an attached
//! [`EventSink`] happens on its own thread.

use std::{
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread::JoinHandle,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, warn};
use serde::Serialize;

pub const STATUS_EVENT: &str = "global::sim-status";
pub const AIRPLANE_EVENT: &str = "airplane::state";
pub const ENVIRONMENT_EVENT: &str = "environment::state";
pub const SIMULATOR_EVENT: &str = "simulator::state";

/// Receives named events for a presentation layer.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

impl<F> EventSink for F
where
    F: Fn(&str, serde_json::Value) + Send + Sync + 'static,
{
    fn emit(&self, event: &str, payload: serde_json::Value) {
        self(event, payload)
    }
}

struct Emission {
    event: &'static str,
    payload: serde_json::Value,
}

struct Emitter {
    tx: Sender<Emission>,
    _worker: JoinHandle<()>,
}

impl Emitter {
    fn spawn(sink: Box<dyn EventSink>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Emission>();
        let worker = std::thread::spawn(move || {
            for emission in rx.iter() {
                sink.emit(emission.event, emission.payload);
            }
            debug!("Event emitter stopped.");
        });

        Self {
            tx,
            _worker: worker,
        }
    }
}

pub struct StatusPublisher {
    tx: Sender<bool>,
    rx: Receiver<bool>,
    emitter: RwLock<Option<Emitter>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            tx,
            rx,
            emitter: RwLock::new(None),
        }
    }

    /// A receiver of connectivity changes. Receivers share one slot, so each
    /// change is delivered to at most one of them.
    pub fn subscribe(&self) -> Receiver<bool> {
        self.rx.clone()
    }

    /// Replaces any previously attached sink. Dropping the old sink's channel ends
    /// its thread once queued events are delivered.
    pub fn attach(&self, sink: Box<dyn EventSink>) {
        *self.write() = Some(Emitter::spawn(sink));
    }

    pub fn detach(&self) {
        *self.write() = None;
    }

    pub fn publish_status(&self, connected: bool) {
        let mut value = connected;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => break,
                Err(TrySendError::Full(v)) => {
                    // evict the stale value and retry with ours
                    _ = self.rx.try_recv();
                    value = v;
                }
                Err(TrySendError::Disconnected(_)) => break,
            }
        }

        self.emit(STATUS_EVENT, serde_json::Value::Bool(connected));
    }

    pub fn publish_state<T: Serialize>(&self, event: &'static str, state: &T) {
        let emitter = self.read();
        let Some(emitter) = emitter.as_ref() else {
            return;
        };

        match serde_json::to_value(state) {
            Ok(payload) => {
                _ = emitter.tx.send(Emission { event, payload });
            }
            Err(e) => warn!("Failed to serialize {} payload: {}", event, e),
        }
    }

    fn emit(&self, event: &'static str, payload: serde_json::Value) {
        if let Some(emitter) = self.read().as_ref() {
            _ = emitter.tx.send(Emission { event, payload });
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Emitter>> {
        self.emitter.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Emitter>> {
        self.emitter.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
