//! The SimConnect session manager.
//!
//! A retry thread moves the session from `Offline` through `Connecting` to
//! `Online`. Every online period is an epoch with its own dispatcher and
//! heartbeat threads; both hold the epoch number they were started for, and
//! teardown only succeeds for the current epoch, so a session is torn down at
//! most once no matter how many threads notice it died.

mod dispatcher;
mod heartbeat;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    thread::JoinHandle,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use simconnect::{Connector, Transport};

use crate::{
    config::ManagerConfig,
    publisher::{EventSink, StatusPublisher, SIMULATOR_EVENT},
    registry::{self, ClientEvent},
    types::{AirplaneState, ConnectionState, EnvironmentState, SimulatorState},
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The latest decoded state of each kind. Readers get copies.
#[derive(Default)]
pub struct Snapshots {
    airplane: RwLock<AirplaneState>,
    environment: RwLock<EnvironmentState>,
    simulator: RwLock<SimulatorState>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn update<T: Clone>(lock: &RwLock<T>, f: impl FnOnce(&mut T)) -> T {
    let mut guard = lock.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard);
    guard.clone()
}

impl Snapshots {
    pub fn airplane(&self) -> AirplaneState {
        read(&self.airplane)
    }

    pub fn environment(&self) -> EnvironmentState {
        read(&self.environment)
    }

    pub fn simulator(&self) -> SimulatorState {
        read(&self.simulator)
    }

    pub(crate) fn set_airplane(&self, state: AirplaneState) {
        update(&self.airplane, |current| *current = state);
    }

    pub(crate) fn set_environment(&self, state: EnvironmentState) {
        update(&self.environment, |current| *current = state);
    }

    /// Applies `f` and returns a copy of the result for publishing.
    pub(crate) fn update_simulator(&self, f: impl FnOnce(&mut SimulatorState)) -> SimulatorState {
        update(&self.simulator, f)
    }
}

struct Session<T> {
    state: ConnectionState,
    transport: Option<Arc<T>>,
    epoch: u64,
}

impl<T> Session<T> {
    fn transition(&mut self, to: ConnectionState) {
        if self.state != to {
            debug!("[SimConnectManager] {} -> {}", self.state, to);
            self.state = to;
        }
    }
}

pub(crate) struct Shared<C: Connector> {
    connector: C,
    config: ManagerConfig,
    session: Mutex<Session<C::Transport>>,
    snapshots: Snapshots,
    publisher: StatusPublisher,
}

impl<C: Connector> Shared<C> {
    fn state(&self) -> ConnectionState {
        lock(&self.session).state
    }

    fn is_current(&self, epoch: u64) -> bool {
        let session = lock(&self.session);
        session.epoch == epoch && session.state == ConnectionState::Online
    }

    fn live_transport(&self) -> Option<Arc<C::Transport>> {
        let session = lock(&self.session);
        match session.state {
            ConnectionState::Online => session.transport.clone(),
            _ => None,
        }
    }

    /// Starts a new epoch if the session is idle.
    fn begin_connecting(&self) -> Option<u64> {
        let mut session = lock(&self.session);
        if session.state != ConnectionState::Offline {
            return None;
        }
        session.epoch += 1;
        session.transition(ConnectionState::Connecting);
        Some(session.epoch)
    }

    fn connect(self: &Arc<Self>, epoch: u64, stop: &Receiver<()>) -> Vec<JoinHandle<()>> {
        info!("[SimConnectManager] Attempting to connect...");

        let transport = match self.connector.open(&self.config.app_name) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                debug!("[SimConnectManager] Connection failed: {}", e);
                lock(&self.session).transition(ConnectionState::Offline);
                self.publisher.publish_status(false);
                return Vec::new();
            }
        };

        let report = registry::register_all(&*transport);
        if report.failed > 0 {
            warn!(
                "[SimConnectManager] {} of {} registrations failed, continuing with partial data.",
                report.failed, report.attempted
            );
        }

        {
            let mut session = lock(&self.session);
            session.transport = Some(transport.clone());
            session.transition(ConnectionState::Online);
        }
        info!("[SimConnectManager] Connected successfully.");
        self.publisher.publish_status(true);

        let dispatcher = {
            let shared = self.clone();
            let transport = transport.clone();
            let stop = stop.clone();
            std::thread::spawn(move || dispatcher::run(shared, transport, epoch, stop))
        };

        let heartbeat = {
            let shared = self.clone();
            let stop = stop.clone();
            std::thread::spawn(move || heartbeat::run(shared, transport, epoch, stop))
        };

        vec![dispatcher, heartbeat]
    }

    /// Tears down `epoch` if it is still live. Returns false when it already ended.
    fn disconnect(&self, epoch: u64, reason: &str) -> bool {
        let transport = {
            let mut session = lock(&self.session);
            if session.epoch != epoch || session.state != ConnectionState::Online {
                return false;
            }
            session.transition(ConnectionState::Offline);
            session.transport.take()
        };

        info!("[SimConnectManager] Disconnected: {}.", reason);
        close(transport);
        self.publisher.publish_status(false);
        true
    }

    /// Tears down whatever is live, regardless of epoch.
    fn shutdown(&self) {
        let (transport, was_online) = {
            let mut session = lock(&self.session);
            let was_online = session.state == ConnectionState::Online;
            session.transition(ConnectionState::Offline);
            (session.transport.take(), was_online)
        };

        close(transport);
        if was_online {
            info!("[SimConnectManager] Disconnected.");
            self.publisher.publish_status(false);
        }
    }
}

fn close<T: Transport>(transport: Option<Arc<T>>) {
    if let Some(transport) = transport {
        if let Err(e) = transport.close() {
            debug!("[SimConnectManager] Failed to close transport: {}", e);
        }
    }
}

fn join_all(workers: &mut Vec<JoinHandle<()>>) {
    for worker in workers.drain(..) {
        if worker.join().is_err() {
            error!("[SimConnectManager] Session worker panicked.");
        }
    }
}

fn run_retry_loop<C: Connector>(shared: Arc<Shared<C>>, stop: Receiver<()>) {
    let mut workers = Vec::new();

    loop {
        if let Some(epoch) = shared.begin_connecting() {
            debug!("[SimConnectManager] State is Offline, will try to connect.");
            // the previous epoch's threads see the new epoch and wind down
            join_all(&mut workers);
            workers = shared.connect(epoch, &stop);
        }

        match stop.recv_timeout(shared.config.retry_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    join_all(&mut workers);
    debug!("[SimConnectManager] Connection loop stopped.");
}

#[derive(Default)]
struct Control {
    stop: Option<Sender<()>>,
    retry: Option<JoinHandle<()>>,
}

/// Keeps a SimConnect session alive and mirrors its telemetry.
pub struct SimConnectManager<C: Connector> {
    shared: Arc<Shared<C>>,
    control: Mutex<Control>,
}

impl<C: Connector> SimConnectManager<C> {
    pub fn new(connector: C, config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                session: Mutex::new(Session {
                    state: ConnectionState::Offline,
                    transport: None,
                    epoch: 0,
                }),
                snapshots: Snapshots::default(),
                publisher: StatusPublisher::new(),
            }),
            control: Mutex::new(Control::default()),
        }
    }

    /// Starts the background retry loop. Does nothing if it is already running.
    pub fn start_connection(&self) {
        let mut control = lock(&self.control);
        if control.stop.is_some() {
            debug!("[SimConnectManager] Connection loop already running.");
            return;
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let shared = self.shared.clone();
        control.retry = Some(std::thread::spawn(move || run_retry_loop(shared, stop_rx)));
        control.stop = Some(stop_tx);
    }

    /// Stops the retry loop, waits for every session thread to exit, then closes
    /// the live transport, if any.
    pub fn stop_connection(&self) {
        let (stop, retry) = {
            let mut control = lock(&self.control);
            (control.stop.take(), control.retry.take())
        };

        // dropping the sender wakes every thread waiting on the stop channel
        drop(stop);
        if let Some(retry) = retry {
            if retry.join().is_err() {
                error!("[SimConnectManager] Connection loop panicked.");
            }
        }

        self.shared.shutdown();
    }

    /// Whether the session is online.
    pub fn status(&self) -> bool {
        self.shared.state() == ConnectionState::Online
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Connectivity changes. Only the latest unread value is kept.
    pub fn status_changes(&self) -> Receiver<bool> {
        self.shared.publisher.subscribe()
    }

    pub fn airplane_state(&self) -> AirplaneState {
        self.shared.snapshots.airplane()
    }

    pub fn environment_state(&self) -> EnvironmentState {
        self.shared.snapshots.environment()
    }

    pub fn simulator_state(&self) -> SimulatorState {
        self.shared.snapshots.simulator()
    }

    pub fn attach_event_sink(&self, sink: impl EventSink) {
        self.shared.publisher.attach(Box::new(sink));
    }

    pub fn detach_event_sink(&self) {
        self.shared.publisher.detach();
    }

    /// Asks the simulator to flip its pause state, based on the last known pause flag.
    ///
    /// Failures are only logged.
    pub fn toggle_pause(&self) {
        let Some(transport) = self.shared.live_transport() else {
            warn!("[SimConnectManager] Cannot toggle pause while offline.");
            return;
        };

        let paused = self.shared.snapshots.simulator().paused;
        let param = u32::from(paused == 0);
        let event = ClientEvent::PauseSet;

        match transport.map_and_transmit_client_event(event as u32, event.name(), param) {
            Ok(()) => {
                debug!("[SimConnectManager] Sent {} {}.", event.name(), param);
                let state = self
                    .shared
                    .snapshots
                    .update_simulator(|state| state.paused = param as i32);
                self.shared.publisher.publish_state(SIMULATOR_EVENT, &state);
            }
            Err(e) => warn!("[SimConnectManager] Failed to send {}: {}", event.name(), e),
        }
    }
}

impl<C: Connector> Drop for SimConnectManager<C> {
    fn drop(&mut self) {
        self.stop_connection();
    }
}
