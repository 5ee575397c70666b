//! An in-process stand-in for the simulator, used by the session tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use simconnect::{Connector, DataRequestFlags, DataType, Error, Message, Period, Transport};

use crate::registry::SystemStateRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    AddToDataDefinition {
        define_id: u32,
        datum_name: String,
        datum_id: u32,
    },
    RequestData {
        request_id: u32,
        define_id: u32,
    },
    SubscribeToSystemEvent {
        event_id: u32,
        name: String,
    },
    RequestSystemState {
        request_id: u32,
        state: String,
    },
    TransmitClientEvent {
        event_id: u32,
        name: String,
        param: u32,
    },
    Close,
}

pub struct MockTransport {
    calls: Mutex<Vec<Call>>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    fail_registrations: AtomicBool,
    fail_probes: AtomicBool,
    fail_transmits: AtomicBool,
    /// Number of heartbeat probes still answered automatically.
    heartbeat_answers: AtomicUsize,
    closes: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            calls: Mutex::new(Vec::new()),
            tx,
            rx,
            fail_registrations: AtomicBool::new(false),
            fail_probes: AtomicBool::new(false),
            fail_transmits: AtomicBool::new(false),
            heartbeat_answers: AtomicUsize::new(usize::MAX),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push(&self, message: Message) {
        self.tx.send(message).unwrap();
    }

    pub fn fail_registrations(&self) {
        self.fail_registrations.store(true, Ordering::SeqCst);
    }

    pub fn fail_probes(&self) {
        self.fail_probes.store(true, Ordering::SeqCst);
    }

    pub fn fail_transmits(&self) {
        self.fail_transmits.store(true, Ordering::SeqCst);
    }

    /// Answers the next `count` heartbeat probes, then goes silent.
    pub fn answer_heartbeats(&self, count: usize) {
        self.heartbeat_answers.store(count, Ordering::SeqCst);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn registration(&self, call: Call) -> Result<(), Error> {
        self.record(call);
        if self.fail_registrations.load(Ordering::SeqCst) {
            Err(Error::Call {
                call: "registration",
                hresult: -1,
            })
        } else {
            Ok(())
        }
    }
}

impl Transport for MockTransport {
    fn add_to_data_definition(
        &self,
        define_id: u32,
        datum_name: &str,
        _units: &str,
        _datatype: DataType,
        datum_id: u32,
    ) -> Result<(), Error> {
        self.registration(Call::AddToDataDefinition {
            define_id,
            datum_name: datum_name.to_owned(),
            datum_id,
        })
    }

    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        define_id: u32,
        _object_id: u32,
        _period: Period,
        _flags: DataRequestFlags,
    ) -> Result<(), Error> {
        self.registration(Call::RequestData {
            request_id,
            define_id,
        })
    }

    fn subscribe_to_system_event(&self, event_id: u32, name: &str) -> Result<(), Error> {
        self.registration(Call::SubscribeToSystemEvent {
            event_id,
            name: name.to_owned(),
        })
    }

    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), Error> {
        self.record(Call::RequestSystemState {
            request_id,
            state: state.to_owned(),
        });

        if request_id != SystemStateRequest::HEARTBEAT as u32 {
            return Ok(());
        }
        if self.fail_probes.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }

        let answer = self
            .heartbeat_answers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if answer {
            self.push(Message::SystemState {
                request_id,
                integer: 1,
                float: 0.0,
                string: String::new(),
            });
        }
        Ok(())
    }

    fn map_and_transmit_client_event(
        &self,
        event_id: u32,
        name: &str,
        param: u32,
    ) -> Result<(), Error> {
        self.record(Call::TransmitClientEvent {
            event_id,
            name: name.to_owned(),
            param,
        });
        if self.fail_transmits.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    fn next_message(&self, timeout: Duration) -> Result<Option<Message>, Error> {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Closed),
        }
    }

    fn close(&self) -> Result<(), Error> {
        self.record(Call::Close);
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the queued transports in order, then refuses to open.
#[derive(Clone)]
pub struct MockConnector {
    transports: Arc<Mutex<VecDeque<Arc<MockTransport>>>>,
    opens: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(transports: Vec<Arc<MockTransport>>) -> Self {
        Self {
            transports: Arc::new(Mutex::new(transports.into())),
            opens: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Refuses the first `count` opens before handing out transports.
    pub fn failing_first(count: usize, transports: Vec<Arc<MockTransport>>) -> Self {
        let connector = Self::new(transports);
        connector.failures.store(count, Ordering::SeqCst);
        connector
    }

    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    type Transport = Arc<MockTransport>;

    fn open(&self, _app_name: &str) -> Result<Arc<MockTransport>, Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let refused = Error::Call {
            call: "SimConnect_Open",
            hresult: -1,
        };
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(refused);
        }
        self.transports.lock().unwrap().pop_front().ok_or(refused)
    }
}

/// Polls `condition` until it holds or `timeout` runs out.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
