use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, TryRecvError};
use log::{debug, info, warn};
use simconnect::{Connector, Message, Transport};

use super::{Shared, Snapshots};
use crate::{
    codec,
    publisher::{StatusPublisher, AIRPLANE_EVENT, ENVIRONMENT_EVENT, SIMULATOR_EVENT},
    registry::{SystemEvent, SystemStateRequest},
    types::TelemetryFrame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Applies inbound messages to the snapshots and publishes the results.
pub(crate) struct Dispatcher<'a> {
    snapshots: &'a Snapshots,
    publisher: &'a StatusPublisher,
    last_response: Option<Instant>,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(snapshots: &'a Snapshots, publisher: &'a StatusPublisher) -> Self {
        Self {
            snapshots,
            publisher,
            last_response: None,
        }
    }

    /// True once a system state response has been seen and none arrived for `timeout`.
    pub(crate) fn heartbeat_expired(&self, timeout: Duration) -> bool {
        self.last_response
            .is_some_and(|last| last.elapsed() > timeout)
    }

    pub(crate) fn handle(&mut self, message: Message) -> Flow {
        match message {
            Message::Quit => return Flow::Quit,
            Message::Open {
                application_name,
                application_version,
                ..
            } => {
                debug!(
                    "SimConnect connection established with {} {}.{}",
                    application_name, application_version.0, application_version.1
                );
            }
            Message::Exception {
                exception,
                send_id,
                index,
            } => {
                warn!(
                    "SimConnect exception {} for send id {} (parameter {})",
                    exception, send_id, index
                );
            }
            Message::Event { event_id, data, .. } => self.on_event(event_id, data, None),
            Message::EventFilename {
                event_id,
                data,
                file_name,
                ..
            } => self.on_event(event_id, data, Some(file_name)),
            Message::SystemState {
                request_id,
                integer,
                string,
                ..
            } => self.on_system_state(request_id, integer, string),
            Message::SimObjectData {
                define_id, data, ..
            } => self.on_object_data(define_id, &data),
            Message::Null | Message::Unknown { .. } => {}
        }

        Flow::Continue
    }

    fn on_event(&mut self, event_id: u32, data: u32, file_name: Option<String>) {
        let Some(event) = SystemEvent::from_raw(event_id) else {
            debug!("Ignoring unknown event {}", event_id);
            return;
        };

        let file_name = file_name.unwrap_or_default();
        let state = self.snapshots.update_simulator(|state| match event {
            SystemEvent::Pause => state.paused = data as i32,
            SystemEvent::Crashed => state.crashed = 1,
            SystemEvent::CrashReset => state.crashed = 0,
            SystemEvent::Sim => state.sim = data as i32,
            SystemEvent::View => state.view = data as i32,
            SystemEvent::AircraftLoaded => state.aircraft_loaded = file_name,
            SystemEvent::FlightLoaded => state.flight_loaded = file_name,
            SystemEvent::FlightPlanActivated => state.flight_plan = file_name,
            SystemEvent::FlightPlanDeactivated => state.flight_plan.clear(),
        });

        debug!("{} event: {}", event.name(), data);
        self.publisher.publish_state(SIMULATOR_EVENT, &state);
    }

    fn on_system_state(&mut self, request_id: u32, integer: u32, string: String) {
        let Some(request) = SystemStateRequest::from_raw(request_id) else {
            debug!("Ignoring system state for unknown request {}", request_id);
            return;
        };
        self.last_response = Some(Instant::now());

        let state = self.snapshots.update_simulator(|state| match request {
            SystemStateRequest::Sim => state.sim = integer as i32,
            SystemStateRequest::AircraftLoaded => state.aircraft_loaded = string,
            SystemStateRequest::FlightLoaded => state.flight_loaded = string,
            SystemStateRequest::FlightPlan => state.flight_plan = string,
        });

        self.publisher.publish_state(SIMULATOR_EVENT, &state);
    }

    fn on_object_data(&mut self, define_id: u32, data: &[u8]) {
        match codec::decode(define_id, data) {
            Ok(TelemetryFrame::Airplane(airplane)) => {
                debug!("AirplaneState: {:?}", airplane);
                self.snapshots.set_airplane(airplane.clone());
                self.publisher.publish_state(AIRPLANE_EVENT, &airplane);
            }
            Ok(TelemetryFrame::Environment(environment)) => {
                self.snapshots.set_environment(environment.clone());
                self.publisher.publish_state(ENVIRONMENT_EVENT, &environment);
            }
            Ok(TelemetryFrame::Simulator(data)) => {
                let state = self.snapshots.update_simulator(|state| state.apply_data(data));
                self.publisher.publish_state(SIMULATOR_EVENT, &state);
            }
            Err(e) => warn!("Failed to decode data for definition {}: {}", define_id, e),
        }
    }
}

/// The receive loop of one epoch.
pub(super) fn run<C: Connector>(
    shared: Arc<Shared<C>>,
    transport: Arc<C::Transport>,
    epoch: u64,
    stop: Receiver<()>,
) {
    let mut dispatcher = Dispatcher::new(&shared.snapshots, &shared.publisher);

    loop {
        if matches!(stop.try_recv(), Err(TryRecvError::Disconnected)) || !shared.is_current(epoch) {
            break;
        }

        match transport.next_message(shared.config.poll_interval) {
            Ok(Some(message)) => {
                if dispatcher.handle(message) == Flow::Quit {
                    info!("SimConnect quit signal received");
                    shared.disconnect(epoch, "simulator quit");
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!("SimConnect error: {}", e);
                // back off before polling a failing transport again
                std::thread::sleep(shared.config.poll_interval);
            }
        }

        // checked on every pass, a silent transport never produces a message to react to
        if dispatcher.heartbeat_expired(shared.config.heartbeat_timeout) {
            warn!("Missed system state response, treating as disconnect.");
            shared.disconnect(epoch, "heartbeat timeout");
            break;
        }
    }

    debug!("Dispatcher for epoch {} stopped.", epoch);
}
