//! Everything the recorder declares to the simulator on every connection.
//!
//! SimConnect forgets all registrations when a session ends, so the whole set is
//! replayed in the same order with the same identifiers after each reconnect.
//! Payload offsets follow declaration order: the field tables here are also the
//! layout tables used by the codec.

use log::{debug, warn};
use simconnect::{DataRequestFlags, DataType, Period, Transport, OBJECT_ID_USER};

/// One simulation variable within a data definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub unit: &'static str,
    pub datatype: DataType,
}

impl Field {
    pub const fn new(name: &'static str, unit: &'static str, datatype: DataType) -> Self {
        Self {
            name,
            unit,
            datatype,
        }
    }

    /// Wire width of the field. Variable-width types are never declared.
    pub fn width(&self) -> usize {
        self.datatype.size().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DefinitionId {
    Airplane = 1,
    Environment = 2,
    Simulator = 3,
}

impl DefinitionId {
    pub fn from_raw(id: u32) -> Option<Self> {
        match id {
            1 => Some(DefinitionId::Airplane),
            2 => Some(DefinitionId::Environment),
            3 => Some(DefinitionId::Simulator),
            _ => None,
        }
    }

    pub fn definition(self) -> &'static Definition {
        match self {
            DefinitionId::Airplane => &AIRPLANE,
            DefinitionId::Environment => &ENVIRONMENT,
            DefinitionId::Simulator => &SIMULATOR,
        }
    }
}

/// An ordered list of variables, delivered together as one packed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub id: DefinitionId,
    pub fields: &'static [Field],
}

impl Definition {
    /// Byte offset of every field, in declaration order.
    pub fn offsets(&self) -> Vec<usize> {
        self.fields
            .iter()
            .scan(0, |offset, field| {
                let current = *offset;
                *offset += field.width();
                Some(current)
            })
            .collect()
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.fields.iter().map(Field::width).sum()
    }
}

pub const AIRPLANE: Definition = Definition {
    id: DefinitionId::Airplane,
    fields: &[
        Field::new("PLANE LATITUDE", "radians", DataType::Float64),
        Field::new("PLANE LONGITUDE", "radians", DataType::Float64),
        Field::new("PLANE ALTITUDE", "feet", DataType::Float64),
        Field::new("PLANE HEADING DEGREES TRUE", "radians", DataType::Float64),
        Field::new("PLANE HEADING DEGREES MAGNETIC", "radians", DataType::Float64),
        Field::new("AIRSPEED INDICATED", "knots", DataType::Float64),
        Field::new("PLANE BANK DEGREES", "radians", DataType::Float64),
        Field::new("PLANE PITCH DEGREES", "radians", DataType::Float64),
        Field::new("VERTICAL SPEED", "feet per minute", DataType::Float64),
        Field::new("TITLE", "", DataType::String256),
    ],
};

pub const ENVIRONMENT: Definition = Definition {
    id: DefinitionId::Environment,
    fields: &[
        Field::new("ZULU YEAR", "number", DataType::Int32),
        Field::new("ZULU MONTH OF YEAR", "number", DataType::Int32),
        Field::new("ZULU DAY OF MONTH", "number", DataType::Int32),
        Field::new("ZULU TIME", "seconds", DataType::Int32),
        Field::new("LOCAL YEAR", "number", DataType::Int32),
        Field::new("LOCAL MONTH OF YEAR", "number", DataType::Int32),
        Field::new("LOCAL DAY OF MONTH", "number", DataType::Int32),
        Field::new("LOCAL TIME", "seconds", DataType::Int32),
        Field::new("TIME OF DAY", "enum", DataType::Int32),
        Field::new("AMBIENT PRESSURE", "inHg", DataType::Float64),
        Field::new("AMBIENT TEMPERATURE", "celsius", DataType::Float64),
        Field::new("AMBIENT WIND DIRECTION", "degrees", DataType::Float64),
        Field::new("AMBIENT WIND VELOCITY", "knots", DataType::Float64),
        Field::new("AMBIENT VISIBILITY", "meters", DataType::Float64),
        Field::new("ZULU SUNRISE TIME", "seconds", DataType::Int32),
        Field::new("ZULU SUNSET TIME", "seconds", DataType::Int32),
    ],
};

pub const SIMULATOR: Definition = Definition {
    id: DefinitionId::Simulator,
    fields: &[
        Field::new("SIM ON GROUND", "bool", DataType::Int32),
        Field::new("PLANE IN PARKING STATE", "bool", DataType::Int32),
        Field::new("ON ANY RUNWAY", "bool", DataType::Int32),
        Field::new("SURFACE TYPE", "enum", DataType::Int32),
        Field::new("SURFACE CONDITION", "enum", DataType::Int32),
        Field::new("SURFACE INFO VALID", "bool", DataType::Int32),
        Field::new("SIMULATION RATE", "number", DataType::Float64),
    ],
};

pub const DEFINITIONS: &[Definition] = &[AIRPLANE, ENVIRONMENT, SIMULATOR];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RequestId {
    Airplane = 1,
    Environment = 2,
    Simulator = 3,
}

/// A periodic subscription to a definition on a simulation object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    pub id: RequestId,
    pub definition: DefinitionId,
    pub object_id: u32,
    pub period: Period,
    pub flags: DataRequestFlags,
}

impl DataRequest {
    const fn user_aircraft(id: RequestId, definition: DefinitionId) -> Self {
        Self {
            id,
            definition,
            object_id: OBJECT_ID_USER,
            period: Period::Second,
            flags: DataRequestFlags::CHANGED,
        }
    }
}

pub const DATA_REQUESTS: &[DataRequest] = &[
    DataRequest::user_aircraft(RequestId::Airplane, DefinitionId::Airplane),
    DataRequest::user_aircraft(RequestId::Environment, DefinitionId::Environment),
    DataRequest::user_aircraft(RequestId::Simulator, DefinitionId::Simulator),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SystemEvent {
    Pause = 1,
    Crashed = 2,
    CrashReset = 3,
    Sim = 4,
    View = 5,
    AircraftLoaded = 6,
    FlightLoaded = 7,
    FlightPlanActivated = 8,
    FlightPlanDeactivated = 9,
}

impl SystemEvent {
    pub const ALL: [SystemEvent; 9] = [
        SystemEvent::Pause,
        SystemEvent::Crashed,
        SystemEvent::CrashReset,
        SystemEvent::Sim,
        SystemEvent::View,
        SystemEvent::AircraftLoaded,
        SystemEvent::FlightLoaded,
        SystemEvent::FlightPlanActivated,
        SystemEvent::FlightPlanDeactivated,
    ];

    pub fn from_raw(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|event| *event as u32 == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            SystemEvent::Pause => "Pause",
            SystemEvent::Crashed => "Crashed",
            SystemEvent::CrashReset => "CrashReset",
            SystemEvent::Sim => "Sim",
            SystemEvent::View => "View",
            SystemEvent::AircraftLoaded => "AircraftLoaded",
            SystemEvent::FlightLoaded => "FlightLoaded",
            SystemEvent::FlightPlanActivated => "FlightPlanActivated",
            SystemEvent::FlightPlanDeactivated => "FlightPlanDeactivated",
        }
    }
}

/// One-shot system state queries. `Sim` doubles as the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SystemStateRequest {
    Sim = 1001,
    AircraftLoaded = 1002,
    FlightLoaded = 1003,
    FlightPlan = 1004,
}

impl SystemStateRequest {
    pub const ALL: [SystemStateRequest; 4] = [
        SystemStateRequest::Sim,
        SystemStateRequest::AircraftLoaded,
        SystemStateRequest::FlightLoaded,
        SystemStateRequest::FlightPlan,
    ];

    pub const HEARTBEAT: SystemStateRequest = SystemStateRequest::Sim;

    pub fn from_raw(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|request| *request as u32 == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            SystemStateRequest::Sim => "Sim",
            SystemStateRequest::AircraftLoaded => "AircraftLoaded",
            SystemStateRequest::FlightLoaded => "FlightLoaded",
            SystemStateRequest::FlightPlan => "FlightPlan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ClientEvent {
    PauseSet = 100,
}

impl ClientEvent {
    pub fn name(self) -> &'static str {
        match self {
            ClientEvent::PauseSet => "PAUSE_SET",
        }
    }
}

/// Outcome of one registration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub attempted: usize,
    pub failed: usize,
}

impl RegistrationReport {
    fn record<E: std::fmt::Display>(&mut self, what: &str, result: Result<(), E>) {
        self.attempted += 1;
        if let Err(e) = result {
            self.failed += 1;
            warn!("Registration of {} failed: {}", what, e);
        }
    }
}

/// Declares every definition, request, subscription and startup query.
///
/// Failures are logged and skipped; the affected fields simply never update.
pub fn register_all<T: Transport + ?Sized>(transport: &T) -> RegistrationReport {
    let mut report = RegistrationReport::default();

    for definition in DEFINITIONS {
        for (index, field) in definition.fields.iter().enumerate() {
            let result = transport.add_to_data_definition(
                definition.id as u32,
                field.name,
                field.unit,
                field.datatype,
                index as u32,
            );
            report.record(field.name, result);
        }
    }

    for request in DATA_REQUESTS {
        let result = transport.request_data_on_sim_object(
            request.id as u32,
            request.definition as u32,
            request.object_id,
            request.period,
            request.flags,
        );
        report.record(&format!("{:?} data request", request.id), result);
    }

    for event in SystemEvent::ALL {
        let result = transport.subscribe_to_system_event(event as u32, event.name());
        report.record(&format!("{} event subscription", event.name()), result);
    }

    for request in SystemStateRequest::ALL {
        let result = transport.request_system_state(request as u32, request.name());
        report.record(&format!("{} system state query", request.name()), result);
    }

    debug!(
        "Registered {} of {} declarations",
        report.attempted - report.failed,
        report.attempted
    );

    report
}
