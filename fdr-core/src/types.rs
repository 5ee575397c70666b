use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Offline,
    Connecting,
    Online,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Offline => "Offline",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Online => "Online",
        };
        f.write_str(name)
    }
}

/// Position and attitude of the user aircraft. Angles are in degrees.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AirplaneState {
    pub latitude: f64,
    pub longitude: f64,
    /// Feet
    pub altitude: f64,
    pub heading_true: f64,
    pub heading_magnetic: f64,
    /// Indicated, knots
    pub airspeed: f64,
    pub bank: f64,
    pub pitch: f64,
    /// Feet per minute, rounded to two decimals
    pub vertical_speed: f64,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    #[default]
    Dawn,
    Day,
    Dusk,
    Night,
    /// A value outside the documented range, kept as received.
    Unknown(i32),
}

impl TimeOfDay {
    pub fn from_raw(value: i32) -> Self {
        match value {
            0 => TimeOfDay::Dawn,
            1 => TimeOfDay::Day,
            2 => TimeOfDay::Dusk,
            3 => TimeOfDay::Night,
            other => TimeOfDay::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvironmentState {
    pub zulu_year: i32,
    pub zulu_month: i32,
    pub zulu_day: i32,
    /// Seconds since midnight
    pub zulu_time: i32,
    pub local_year: i32,
    pub local_month: i32,
    pub local_day: i32,
    /// Seconds since midnight
    pub local_time: i32,
    pub time_of_day: TimeOfDay,
    /// Inches of mercury
    pub pressure: f64,
    /// Celsius
    pub temperature: f64,
    /// Degrees
    pub wind_direction: f64,
    /// Knots
    pub wind_velocity: f64,
    /// Meters
    pub visibility: f64,
    /// Zulu seconds since midnight
    pub sunrise: i32,
    /// Zulu seconds since midnight
    pub sunset: i32,
}

/// Flags and loaded files of the running simulator.
///
/// Three sources write disjoint parts of this state: system events own `sim`,
/// `paused`, `crashed` and `view`; the simulator data definition owns the
/// surface and rate fields ([`SimulatorData`]); file name events and system
/// state responses own the three strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulatorState {
    pub sim: i32,
    pub paused: i32,
    pub crashed: i32,
    pub view: i32,
    pub on_ground: i32,
    pub parking_state: i32,
    pub on_any_runway: i32,
    pub surface_type: i32,
    pub surface_condition: i32,
    pub surface_info_valid: i32,
    pub simulation_rate: f64,
    pub aircraft_loaded: String,
    pub flight_loaded: String,
    pub flight_plan: String,
}

/// The part of [`SimulatorState`] delivered through the simulator data definition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimulatorData {
    pub on_ground: i32,
    pub parking_state: i32,
    pub on_any_runway: i32,
    pub surface_type: i32,
    pub surface_condition: i32,
    pub surface_info_valid: i32,
    pub simulation_rate: f64,
}

impl SimulatorState {
    pub fn apply_data(&mut self, data: SimulatorData) {
        self.on_ground = data.on_ground;
        self.parking_state = data.parking_state;
        self.on_any_runway = data.on_any_runway;
        self.surface_type = data.surface_type;
        self.surface_condition = data.surface_condition;
        self.surface_info_valid = data.surface_info_valid;
        self.simulation_rate = data.simulation_rate;
    }
}

/// A decoded object data payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryFrame {
    Airplane(AirplaneState),
    Environment(EnvironmentState),
    Simulator(SimulatorData),
}
