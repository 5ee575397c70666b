//! Decoding of object data payloads.
//!
//! Payloads are the declared fields packed back to back, with no alignment. The
//! reader walks a definition's field table in order and checks each datum's type
//! against what the decoder asks for, so a decoder can never drift from the
//! declaration it mirrors.

use simconnect::{decode_fixed_string, DataType};

use crate::{
    registry::{DefinitionId, Field, AIRPLANE, ENVIRONMENT, SIMULATOR},
    types::{AirplaneState, EnvironmentState, SimulatorData, TelemetryFrame, TimeOfDay},
};

/// Vertical speeds closer to zero than this are shown as level flight.
pub const VERTICAL_SPEED_DEADBAND: f64 = 0.1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown definition id {0}")]
    UnknownDefinition(u32),
    #[error("read past the last declared field")]
    Exhausted,
    #[error("field {field} is declared as {found:?}, decoder expected {expected}")]
    KindMismatch {
        field: &'static str,
        expected: &'static str,
        found: DataType,
    },
    #[error("payload truncated at field {field}: needed {needed} bytes, got {len}")]
    Truncated {
        field: &'static str,
        needed: usize,
        len: usize,
    },
}

pub fn radians_to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Snaps near-zero values to zero, then rounds to two decimals.
pub fn round_vertical_speed(value: f64) -> f64 {
    if value.abs() < VERTICAL_SPEED_DEADBAND {
        0.0
    } else {
        (value * 100.0).round() / 100.0
    }
}

/// Sequential reader over a packed payload.
pub struct PayloadReader<'a> {
    fields: std::slice::Iter<'static, Field>,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(fields: &'static [Field], bytes: &'a [u8]) -> Self {
        Self {
            fields: fields.iter(),
            bytes,
            offset: 0,
        }
    }

    fn take(
        &mut self,
        expected: &'static str,
        accepts: impl Fn(DataType) -> bool,
    ) -> Result<&'a [u8], CodecError> {
        let field = self.fields.next().ok_or(CodecError::Exhausted)?;
        if !accepts(field.datatype) {
            return Err(CodecError::KindMismatch {
                field: field.name,
                expected,
                found: field.datatype,
            });
        }

        let end = self.offset + field.width();
        let chunk = self
            .bytes
            .get(self.offset..end)
            .ok_or(CodecError::Truncated {
                field: field.name,
                needed: end,
                len: self.bytes.len(),
            })?;
        self.offset = end;
        Ok(chunk)
    }

    pub fn i32(&mut self) -> Result<i32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take("Int32", |t| t == DataType::Int32)?);
        Ok(i32::from_le_bytes(raw))
    }

    pub fn f64(&mut self) -> Result<f64, CodecError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take("Float64", |t| t == DataType::Float64)?);
        Ok(f64::from_le_bytes(raw))
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        self.take("a fixed string", DataType::is_string)
            .map(decode_fixed_string)
    }

    pub fn degrees(&mut self) -> Result<f64, CodecError> {
        self.f64().map(radians_to_degrees)
    }
}

pub fn decode_airplane(bytes: &[u8]) -> Result<AirplaneState, CodecError> {
    let mut r = PayloadReader::new(AIRPLANE.fields, bytes);
    Ok(AirplaneState {
        latitude: r.degrees()?,
        longitude: r.degrees()?,
        altitude: r.f64()?,
        heading_true: r.degrees()?,
        heading_magnetic: r.degrees()?,
        airspeed: r.f64()?,
        bank: r.degrees()?,
        pitch: r.degrees()?,
        vertical_speed: round_vertical_speed(r.f64()?),
        title: r.string()?,
    })
}

pub fn decode_environment(bytes: &[u8]) -> Result<EnvironmentState, CodecError> {
    let mut r = PayloadReader::new(ENVIRONMENT.fields, bytes);
    Ok(EnvironmentState {
        zulu_year: r.i32()?,
        zulu_month: r.i32()?,
        zulu_day: r.i32()?,
        zulu_time: r.i32()?,
        local_year: r.i32()?,
        local_month: r.i32()?,
        local_day: r.i32()?,
        local_time: r.i32()?,
        time_of_day: TimeOfDay::from_raw(r.i32()?),
        pressure: r.f64()?,
        temperature: r.f64()?,
        wind_direction: r.f64()?,
        wind_velocity: r.f64()?,
        visibility: r.f64()?,
        sunrise: r.i32()?,
        sunset: r.i32()?,
    })
}

pub fn decode_simulator(bytes: &[u8]) -> Result<SimulatorData, CodecError> {
    let mut r = PayloadReader::new(SIMULATOR.fields, bytes);
    Ok(SimulatorData {
        on_ground: r.i32()?,
        parking_state: r.i32()?,
        on_any_runway: r.i32()?,
        surface_type: r.i32()?,
        surface_condition: r.i32()?,
        surface_info_valid: r.i32()?,
        simulation_rate: r.f64()?,
    })
}

/// Decodes the payload of an object data message for `define_id`.
pub fn decode(define_id: u32, bytes: &[u8]) -> Result<TelemetryFrame, CodecError> {
    match DefinitionId::from_raw(define_id) {
        Some(DefinitionId::Airplane) => decode_airplane(bytes).map(TelemetryFrame::Airplane),
        Some(DefinitionId::Environment) => {
            decode_environment(bytes).map(TelemetryFrame::Environment)
        }
        Some(DefinitionId::Simulator) => decode_simulator(bytes).map(TelemetryFrame::Simulator),
        None => Err(CodecError::UnknownDefinition(define_id)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    /// Builds payloads the way the simulator packs them.
    #[derive(Default)]
    pub(crate) struct Payload(Vec<u8>);

    impl Payload {
        pub(crate) fn f64(mut self, value: f64) -> Self {
            self.0.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub(crate) fn i32(mut self, value: i32) -> Self {
            self.0.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub(crate) fn string(mut self, value: &str, width: usize) -> Self {
            let mut raw = value.as_bytes().to_vec();
            raw.resize(width, 0);
            self.0.extend(raw);
            self
        }

        pub(crate) fn build(self) -> Vec<u8> {
            self.0
        }
    }

    pub(crate) fn airplane_payload(heading: f64, vertical_speed: f64, title: &str) -> Vec<u8> {
        Payload::default()
            .f64(PI / 4.0)
            .f64(-PI / 2.0)
            .f64(3500.0)
            .f64(heading)
            .f64(heading)
            .f64(110.0)
            .f64(0.0)
            .f64(0.0)
            .f64(vertical_speed)
            .string(title, 256)
            .build()
    }

    #[test]
    fn test_vertical_speed_rounding() {
        assert_eq!(round_vertical_speed(0.04), 0.0);
        assert_eq!(round_vertical_speed(1.2345), 1.23);
        assert_eq!(round_vertical_speed(-0.05), 0.0);
        assert!(round_vertical_speed(-0.05).is_sign_positive());
        assert_eq!(round_vertical_speed(-512.678), -512.68);
        assert_eq!(round_vertical_speed(0.1), 0.1);
    }

    #[test]
    fn test_radians_to_degrees() {
        assert!((radians_to_degrees(FRAC_PI_2) - 90.0).abs() < 1e-9);
        assert!((radians_to_degrees(-PI) + 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_decode_airplane() {
        let state = decode_airplane(&airplane_payload(FRAC_PI_2, 1.2345, "Cessna Skyhawk")).unwrap();

        assert!((state.latitude - 45.0).abs() < 1e-9);
        assert!((state.longitude + 90.0).abs() < 1e-9);
        assert_eq!(state.altitude, 3500.0);
        assert!((state.heading_true - 90.0).abs() < 1e-9);
        assert!((state.heading_magnetic - 90.0).abs() < 1e-9);
        assert_eq!(state.airspeed, 110.0);
        assert_eq!(state.vertical_speed, 1.23);
        assert_eq!(state.title, "Cessna Skyhawk");
    }

    #[test]
    fn test_decode_is_pure() {
        let payload = airplane_payload(1.0, -700.0, "A320");
        let first = decode(1, &payload).unwrap();
        let _ = decode(1, &airplane_payload(2.0, 5.0, "Other")).unwrap();
        assert_eq!(decode(1, &payload).unwrap(), first);
    }

    #[test]
    fn test_decode_environment_unaligned_doubles() {
        let payload = Payload::default()
            .i32(2025)
            .i32(6)
            .i32(21)
            .i32(43200)
            .i32(2025)
            .i32(6)
            .i32(21)
            .i32(50400)
            .i32(3)
            .f64(29.92)
            .f64(15.5)
            .f64(270.0)
            .f64(12.0)
            .f64(9999.0)
            .i32(18000)
            .i32(72000)
            .build();
        assert_eq!(payload.len(), ENVIRONMENT.size());

        let state = decode_environment(&payload).unwrap();
        assert_eq!(state.zulu_year, 2025);
        assert_eq!(state.local_time, 50400);
        assert_eq!(state.time_of_day, TimeOfDay::Night);
        assert_eq!(state.pressure, 29.92);
        assert_eq!(state.wind_direction, 270.0);
        assert_eq!(state.visibility, 9999.0);
        assert_eq!(state.sunrise, 18000);
        assert_eq!(state.sunset, 72000);
    }

    #[test]
    fn test_decode_environment_keeps_unknown_time_of_day() {
        let mut payload = Payload::default();
        for _ in 0..8 {
            payload = payload.i32(0);
        }
        payload = payload.i32(7);
        for _ in 0..5 {
            payload = payload.f64(0.0);
        }
        let payload = payload.i32(0).i32(0).build();

        let state = decode_environment(&payload).unwrap();
        assert_eq!(state.time_of_day, TimeOfDay::Unknown(7));
    }

    #[test]
    fn test_decode_simulator() {
        let payload = Payload::default()
            .i32(1)
            .i32(0)
            .i32(1)
            .i32(4)
            .i32(2)
            .i32(1)
            .f64(2.0)
            .build();

        match decode(3, &payload).unwrap() {
            TelemetryFrame::Simulator(data) => {
                assert_eq!(data.on_ground, 1);
                assert_eq!(data.on_any_runway, 1);
                assert_eq!(data.surface_type, 4);
                assert_eq!(data.simulation_rate, 2.0);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_title_fills_whole_field() {
        let title = "X".repeat(256);
        let state = decode_airplane(&airplane_payload(0.0, 0.0, &title)).unwrap();
        assert_eq!(state.title.len(), 256);
    }

    #[test]
    fn test_truncated_payload() {
        let mut payload = airplane_payload(0.0, 0.0, "short");
        payload.truncate(100);

        assert_eq!(
            decode_airplane(&payload),
            Err(CodecError::Truncated {
                field: "TITLE",
                needed: 328,
                len: 100
            })
        );
    }

    #[test]
    fn test_unknown_definition() {
        assert_eq!(decode(42, &[]), Err(CodecError::UnknownDefinition(42)));
    }

    #[test]
    fn test_reader_rejects_mismatched_kind() {
        let payload = Payload::default().f64(1.0).build();
        let mut reader = PayloadReader::new(ENVIRONMENT.fields, &payload);
        assert!(matches!(
            reader.f64(),
            Err(CodecError::KindMismatch {
                field: "ZULU YEAR",
                ..
            })
        ));
    }

    #[test]
    fn test_reader_exhausted() {
        let payload = Payload::default().i32(1).f64(1.0).build();
        let mut reader = PayloadReader::new(&SIMULATOR.fields[..1], &payload);
        assert_eq!(reader.i32(), Ok(1));
        assert_eq!(reader.f64(), Err(CodecError::Exhausted));
    }
}
