//! Decoding of `SIMCONNECT_RECV*` packets.
//!
//! The SDK declares every receive structure with `#pragma pack(1)`, so offsets
//! below are computed by hand from the field sequence instead of mirroring the
//! structures in Rust. All integers are little-endian DWORDs.

const HEADER_SIZE: usize = 12;
const MAX_PATH: usize = 260;
const APPLICATION_NAME_SIZE: usize = 256;

mod recv_id {
    pub const NULL: u32 = 0;
    pub const EXCEPTION: u32 = 1;
    pub const OPEN: u32 = 2;
    pub const QUIT: u32 = 3;
    pub const EVENT: u32 = 4;
    pub const EVENT_FILENAME: u32 = 6;
    pub const SIMOBJECT_DATA: u32 = 8;
    pub const SIMOBJECT_DATA_BYTYPE: u32 = 9;
    pub const SYSTEM_STATE: u32 = 15;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("packet truncated: needed {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },
}

/// An inbound message from the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Null,
    Exception {
        exception: u32,
        send_id: u32,
        index: u32,
    },
    Open {
        application_name: String,
        application_version: (u32, u32),
        simconnect_version: (u32, u32),
    },
    Quit,
    Event {
        group_id: u32,
        event_id: u32,
        data: u32,
    },
    EventFilename {
        group_id: u32,
        event_id: u32,
        data: u32,
        file_name: String,
        flags: u32,
    },
    SimObjectData {
        request_id: u32,
        object_id: u32,
        define_id: u32,
        flags: u32,
        entry_number: u32,
        out_of: u32,
        define_count: u32,
        data: Vec<u8>,
    },
    SystemState {
        request_id: u32,
        integer: u32,
        float: f32,
        string: String,
    },
    Unknown {
        id: u32,
    },
}

impl Message {
    pub fn decode(buf: &[u8]) -> Result<Message, DecodeError> {
        let packet = Packet { buf };
        // dwSize at 0 and dwVersion at 4 are not needed, the buffer length is authoritative
        let id = packet.u32(8)?;

        let message = match id {
            recv_id::NULL => Message::Null,
            recv_id::EXCEPTION => Message::Exception {
                exception: packet.u32(HEADER_SIZE)?,
                send_id: packet.u32(HEADER_SIZE + 4)?,
                index: packet.u32(HEADER_SIZE + 8)?,
            },
            recv_id::OPEN => {
                let versions = HEADER_SIZE + APPLICATION_NAME_SIZE;
                Message::Open {
                    application_name: packet.string(HEADER_SIZE, APPLICATION_NAME_SIZE)?,
                    application_version: (packet.u32(versions)?, packet.u32(versions + 4)?),
                    simconnect_version: (packet.u32(versions + 16)?, packet.u32(versions + 20)?),
                }
            }
            recv_id::QUIT => Message::Quit,
            recv_id::EVENT => Message::Event {
                group_id: packet.u32(HEADER_SIZE)?,
                event_id: packet.u32(HEADER_SIZE + 4)?,
                data: packet.u32(HEADER_SIZE + 8)?,
            },
            recv_id::EVENT_FILENAME => Message::EventFilename {
                group_id: packet.u32(HEADER_SIZE)?,
                event_id: packet.u32(HEADER_SIZE + 4)?,
                data: packet.u32(HEADER_SIZE + 8)?,
                file_name: packet.string(HEADER_SIZE + 12, MAX_PATH)?,
                flags: packet.u32(HEADER_SIZE + 12 + MAX_PATH)?,
            },
            recv_id::SIMOBJECT_DATA | recv_id::SIMOBJECT_DATA_BYTYPE => Message::SimObjectData {
                request_id: packet.u32(HEADER_SIZE)?,
                object_id: packet.u32(HEADER_SIZE + 4)?,
                define_id: packet.u32(HEADER_SIZE + 8)?,
                flags: packet.u32(HEADER_SIZE + 12)?,
                entry_number: packet.u32(HEADER_SIZE + 16)?,
                out_of: packet.u32(HEADER_SIZE + 20)?,
                define_count: packet.u32(HEADER_SIZE + 24)?,
                data: packet.bytes(HEADER_SIZE + 28)?.to_vec(),
            },
            recv_id::SYSTEM_STATE => Message::SystemState {
                request_id: packet.u32(HEADER_SIZE)?,
                integer: packet.u32(HEADER_SIZE + 4)?,
                float: f32::from_bits(packet.u32(HEADER_SIZE + 8)?),
                string: packet.string(HEADER_SIZE + 12, MAX_PATH)?,
            },
            id => Message::Unknown { id },
        };

        Ok(message)
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, Message::Quit)
    }
}

/// Decodes a fixed-width, NUL-padded string. Stops at the first NUL, or takes the
/// whole field when there is none.
pub fn decode_fixed_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

struct Packet<'a> {
    buf: &'a [u8],
}

impl<'a> Packet<'a> {
    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        let needed = offset + len;
        self.buf.get(offset..needed).ok_or(DecodeError::Truncated {
            needed,
            len: self.buf.len(),
        })
    }

    fn u32(&self, offset: usize) -> Result<u32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.slice(offset, 4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn string(&self, offset: usize, len: usize) -> Result<String, DecodeError> {
        self.slice(offset, len).map(decode_fixed_string)
    }

    fn bytes(&self, offset: usize) -> Result<&'a [u8], DecodeError> {
        self.buf.get(offset..).ok_or(DecodeError::Truncated {
            needed: offset,
            len: self.buf.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(id: u32, body: &[u8]) -> Vec<u8> {
        let size = (HEADER_SIZE + body.len()) as u32;
        let mut buf = Vec::new();
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&6u32.to_le_bytes());
        buf.extend_from_slice(&id.to_le_bytes());
        buf.extend_from_slice(body);
        buf
    }

    fn dwords(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn padded(s: &str, len: usize) -> Vec<u8> {
        let mut out = s.as_bytes().to_vec();
        out.resize(len, 0);
        out
    }

    #[test]
    fn test_quit_and_null() {
        assert_eq!(Message::decode(&packet(3, &[])), Ok(Message::Quit));
        assert_eq!(Message::decode(&packet(0, &[])), Ok(Message::Null));
        assert!(Message::decode(&packet(3, &[])).unwrap().is_quit());
    }

    #[test]
    fn test_event() {
        let msg = Message::decode(&packet(4, &dwords(&[0xFFFF_FFFF, 1, 1]))).unwrap();
        assert_eq!(
            msg,
            Message::Event {
                group_id: 0xFFFF_FFFF,
                event_id: 1,
                data: 1
            }
        );
    }

    #[test]
    fn test_event_filename() {
        let mut body = dwords(&[0, 6, 0]);
        body.extend(padded("SimObjects\\Airplanes\\C172\\aircraft.cfg", MAX_PATH));
        body.extend(dwords(&[0]));

        match Message::decode(&packet(6, &body)).unwrap() {
            Message::EventFilename {
                event_id,
                file_name,
                ..
            } => {
                assert_eq!(event_id, 6);
                assert_eq!(file_name, "SimObjects\\Airplanes\\C172\\aircraft.cfg");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_system_state() {
        let mut body = dwords(&[1001, 1]);
        body.extend(1.5f32.to_le_bytes());
        body.extend(padded("", MAX_PATH));

        assert_eq!(
            Message::decode(&packet(15, &body)).unwrap(),
            Message::SystemState {
                request_id: 1001,
                integer: 1,
                float: 1.5,
                string: String::new(),
            }
        );
    }

    #[test]
    fn test_simobject_data_payload_starts_after_header() {
        let mut body = dwords(&[1, 0, 1, 0, 0, 0, 2]);
        body.extend(42.0f64.to_le_bytes());
        body.extend(7i32.to_le_bytes());

        match Message::decode(&packet(8, &body)).unwrap() {
            Message::SimObjectData {
                request_id,
                define_id,
                define_count,
                data,
                ..
            } => {
                assert_eq!(request_id, 1);
                assert_eq!(define_id, 1);
                assert_eq!(define_count, 2);
                assert_eq!(data.len(), 12);
                assert_eq!(&data[..8], &42.0f64.to_le_bytes());
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_open() {
        let mut body = padded("KittyHawk", APPLICATION_NAME_SIZE);
        body.extend(dwords(&[11, 0, 62651, 3, 11, 0, 62651, 3, 0, 0]));

        match Message::decode(&packet(2, &body)).unwrap() {
            Message::Open {
                application_name,
                application_version,
                simconnect_version,
            } => {
                assert_eq!(application_name, "KittyHawk");
                assert_eq!(application_version, (11, 0));
                assert_eq!(simconnect_version, (11, 0));
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_truncated() {
        assert_eq!(
            Message::decode(&[0, 0, 0]),
            Err(DecodeError::Truncated { needed: 12, len: 3 })
        );
        assert!(matches!(
            Message::decode(&packet(4, &dwords(&[0, 1]))),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_id() {
        assert_eq!(
            Message::decode(&packet(99, &[])),
            Ok(Message::Unknown { id: 99 })
        );
    }

    #[test]
    fn test_fixed_string_without_terminator() {
        assert_eq!(decode_fixed_string(b"ABCD"), "ABCD");
        assert_eq!(decode_fixed_string(b"AB\0D"), "AB");
        assert_eq!(decode_fixed_string(b""), "");
    }
}
