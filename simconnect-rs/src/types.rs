/// Object id of the user's aircraft in every `RequestDataOnSimObject` call.
pub const OBJECT_ID_USER: u32 = 0;

/// Wire type of a single datum within a data definition (`SIMCONNECT_DATATYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DataType {
    Invalid = 0,
    Int32 = 1,
    Int64 = 2,
    Float32 = 3,
    Float64 = 4,
    String8 = 5,
    String32 = 6,
    String64 = 7,
    String128 = 8,
    String256 = 9,
    String260 = 10,
}

impl DataType {
    /// Width of the datum on the wire. Data is packed, there is no padding between datums.
    pub fn size(self) -> Option<usize> {
        match self {
            DataType::Invalid => None,
            DataType::Int32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::Float64 => Some(8),
            DataType::String8 => Some(8),
            DataType::String32 => Some(32),
            DataType::String64 => Some(64),
            DataType::String128 => Some(128),
            DataType::String256 => Some(256),
            DataType::String260 => Some(260),
        }
    }

    pub fn is_string(self) -> bool {
        matches!(
            self,
            DataType::String8
                | DataType::String32
                | DataType::String64
                | DataType::String128
                | DataType::String256
                | DataType::String260
        )
    }
}

/// How often the simulator should deliver data for a request (`SIMCONNECT_PERIOD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Period {
    Never = 0,
    Once = 1,
    VisualFrame = 2,
    SimFrame = 3,
    Second = 4,
}

/// `SIMCONNECT_DATA_REQUEST_FLAG_*` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRequestFlags(pub u32);

impl DataRequestFlags {
    pub const DEFAULT: Self = Self(0);
    /// Only deliver the data when at least one datum changed.
    pub const CHANGED: Self = Self(0x1);
    /// Deliver the data in tagged format.
    pub const TAGGED: Self = Self(0x2);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DataRequestFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
