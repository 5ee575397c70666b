use std::{
    ffi::CString,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

mod recv;
mod transport;
mod types;

pub use recv::{decode_fixed_string, DecodeError, Message};
pub use transport::{Connector, Transport};
pub use types::{DataRequestFlags, DataType, Period, OBJECT_ID_USER};

const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(10);
const SIMCONNECT_GROUP_PRIORITY_HIGHEST: u32 = 1;
const SIMCONNECT_EVENT_FLAG_GROUPID_IS_PRIORITY: u32 = 0x10;

#[allow(non_snake_case, non_camel_case_types, clippy::upper_case_acronyms)]
mod bindings {
    pub type HANDLE = *mut std::ffi::c_void;
    pub type HRESULT = i32;
    pub type DWORD = u32;

    #[cfg(target_os = "windows")]
    #[link(name = "SimConnect")]
    extern "system" {
        pub fn SimConnect_Open(
            phSimConnect: *mut HANDLE,
            szName: *const std::ffi::c_char,
            hWnd: HANDLE,
            UserEventWin32: DWORD,
            hEventHandle: HANDLE,
            ConfigIndex: DWORD,
        ) -> HRESULT;

        pub fn SimConnect_Close(hSimConnect: HANDLE) -> HRESULT;

        pub fn SimConnect_AddToDataDefinition(
            hSimConnect: HANDLE,
            DefineID: DWORD,
            DatumName: *const std::ffi::c_char,
            UnitsName: *const std::ffi::c_char,
            DatumType: DWORD,
            fEpsilon: std::ffi::c_float,
            DatumID: DWORD,
        ) -> HRESULT;

        pub fn SimConnect_RequestDataOnSimObject(
            hSimConnect: HANDLE,
            RequestID: DWORD,
            DefineID: DWORD,
            ObjectID: DWORD,
            Period: DWORD,
            Flags: DWORD,
            origin: DWORD,
            interval: DWORD,
            limit: DWORD,
        ) -> HRESULT;

        pub fn SimConnect_SubscribeToSystemEvent(
            hSimConnect: HANDLE,
            EventID: DWORD,
            SystemEventName: *const std::ffi::c_char,
        ) -> HRESULT;

        pub fn SimConnect_RequestSystemState(
            hSimConnect: HANDLE,
            RequestID: DWORD,
            szState: *const std::ffi::c_char,
        ) -> HRESULT;

        pub fn SimConnect_MapClientEventToSimEvent(
            hSimConnect: HANDLE,
            EventID: DWORD,
            EventName: *const std::ffi::c_char,
        ) -> HRESULT;

        pub fn SimConnect_TransmitClientEvent(
            hSimConnect: HANDLE,
            ObjectID: DWORD,
            EventID: DWORD,
            dwData: DWORD,
            GroupID: DWORD,
            Flags: DWORD,
        ) -> HRESULT;

        pub fn SimConnect_GetNextDispatch(
            hSimConnect: HANDLE,
            ppData: *mut *mut u8,
            pcbData: *mut DWORD,
        ) -> HRESULT;
    }

    // SimConnect only exists on Windows. Elsewhere every entry point reports
    // E_NOTIMPL, and `SimConnection::open` refuses before any of these are reached.
    #[cfg(not(target_os = "windows"))]
    mod unsupported {
        use super::{DWORD, HANDLE, HRESULT};

        const E_NOTIMPL: HRESULT = 0x8000_4001_u32 as i32;

        pub unsafe fn SimConnect_Open(
            _: *mut HANDLE,
            _: *const std::ffi::c_char,
            _: HANDLE,
            _: DWORD,
            _: HANDLE,
            _: DWORD,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_Close(_: HANDLE) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_AddToDataDefinition(
            _: HANDLE,
            _: DWORD,
            _: *const std::ffi::c_char,
            _: *const std::ffi::c_char,
            _: DWORD,
            _: std::ffi::c_float,
            _: DWORD,
        ) -> HRESULT {
            E_NOTIMPL
        }

        #[allow(clippy::too_many_arguments)]
        pub unsafe fn SimConnect_RequestDataOnSimObject(
            _: HANDLE,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_SubscribeToSystemEvent(
            _: HANDLE,
            _: DWORD,
            _: *const std::ffi::c_char,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_RequestSystemState(
            _: HANDLE,
            _: DWORD,
            _: *const std::ffi::c_char,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_MapClientEventToSimEvent(
            _: HANDLE,
            _: DWORD,
            _: *const std::ffi::c_char,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_TransmitClientEvent(
            _: HANDLE,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
            _: DWORD,
        ) -> HRESULT {
            E_NOTIMPL
        }

        pub unsafe fn SimConnect_GetNextDispatch(
            _: HANDLE,
            _: *mut *mut u8,
            _: *mut DWORD,
        ) -> HRESULT {
            E_NOTIMPL
        }
    }

    #[cfg(not(target_os = "windows"))]
    pub use unsupported::*;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SimConnect is only available on Windows")]
    Unsupported,
    #[error("{call} failed with HRESULT {hresult:#010x}")]
    Call { call: &'static str, hresult: i32 },
    #[error("invalid name {0:?}: contains a NUL byte")]
    InvalidName(String),
    #[error("connection is closed")]
    Closed,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

fn check(call: &'static str, hresult: bindings::HRESULT) -> Result<(), Error> {
    if hresult >= 0 {
        Ok(())
    } else {
        Err(Error::Call { call, hresult })
    }
}

fn c_string(value: &str) -> Result<CString, Error> {
    CString::new(value).map_err(|_| Error::InvalidName(value.to_owned()))
}

struct Handle(bindings::HANDLE);

// The handle is an opaque token owned by SimConnect.dll; every use goes through
// the connection mutex.
unsafe impl Send for Handle {}

/// A native SimConnect client session.
pub struct SimConnection {
    handle: Mutex<Option<Handle>>,
}

impl SimConnection {
    pub fn open(app_name: &str) -> Result<Self, Error> {
        if cfg!(not(target_os = "windows")) {
            return Err(Error::Unsupported);
        }

        let name = c_string(app_name)?;
        let mut handle: bindings::HANDLE = std::ptr::null_mut();
        let result = unsafe {
            bindings::SimConnect_Open(
                &mut handle,
                name.as_ptr(),
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
                0,
            )
        };
        check("SimConnect_Open", result)?;

        Ok(Self {
            handle: Mutex::new(Some(Handle(handle))),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Handle>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn call(
        &self,
        call: &'static str,
        f: impl FnOnce(bindings::HANDLE) -> bindings::HRESULT,
    ) -> Result<(), Error> {
        let guard = self.lock();
        let handle = guard.as_ref().ok_or(Error::Closed)?;
        check(call, f(handle.0))
    }

    /// Copies the next queued packet out of SimConnect's buffer, if there is one.
    fn dispatch(&self) -> Result<Option<Vec<u8>>, Error> {
        let guard = self.lock();
        let handle = guard.as_ref().ok_or(Error::Closed)?;

        let mut data: *mut u8 = std::ptr::null_mut();
        let mut len: bindings::DWORD = 0;
        let result = unsafe { bindings::SimConnect_GetNextDispatch(handle.0, &mut data, &mut len) };

        // E_FAIL here only means the queue is empty
        if result < 0 || data.is_null() {
            return Ok(None);
        }

        let packet = unsafe { std::slice::from_raw_parts(data, len as usize) };
        Ok(Some(packet.to_vec()))
    }
}

impl Transport for SimConnection {
    fn add_to_data_definition(
        &self,
        define_id: u32,
        datum_name: &str,
        units: &str,
        datatype: DataType,
        datum_id: u32,
    ) -> Result<(), Error> {
        let datum_name = c_string(datum_name)?;
        let units = c_string(units)?;
        self.call("SimConnect_AddToDataDefinition", |handle| unsafe {
            bindings::SimConnect_AddToDataDefinition(
                handle,
                define_id,
                datum_name.as_ptr(),
                units.as_ptr(),
                datatype as bindings::DWORD,
                0.0,
                datum_id,
            )
        })
    }

    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        define_id: u32,
        object_id: u32,
        period: Period,
        flags: DataRequestFlags,
    ) -> Result<(), Error> {
        self.call("SimConnect_RequestDataOnSimObject", |handle| unsafe {
            bindings::SimConnect_RequestDataOnSimObject(
                handle,
                request_id,
                define_id,
                object_id,
                period as bindings::DWORD,
                flags.0,
                0,
                0,
                0,
            )
        })
    }

    fn subscribe_to_system_event(&self, event_id: u32, name: &str) -> Result<(), Error> {
        let name = c_string(name)?;
        self.call("SimConnect_SubscribeToSystemEvent", |handle| unsafe {
            bindings::SimConnect_SubscribeToSystemEvent(
                handle,
                event_id,
                name.as_ptr(),
            )
        })
    }

    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), Error> {
        let state = c_string(state)?;
        self.call("SimConnect_RequestSystemState", |handle| unsafe {
            bindings::SimConnect_RequestSystemState(
                handle,
                request_id,
                state.as_ptr(),
            )
        })
    }

    fn map_and_transmit_client_event(
        &self,
        event_id: u32,
        name: &str,
        param: u32,
    ) -> Result<(), Error> {
        let name = c_string(name)?;
        self.call("SimConnect_MapClientEventToSimEvent", |handle| unsafe {
            bindings::SimConnect_MapClientEventToSimEvent(
                handle,
                event_id,
                name.as_ptr(),
            )
        })?;
        self.call("SimConnect_TransmitClientEvent", |handle| unsafe {
            bindings::SimConnect_TransmitClientEvent(
                handle,
                OBJECT_ID_USER,
                event_id,
                param,
                SIMCONNECT_GROUP_PRIORITY_HIGHEST,
                SIMCONNECT_EVENT_FLAG_GROUPID_IS_PRIORITY,
            )
        })
    }

    fn next_message(&self, timeout: Duration) -> Result<Option<Message>, Error> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(packet) = self.dispatch()? {
                return Ok(Some(Message::decode(&packet)?));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(DISPATCH_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn close(&self) -> Result<(), Error> {
        let Some(handle) = self.lock().take() else {
            return Ok(());
        };
        check("SimConnect_Close", unsafe {
            bindings::SimConnect_Close(handle.0)
        })
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("Failed to close SimConnect handle: {}", e);
        }
    }
}

/// Opens native [`SimConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConnector;

impl Connector for SimConnector {
    type Transport = SimConnection;

    fn open(&self, app_name: &str) -> Result<SimConnection, Error> {
        SimConnection::open(app_name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    #[cfg(not(target_os = "windows"))]
    fn test_open_is_unsupported() {
        assert!(matches!(
            SimConnector.open("fdr"),
            Err(Error::Unsupported)
        ));
    }

    #[test]
    fn test_check_hresult() {
        assert!(check("SimConnect_Close", 0).is_ok());
        assert!(matches!(
            check("SimConnect_Close", -1),
            Err(Error::Call {
                call: "SimConnect_Close",
                hresult: -1
            })
        ));
    }

    #[test]
    fn test_invalid_name() {
        assert!(matches!(c_string("a\0b"), Err(Error::InvalidName(_))));
    }
}
