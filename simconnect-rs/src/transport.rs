use std::{sync::Arc, time::Duration};

use crate::{DataRequestFlags, DataType, Error, Message, Period};

/// The client side of a SimConnect session.
///
/// Calls are request-only: SimConnect acknowledges nothing synchronously, answers
/// arrive later through [`Transport::next_message`].
pub trait Transport: Send + Sync {
    fn add_to_data_definition(
        &self,
        define_id: u32,
        datum_name: &str,
        units: &str,
        datatype: DataType,
        datum_id: u32,
    ) -> Result<(), Error>;

    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        define_id: u32,
        object_id: u32,
        period: Period,
        flags: DataRequestFlags,
    ) -> Result<(), Error>;

    fn subscribe_to_system_event(&self, event_id: u32, name: &str) -> Result<(), Error>;

    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), Error>;

    /// Maps `name` to `event_id` and transmits it to the user aircraft with `param`.
    fn map_and_transmit_client_event(&self, event_id: u32, name: &str, param: u32)
        -> Result<(), Error>;

    /// Waits up to `timeout` for the next inbound message. `Ok(None)` means nothing arrived.
    fn next_message(&self, timeout: Duration) -> Result<Option<Message>, Error>;

    fn close(&self) -> Result<(), Error>;
}

/// Opens a fresh [`Transport`] for every connection attempt.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    fn open(&self, app_name: &str) -> Result<Self::Transport, Error>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn add_to_data_definition(
        &self,
        define_id: u32,
        datum_name: &str,
        units: &str,
        datatype: DataType,
        datum_id: u32,
    ) -> Result<(), Error> {
        (**self).add_to_data_definition(define_id, datum_name, units, datatype, datum_id)
    }

    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        define_id: u32,
        object_id: u32,
        period: Period,
        flags: DataRequestFlags,
    ) -> Result<(), Error> {
        (**self).request_data_on_sim_object(request_id, define_id, object_id, period, flags)
    }

    fn subscribe_to_system_event(&self, event_id: u32, name: &str) -> Result<(), Error> {
        (**self).subscribe_to_system_event(event_id, name)
    }

    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), Error> {
        (**self).request_system_state(request_id, state)
    }

    fn map_and_transmit_client_event(
        &self,
        event_id: u32,
        name: &str,
        param: u32,
    ) -> Result<(), Error> {
        (**self).map_and_transmit_client_event(event_id, name, param)
    }

    fn next_message(&self, timeout: Duration) -> Result<Option<Message>, Error> {
        (**self).next_message(timeout)
    }

    fn close(&self) -> Result<(), Error> {
        (**self).close()
    }
}
