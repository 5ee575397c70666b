use std::sync::Arc;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};
use simconnect::{Connector, Transport};

use super::Shared;
use crate::registry::SystemStateRequest;

/// Probes the simulator once per heartbeat interval while `epoch` is live.
///
/// Only transmission failures are detected here. Missing responses are noticed
/// by the dispatcher, which is where the responses arrive.
pub(super) fn run<C: Connector>(
    shared: Arc<Shared<C>>,
    transport: Arc<C::Transport>,
    epoch: u64,
    stop: Receiver<()>,
) {
    let probe = SystemStateRequest::HEARTBEAT;

    loop {
        match stop.recv_timeout(shared.config.heartbeat_interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if !shared.is_current(epoch) {
            break;
        }

        if let Err(e) = transport.request_system_state(probe as u32, probe.name()) {
            warn!("System state request failed, treating as disconnect: {}", e);
            shared.disconnect(epoch, "liveness probe failed");
            break;
        }
    }

    debug!("Heartbeat for epoch {} stopped.", epoch);
}
