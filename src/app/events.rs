//! Outbound results and bridge statistics.
//!
//! The [`Bridge`](super::service::Bridge) hands a [`CallOutcome`] to the
//! [`IpcBus`](super::ports::IpcBus) port for every reply token it consumes.
//! Adapters on the other side decide how to serialize it.

use nix::errno::Errno;
use serde::Serialize;

/// Final status of an IPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded; the caller receives result code 0.
    Success,
    /// The call failed with `errno`; `reason` is a short description.
    Failed { errno: Errno, reason: &'static str },
}

impl CallOutcome {
    pub const fn timed_out() -> Self {
        Self::Failed {
            errno: Errno::ETIMEDOUT,
            reason: "Timed out waiting for the BT channel",
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Counters kept by the bridge for its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// Frames decoded and queued.
    pub requests_received: u64,
    /// Frames dropped before queueing (read, decode or allocation failure).
    pub frames_dropped: u64,
    /// Responses bound from IPC.
    pub responses_bound: u64,
    /// Responses refused by the intake (no match, already answered).
    pub responses_rejected: u64,
    /// Requests answered with the synthesized timeout.
    pub timeouts: u64,
    /// Response frames fully written to the device.
    pub frames_written: u64,
    /// Response frames that failed or were written short.
    pub write_failures: u64,
    /// Wakeups where the device reported POLLERR or POLLHUP.
    pub device_faults: u64,
}

impl BridgeStats {
    /// One-line JSON summary for the shutdown log.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}
