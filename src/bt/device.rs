//! BT device abstraction: the host-facing half of the bridge.
//!
//! Concrete implementations:
//! - `/dev/ipmi-bt-host` character device ([`BtBmcDevice`](crate::adapters::bt_device::BtBmcDevice))
//! - recording mocks in the integration tests
//!
//! The bridge is generic over `BtDevice`, so the queue and timeout logic
//! never touches a file descriptor directly.

use std::io;

/// Frame-oriented, non-blocking BT channel.
///
/// Each `read` yields at most one frame and each `write` submits exactly
/// one frame; the kernel driver never splits or merges them.
pub trait BtDevice {
    /// Read one frame into `buf`.
    /// Returns the number of bytes actually read.
    /// Returns `ErrorKind::WouldBlock` if nothing is pending.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write one frame.
    /// Returns the number of bytes actually written.
    fn write(&mut self, frame: &[u8]) -> io::Result<usize>;

    /// Raise the SMS_ATN flag towards the host.
    fn send_attention(&mut self) -> io::Result<()>;

    /// Human-readable name for log lines (usually the device path).
    fn name(&self) -> &str;
}
