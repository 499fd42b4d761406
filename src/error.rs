//! Unified error types for the BT bridge.
//!
//! `Error` covers the inbound frame path (read, decode, enqueue), where
//! every failure ends the same way: log, count, drop. Response intake and
//! configuration report their own `IntakeError` / `ConfigError`, which
//! carry errno and validation detail. Per-frame errors are `Copy` so they
//! can be logged and counted without allocation; only the I/O variant
//! carries an owned `std::io::Error`.

use core::fmt;
use std::io;

// ---------------------------------------------------------------------------
// Top-level bridge error
// ---------------------------------------------------------------------------

/// Why an inbound frame was dropped.
#[derive(Debug)]
pub enum Error {
    /// A frame read from the BT device could not be decoded.
    Frame(FrameError),
    /// The pending queue could not accept a new entry.
    Queue(QueueError),
    /// Device, timer or socket I/O failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes were available than the length byte declared.
    ShortRead { got: usize, expected: usize },
    /// The length byte cannot describe a request: too small for
    /// netfn/lun, seq and cmd, or too large for the device buffer.
    Malformed { len: u8 },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead { got, expected } => {
                write!(f, "short read ({got} vs {expected})")
            }
            Self::Malformed { len } => write!(f, "invalid frame length {len}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Growing the queue failed; the frame is dropped.
    OutOfMemory,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
        }
    }
}

impl std::error::Error for QueueError {}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

// ---------------------------------------------------------------------------
// Response intake errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeError {
    /// No queued request carries this sequence number.
    NoMatchingRequest { seq: u8 },
    /// The matching request already has a caller waiting on it.
    AlreadyResponded { seq: u8 },
}

impl IntakeError {
    /// Errno reported back to the IPC caller.
    pub const fn errno(self) -> nix::errno::Errno {
        match self {
            Self::NoMatchingRequest { .. } => nix::errno::Errno::EINVAL,
            Self::AlreadyResponded { .. } => nix::errno::Errno::EBUSY,
        }
    }
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingRequest { seq } => {
                write!(f, "no matching request for seq 0x{seq:02x}")
            }
            Self::AlreadyResponded { seq } => {
                write!(f, "request with seq 0x{seq:02x} already has a response")
            }
        }
    }
}

impl std::error::Error for IntakeError {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from loading or validating [`BridgeConfig`](crate::config::BridgeConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read.
    Unreadable,
    /// The config file is not valid JSON for this schema.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable => write!(f, "config file unreadable"),
            Self::Corrupted => write!(f, "config file corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
