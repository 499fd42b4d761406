//! Port traits: the hexagonal boundary between the bridge core and the OS.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Bridge (queue + deadline logic)
//! ```
//!
//! Driven adapters (timerfd, IPC socket, BT character device) implement
//! these traits. The [`Bridge`](super::service::Bridge) takes them at call
//! sites, so the core never touches a file descriptor directly and can be
//! driven entirely by mocks in tests.
//!
//! The BT device port lives next to the codec in
//! [`bt::device`](crate::bt::device).

use core::time::Duration;
use std::io;

use crate::bt::codec::Request;

use super::commands::BusCall;
use super::events::CallOutcome;

// ───────────────────────────────────────────────────────────────
// Deadline timer port (driven adapter: domain ↔ kernel timer)
// ───────────────────────────────────────────────────────────────

/// A single one-shot timer on a monotonic clock.
///
/// All instants are durations since the clock's (arbitrary) origin, so
/// `enqueued_at + timeout` can be handed straight back to [`arm`](Self::arm).
pub trait DeadlineTimer {
    /// Current time on the timer's clock.
    fn now(&self) -> Duration;

    /// Arm the timer to fire once at the absolute instant `deadline`,
    /// replacing any earlier setting.
    fn arm(&mut self, deadline: Duration) -> io::Result<()>;

    /// Stop the timer. Any pending expiration is discarded.
    fn disarm(&mut self) -> io::Result<()>;

    /// Consume pending expirations.
    ///
    /// Returns how many expirations were pending; `0` means the wakeup was
    /// stale (the timer was re-armed after it became readable).
    fn acknowledge(&mut self) -> io::Result<u64>;
}

// ───────────────────────────────────────────────────────────────
// IPC bus port (driven adapter: domain ↔ management-side clients)
// ───────────────────────────────────────────────────────────────

/// The management-side bus: method calls in, replies and broadcasts out.
///
/// `Reply` is the token for one in-flight method call. It is not `Clone`
/// in any real adapter; [`complete`](Self::complete) takes it by value, so
/// a call can only ever be answered once.
pub trait IpcBus {
    /// Token identifying one in-flight method call.
    type Reply;

    /// Drain whatever the bus has pending and return the method calls
    /// that need the bridge. An error here is fatal to the event loop.
    fn process(&mut self) -> io::Result<Vec<BusCall<Self::Reply>>>;

    /// Broadcast `ReceivedMessage` for a new request. Fire-and-forget.
    fn emit_received(&mut self, request: &Request);

    /// Answer a method call.
    fn complete(&mut self, reply: Self::Reply, outcome: CallOutcome);
}
