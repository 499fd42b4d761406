//! Monotonic time source.
//!
//! Queue timestamps and timer deadlines share `CLOCK_MONOTONIC`, the same
//! clock the deadline timerfd runs on, so a deadline computed from an
//! enqueue time can be handed to the kernel as an absolute expiry.

use core::time::Duration;

use nix::time::{ClockId, clock_gettime};

/// Time since the monotonic clock's origin (usually boot).
///
/// `CLOCK_MONOTONIC` cannot fail on Linux; should it ever, zero is
/// returned and the next deadline simply fires early.
pub fn monotonic_now() -> Duration {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => Duration::new(ts.tv_sec() as u64, ts.tv_nsec() as u32),
        Err(e) => {
            log::error!("Couldn't clock_gettime(): {}", e);
            Duration::ZERO
        }
    }
}
