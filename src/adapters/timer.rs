//! Deadline timer backed by a Linux timerfd.
//!
//! The timerfd is created on `CLOCK_MONOTONIC`, non-blocking, and always
//! armed with an absolute one-shot expiry. Its descriptor goes into the
//! event loop's poll set; readability means the head request is due.

use core::time::Duration;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};

use super::time::monotonic_now;
use crate::app::ports::DeadlineTimer;

/// One-shot absolute timer on `CLOCK_MONOTONIC`.
pub struct TimerFdDeadline {
    fd: TimerFd,
}

impl TimerFdDeadline {
    pub fn new() -> io::Result<Self> {
        let fd = TimerFd::new(
            ClockId::CLOCK_MONOTONIC,
            TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
        )?;
        Ok(Self { fd })
    }
}

impl DeadlineTimer for TimerFdDeadline {
    fn now(&self) -> Duration {
        monotonic_now()
    }

    fn arm(&mut self, deadline: Duration) -> io::Result<()> {
        // An all-zero it_value would disarm instead of firing.
        let deadline = deadline.max(Duration::from_nanos(1));
        self.fd.set(
            Expiration::OneShot(TimeSpec::from_duration(deadline)),
            TimerSetTimeFlags::TFD_TIMER_ABSTIME,
        )?;
        Ok(())
    }

    fn disarm(&mut self) -> io::Result<()> {
        self.fd.unset()?;
        Ok(())
    }

    fn acknowledge(&mut self) -> io::Result<u64> {
        let mut counter = [0u8; 8];
        match nix::unistd::read(self.fd.as_fd().as_raw_fd(), &mut counter) {
            Ok(8) => Ok(u64::from_ne_bytes(counter)),
            Ok(n) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("timerfd read returned {n} bytes"),
            )),
            Err(Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl AsFd for TimerFdDeadline {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
