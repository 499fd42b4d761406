//! Deadline scheduler: one timer for the whole queue.
//!
//! Only the head of the [`PendingQueue`] has a live deadline. Whenever the
//! head changes the timer is re-armed to `head.enqueued_at + timeout`, and
//! it is disarmed exactly when the queue drains. Entries behind the head
//! cannot time out until they reach the front.
//!
//! ```text
//!   enqueue into empty queue ──┐
//!   remove head ───────────────┼──▶ rearm(head) ──▶ DeadlineTimer
//!                              │                        │ fires
//!                              │                        ▼
//!                              └──────────────── expire_head()
//!                                                   cc = 0xCE
//! ```

use core::time::Duration;
use std::os::fd::{AsFd, BorrowedFd};

use log::{debug, error, info, warn};

use crate::app::ports::DeadlineTimer;
use crate::app::queue::PendingQueue;

/// What a timer wakeup amounted to.
#[derive(Debug, PartialEq, Eq)]
pub enum Expiry<R> {
    /// Nothing was pending on the timer; the wakeup raced a re-arm.
    Stale,
    /// The timer fired with an empty queue.
    NoHead,
    /// The head request was timed out and now carries the 0xCE response.
    Expired {
        seq: u8,
        /// A caller whose response arrived but was never written.
        late_reply: Option<R>,
    },
}

/// Owns the deadline timer and keeps it pointed at the queue head.
pub struct DeadlineScheduler<T> {
    timer: T,
    timeout: Duration,
    armed: Option<Duration>,
}

impl<T: DeadlineTimer> DeadlineScheduler<T> {
    pub fn new(timer: T, timeout: Duration) -> Self {
        Self {
            timer,
            timeout,
            armed: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current time on the timer's clock.
    pub fn now(&self) -> Duration {
        self.timer.now()
    }

    /// The deadline the timer is currently armed to, if any.
    pub fn armed_deadline(&self) -> Option<Duration> {
        self.armed
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Point the timer at the queue's current head, or disarm it.
    ///
    /// Timer failures are logged and otherwise ignored: deadline
    /// enforcement degrades but the bridge keeps running.
    pub fn rearm<R>(&mut self, queue: &PendingQueue<R>) {
        match queue.head_deadline(self.timeout) {
            Some(deadline) => {
                if let Err(e) = self.timer.arm(deadline) {
                    error!("Couldn't set timerfd: {}", e);
                    return;
                }
                debug!("Timer armed for {:?}", deadline);
                self.armed = Some(deadline);
            }
            None => {
                if let Err(e) = self.timer.disarm() {
                    error!("Couldn't disarm timerfd: {}", e);
                    return;
                }
                debug!("Disabling timer, no elements remain in queue");
                self.armed = None;
            }
        }
    }

    /// Handle a timer wakeup: time out the head request.
    pub fn expire_head<R>(&mut self, queue: &mut PendingQueue<R>) -> Expiry<R> {
        match self.timer.acknowledge() {
            Ok(0) => {
                debug!("Timer wakeup with no pending expiration");
                return Expiry::Stale;
            }
            Ok(count) => debug!("Timer fired {} times", count),
            // Reading the counter failed; the expiry itself is still real.
            Err(e) => warn!("Couldn't read timerfd: {}", e),
        }
        self.armed = None;

        let Some(head) = queue.head_mut() else {
            error!("No message found to send timeout");
            return Expiry::NoHead;
        };

        let seq = head.request().seq;
        let late_reply = head.expire();
        if late_reply.is_some() {
            warn!(
                "Message with seq 0x{:02x} is being timed out despite \
                 appearing to have been responded to. Slow BT?",
                seq
            );
        }
        info!("Timeout on msg with seq: 0x{:02x}", seq);
        Expiry::Expired { seq, late_reply }
    }
}

impl<T: AsFd> AsFd for DeadlineScheduler<T> {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.timer.as_fd()
    }
}
