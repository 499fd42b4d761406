//! Bridge service, the hexagonal core.
//!
//! [`Bridge`] owns the pending queue and the deadline scheduler. It is
//! the single owning context for all mutable bridge state; the BT device
//! and the IPC bus are injected at call sites, so every handler can be
//! exercised with mock adapters.
//!
//! ```text
//!  BtDevice ──▶ ┌─────────────────────────────┐ ──▶ IpcBus (ReceivedMessage)
//!               │           Bridge            │
//!  BtDevice ◀── │  PendingQueue · Scheduler   │ ◀── IpcBus (SubmitResponse)
//!               └─────────────────────────────┘
//! ```
//!
//! Every handler runs to completion before the event loop calls the next
//! one. Per-frame failures are logged and counted here and never
//! propagate out of a handler.

use core::time::Duration;
use std::io;
use std::os::fd::{AsFd, BorrowedFd};

use log::{debug, error, info, log_enabled, warn, Level};

use crate::bt::codec::{self, MAX_FRAME_SIZE, Request, Response};
use crate::bt::device::BtDevice;
use crate::error::{Error, IntakeError};
use crate::scheduler::{DeadlineScheduler, Expiry};

use super::commands::BusCall;
use super::events::{BridgeStats, CallOutcome};
use super::ports::{DeadlineTimer, IpcBus};
use super::queue::{EntryId, PendingQueue};

/// A response the intake refused. The reply token is handed back
/// unconsumed so the caller can answer its own client.
#[derive(Debug)]
pub struct Rejected<R> {
    pub error: IntakeError,
    pub reply: R,
}

// ───────────────────────────────────────────────────────────────
// Bridge
// ───────────────────────────────────────────────────────────────

/// Queue-and-timeout engine between the BT device and the IPC bus.
pub struct Bridge<R, T> {
    queue: PendingQueue<R>,
    scheduler: DeadlineScheduler<T>,
    /// Whether the event loop should poll the device for writability.
    write_pending: bool,
    max_frame_len: usize,
    /// Set while the device keeps reporting POLLERR/POLLHUP.
    device_faulted: bool,
    stats: BridgeStats,
}

impl<R, T: DeadlineTimer> Bridge<R, T> {
    pub fn new(timer: T, timeout: Duration) -> Self {
        Self::with_max_frame(timer, timeout, MAX_FRAME_SIZE)
    }

    pub fn with_max_frame(timer: T, timeout: Duration, max_frame_len: usize) -> Self {
        Self {
            queue: PendingQueue::new(),
            scheduler: DeadlineScheduler::new(timer, timeout),
            write_pending: false,
            max_frame_len,
            device_faulted: false,
            stats: BridgeStats::default(),
        }
    }

    pub fn queue(&self) -> &PendingQueue<R> {
        &self.queue
    }

    pub fn scheduler(&self) -> &DeadlineScheduler<T> {
        &self.scheduler
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Whether a response is waiting for the device to become writable.
    pub fn wants_write(&self) -> bool {
        self.write_pending
    }

    pub fn device_faulted(&self) -> bool {
        self.device_faulted
    }

    // ── Hardware channel: inbound ─────────────────────────────

    /// The BT device has a frame for us.
    pub fn on_readable<D, B>(&mut self, dev: &mut D, bus: &mut B)
    where
        D: BtDevice,
        B: IpcBus<Reply = R>,
    {
        let request = match self.read_request(dev) {
            Ok(request) => request,
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                debug!("Spurious readability on {}", dev.name());
                return;
            }
            Err(e) => {
                error!("Dropping frame from {}: {}", dev.name(), e);
                self.stats.frames_dropped += 1;
                return;
            }
        };
        self.stats.requests_received += 1;
        self.device_faulted = false;

        info!(
            "Broadcasting ReceivedMessage with seq 0x{:02x}, netfn 0x{:02x}, lun 0x{:02x}, cmd 0x{:02x}",
            request.seq, request.netfn, request.lun, request.cmd
        );
        if log_enabled!(Level::Debug) && !request.data.is_empty() {
            for chunk in request.data.chunks(8) {
                debug!("\t{}", hex_line(chunk));
            }
        }
        bus.emit_received(&request);
    }

    fn read_request<D: BtDevice>(&mut self, dev: &mut D) -> Result<Request, Error> {
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let n = dev.read(&mut buf)?;
        let request = codec::decode(&buf[..n])?;

        let now = self.scheduler.now();
        self.queue.enqueue(request.clone(), now)?;
        if self.queue.len() == 1 {
            // Enqueued onto an empty list: this request owns the timer.
            self.scheduler.rearm(&self.queue);
        }
        Ok(request)
    }

    // ── Hardware channel: outbound ────────────────────────────

    /// The BT device can take a frame.
    pub fn on_writable<D, B>(&mut self, dev: &mut D, bus: &mut B)
    where
        D: BtDevice,
        B: IpcBus<Reply = R>,
    {
        let Some(entry) = self.queue.find_ready() else {
            error!("Got a POLLOUT but no message is ready to be written");
            self.write_pending = false;
            return;
        };
        let id = entry.id();
        let reply = entry.take_reply();
        let frame = entry
            .response()
            .map(|rsp| (codec::encode(rsp, self.max_frame_len), describe(rsp)));

        let outcome = match frame {
            Some((frame, what)) => {
                let outcome = write_frame(dev, &frame);
                if outcome.is_success() {
                    self.stats.frames_written += 1;
                    self.device_faulted = false;
                    info!("Completed request with {}", what);
                } else {
                    self.stats.write_failures += 1;
                    error!("Problem putting request with {} out to {}", what, dev.name());
                }
                outcome
            }
            None => {
                error!("Ready entry has no response to write");
                CallOutcome::Failed {
                    errno: nix::errno::Errno::EIO,
                    reason: "No response to write",
                }
            }
        };

        self.finish(id);
        if let Some(reply) = reply {
            bus.complete(reply, outcome);
        }
    }

    /// Drop a written entry and keep the timer and POLLOUT interest honest.
    fn finish(&mut self, id: EntryId) {
        let was_head = self.queue.is_head(id);
        drop(self.queue.remove(id));
        if was_head {
            if self.queue.is_empty() {
                debug!("Disabling timer, no elements remain in queue");
            } else {
                debug!("Adjusting timer for next element");
            }
            self.scheduler.rearm(&self.queue);
        }

        if !self.queue.has_ready() {
            debug!("Turning off POLLOUT for the BT in poll()");
            self.write_pending = false;
        }
    }

    /// The device reported POLLERR or POLLHUP.
    ///
    /// poll(2) keeps returning while the condition lasts, so only the
    /// first wakeup of a fault is logged as an error.
    pub fn on_device_fault<D: BtDevice>(&mut self, dev: &D) {
        self.stats.device_faults += 1;
        if self.device_faulted {
            debug!("{} still reporting an error condition", dev.name());
        } else {
            error!("{} reported an error or hangup", dev.name());
            self.device_faulted = true;
        }
    }

    // ── Deadline ──────────────────────────────────────────────

    /// The deadline timer is readable.
    pub fn on_timer<B: IpcBus<Reply = R>>(&mut self, bus: &mut B) {
        match self.scheduler.expire_head(&mut self.queue) {
            Expiry::Stale | Expiry::NoHead => {}
            Expiry::Expired { late_reply, .. } => {
                self.stats.timeouts += 1;
                if let Some(reply) = late_reply {
                    bus.complete(reply, CallOutcome::timed_out());
                }
                // Turn on POLLOUT so we'll write this one next.
                self.write_pending = true;
            }
        }
    }

    // ── Response intake ───────────────────────────────────────

    /// Bind a caller's response to the queued request with the same seq.
    pub fn submit_response(&mut self, response: Response, reply: R) -> Result<(), Rejected<R>> {
        let seq = response.seq;
        let Some(entry) = self.queue.find_by_seq(seq) else {
            error!("Failed to find matching request for response with seq: 0x{:02x}", seq);
            self.stats.responses_rejected += 1;
            return Err(Rejected {
                error: IntakeError::NoMatchingRequest { seq },
                reply,
            });
        };
        if entry.has_reply() {
            warn!("Request with seq 0x{:02x} was already responded to", seq);
            self.stats.responses_rejected += 1;
            return Err(Rejected {
                error: IntakeError::AlreadyResponded { seq },
                reply,
            });
        }

        info!("Received a response for msg with seq 0x{:02x}", seq);
        entry.bind(response, reply);
        self.stats.responses_bound += 1;
        // Now that we have a response.
        self.write_pending = true;
        Ok(())
    }

    /// Raise SMS_ATN on the host interface.
    pub fn send_attention<D: BtDevice>(&mut self, dev: &mut D) -> io::Result<()> {
        info!("Sending SMS_ATN ioctl to {}", dev.name());
        dev.send_attention().inspect_err(|e| {
            error!("Couldn't ioctl() {}: {}", dev.name(), e);
        })
    }

    /// Answer one IPC method call.
    pub fn handle_call<D, B>(&mut self, call: BusCall<R>, dev: &mut D, bus: &mut B)
    where
        D: BtDevice,
        B: IpcBus<Reply = R>,
    {
        match call {
            BusCall::SubmitResponse { response, reply } => {
                if let Err(rejected) = self.submit_response(response, reply) {
                    let reason = match rejected.error {
                        IntakeError::NoMatchingRequest { .. } => "No matching request",
                        IntakeError::AlreadyResponded { .. } => "Request already responded to",
                    };
                    bus.complete(
                        rejected.reply,
                        CallOutcome::Failed {
                            errno: rejected.error.errno(),
                            reason,
                        },
                    );
                }
            }
            BusCall::SendAttention { reply } => {
                let outcome = match self.send_attention(dev) {
                    Ok(()) => CallOutcome::Success,
                    Err(e) => CallOutcome::Failed {
                        errno: errno_of(&e),
                        reason: "SMS_ATN ioctl failed",
                    },
                };
                bus.complete(reply, outcome);
            }
        }
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Discard everything still queued. Reply tokens are dropped, which
    /// the bus sees as abandoned calls.
    pub fn shutdown(&mut self) {
        if !self.queue.is_empty() {
            error!("Unresponded BT Message!");
            for entry in self.queue.drain() {
                let req = entry.request();
                warn!(
                    "Discarding seq 0x{:02x}, netfn 0x{:02x}, cmd 0x{:02x}",
                    req.seq, req.netfn, req.cmd
                );
            }
        }
        self.write_pending = false;
        info!("Bridge statistics: {}", self.stats.to_json());
    }
}

impl<R, T: AsFd> AsFd for Bridge<R, T> {
    /// The deadline timer's descriptor.
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.scheduler.as_fd()
    }
}

// ───────────────────────────────────────────────────────────────
// Helpers
// ───────────────────────────────────────────────────────────────

fn write_frame<D: BtDevice>(dev: &mut D, frame: &[u8]) -> CallOutcome {
    match dev.write(frame) {
        Ok(n) if n == frame.len() => {
            debug!("Successfully wrote {} of {} bytes to {}", n, frame.len(), dev.name());
            CallOutcome::Success
        }
        Ok(n) => {
            error!(
                "Possible short write to {}, desired len: {}, written len: {}",
                dev.name(),
                frame.len(),
                n
            );
            CallOutcome::Failed {
                errno: nix::errno::Errno::EIO,
                reason: "Short write to BT device",
            }
        }
        Err(e) => {
            error!("Error writing to {}: {}", dev.name(), e);
            CallOutcome::Failed {
                errno: errno_of(&e),
                reason: "Write to BT device failed",
            }
        }
    }
}

fn errno_of(e: &io::Error) -> nix::errno::Errno {
    e.raw_os_error()
        .map_or(nix::errno::Errno::EIO, nix::errno::Errno::from_raw)
}

fn describe(rsp: &Response) -> String {
    format!(
        "seq 0x{:02x}, netfn 0x{:02x}, lun 0x{:02x}, cmd 0x{:02x}, cc 0x{:02x}",
        rsp.seq, rsp.netfn, rsp.lun, rsp.cmd, rsp.completion_code
    )
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
