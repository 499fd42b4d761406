//! Poll-driven event loop.
//!
//! Three descriptors are watched: the IPC bus, the BT device and the
//! deadline timer. Each wakeup is turned into a short list of [`Event`]s
//! which are then dispatched, in discriminant order, to the [`Bridge`].
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ IPC socket  │────▶│              │     │              │
//! │ BT device   │────▶│   poll(2)    │────▶│    Bridge    │
//! │ timerfd     │────▶│              │     │  (handlers)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The BT descriptor is only polled for writability while the bridge has
//! a response waiting, so the loop never spins on an idle device.

use core::sync::atomic::{AtomicBool, Ordering};
use std::io;
use std::os::fd::AsFd;

use heapless::Vec;
use log::{debug, error, info};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::app::ports::{DeadlineTimer, IpcBus};
use crate::app::service::Bridge;
use crate::bt::device::BtDevice;

/// Upper bound on one `poll(2)` sleep, so a shutdown request is noticed
/// even if a signal lands between the flag check and the syscall.
pub const POLL_INTERVAL_MS: u16 = 1000;

/// Readiness reported by one poll, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Event {
    /// The IPC bus has datagrams (or an error) pending.
    BusActivity  = 0,
    /// The BT device has a request frame.
    BtReadable   = 1,
    /// The BT device can accept a response frame.
    BtWritable   = 2,
    /// The deadline timer fired.
    TimerExpired = 3,
    /// The BT device reported POLLERR, POLLHUP or POLLNVAL.
    BtFault      = 4,
}

/// Events from a single wakeup; at most one of each kind.
pub type Events = Vec<Event, 5>;

// ── Shutdown flag ─────────────────────────────────────────────

static RUNNING: AtomicBool = AtomicBool::new(true);

pub fn is_running() -> bool {
    RUNNING.load(Ordering::Relaxed)
}

/// Ask the loop to stop after the current iteration.
pub fn request_shutdown() {
    RUNNING.store(false, Ordering::Relaxed);
}

extern "C" fn on_signal(_: nix::libc::c_int) {
    request_shutdown();
}

/// Route SIGINT and SIGTERM to [`request_shutdown`].
///
/// `SA_RESTART` is left off so a blocked `poll(2)` returns `EINTR`.
pub fn install_signal_handlers() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTERM] {
        // SAFETY: the handler only stores to an atomic.
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}

// ── Loop ──────────────────────────────────────────────────────

/// Wait once for readiness and dispatch whatever became ready.
///
/// Returns the events that were handled. An interrupted poll yields no
/// events; any other poll or bus failure is returned and is fatal.
pub fn poll_once<R, T, D, B>(
    bridge: &mut Bridge<R, T>,
    dev: &mut D,
    bus: &mut B,
    timeout: PollTimeout,
) -> io::Result<Events>
where
    T: DeadlineTimer + AsFd,
    D: BtDevice + AsFd,
    B: IpcBus<Reply = R> + AsFd,
{
    let events = {
        let bt_interest = if bridge.wants_write() {
            PollFlags::POLLIN | PollFlags::POLLOUT
        } else {
            PollFlags::POLLIN
        };
        let mut fds = [
            PollFd::new(bus.as_fd(), PollFlags::POLLIN),
            PollFd::new(dev.as_fd(), bt_interest),
            PollFd::new(bridge.as_fd(), PollFlags::POLLIN),
        ];
        match poll(&mut fds, timeout) {
            Ok(0) => return Ok(Events::new()),
            Ok(_) => {}
            Err(Errno::EINTR) => {
                debug!("poll() interrupted");
                return Ok(Events::new());
            }
            Err(e) => {
                error!("Error from poll(): {}", e);
                return Err(e.into());
            }
        }
        let [bus_rev, bt_rev, timer_rev] = fds.map(|fd| fd.revents().unwrap_or(PollFlags::empty()));
        collect(bus_rev, bt_rev, timer_rev)
    };

    for event in &events {
        match event {
            Event::BusActivity => {
                let calls = bus.process().inspect_err(|e| {
                    error!("Failed to process IPC events: {}", e);
                })?;
                for call in calls {
                    bridge.handle_call(call, dev, bus);
                }
            }
            Event::BtReadable => bridge.on_readable(dev, bus),
            Event::BtWritable => bridge.on_writable(dev, bus),
            Event::TimerExpired => bridge.on_timer(bus),
            Event::BtFault => bridge.on_device_fault(dev),
        }
    }
    Ok(events)
}

fn collect(bus: PollFlags, bt: PollFlags, timer: PollFlags) -> Events {
    let mut events = Events::new();
    // Capacity is one slot per variant.
    if !bus.is_empty() {
        let _ = events.push(Event::BusActivity);
    }
    if bt.contains(PollFlags::POLLIN) {
        let _ = events.push(Event::BtReadable);
    }
    if bt.contains(PollFlags::POLLOUT) {
        let _ = events.push(Event::BtWritable);
    }
    if timer.contains(PollFlags::POLLIN) {
        let _ = events.push(Event::TimerExpired);
    }
    if bt.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
        let _ = events.push(Event::BtFault);
    }
    events
}

/// Run until [`request_shutdown`] is called or a fatal error occurs.
pub fn run<R, T, D, B>(bridge: &mut Bridge<R, T>, dev: &mut D, bus: &mut B) -> io::Result<()>
where
    T: DeadlineTimer + AsFd,
    D: BtDevice + AsFd,
    B: IpcBus<Reply = R> + AsFd,
{
    info!("Entering polling loop");
    while is_running() {
        poll_once(bridge, dev, bus, PollTimeout::from(POLL_INTERVAL_MS))?;
    }
    info!("Leaving polling loop");
    Ok(())
}
