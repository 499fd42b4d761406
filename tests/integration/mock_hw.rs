//! Mock adapters for integration tests.
//!
//! Record every device write, bus reply and timer setting so tests can
//! assert on the full history without touching real descriptors.

use core::time::Duration;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use btbridge::app::commands::BusCall;
use btbridge::app::events::CallOutcome;
use btbridge::app::ports::{DeadlineTimer, IpcBus};
use btbridge::bt::codec::{Request, Response};
use btbridge::bt::device::BtDevice;

// ── MockDevice ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDevice {
    /// Frames the host has put in the BT buffer.
    pub inbound: VecDeque<Vec<u8>>,
    /// Frames written back to the host.
    pub written: Vec<Vec<u8>>,
    /// Accept at most this many bytes per write.
    pub write_limit: Option<usize>,
    pub fail_writes: bool,
    pub fail_attention: bool,
    pub attentions: usize,
}

#[allow(dead_code)]
impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host_sends(&mut self, frame: &[u8]) {
        self.inbound.push_back(frame.to_vec());
    }

    /// Seq byte of every frame written so far.
    pub fn written_seqs(&self) -> Vec<u8> {
        self.written.iter().map(|f| f[2]).collect()
    }
}

impl BtDevice for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(frame) = self.inbound.pop_front() else {
            return Err(io::ErrorKind::WouldBlock.into());
        };
        let n = frame.len().min(buf.len());
        buf[..n].copy_from_slice(&frame[..n]);
        Ok(n)
    }

    fn write(&mut self, frame: &[u8]) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::Error::from_raw_os_error(nix::libc::EIO));
        }
        let n = self.write_limit.map_or(frame.len(), |l| l.min(frame.len()));
        self.written.push(frame[..n].to_vec());
        Ok(n)
    }

    fn send_attention(&mut self) -> io::Result<()> {
        if self.fail_attention {
            return Err(io::Error::from_raw_os_error(nix::libc::ENOTTY));
        }
        self.attentions += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock-bt"
    }
}

// ── MockTimer ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct TimerState {
    pub now: Duration,
    pub armed: Option<Duration>,
    pub pending: u64,
    pub arm_calls: usize,
}

/// Timer whose clock is driven by the test through a shared handle.
#[derive(Clone, Default)]
pub struct MockTimer(pub Rc<RefCell<TimerState>>);

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> Option<Duration> {
        self.0.borrow().armed
    }

    pub fn arm_calls(&self) -> usize {
        self.0.borrow().arm_calls
    }

    /// Move the clock; an armed deadline that has passed becomes pending.
    pub fn advance_to(&self, now: Duration) {
        let mut s = self.0.borrow_mut();
        s.now = now;
        if s.armed.is_some_and(|d| d <= now) {
            s.armed = None;
            s.pending += 1;
        }
    }
}

impl DeadlineTimer for MockTimer {
    fn now(&self) -> Duration {
        self.0.borrow().now
    }

    fn arm(&mut self, deadline: Duration) -> io::Result<()> {
        let mut s = self.0.borrow_mut();
        s.armed = Some(deadline);
        s.pending = 0;
        s.arm_calls += 1;
        Ok(())
    }

    fn disarm(&mut self) -> io::Result<()> {
        let mut s = self.0.borrow_mut();
        s.armed = None;
        s.pending = 0;
        Ok(())
    }

    fn acknowledge(&mut self) -> io::Result<u64> {
        Ok(core::mem::take(&mut self.0.borrow_mut().pending))
    }
}

// ── MockBus ───────────────────────────────────────────────────

/// Bus whose reply tokens are plain call ids.
#[derive(Default)]
pub struct MockBus {
    pub incoming: VecDeque<BusCall<u32>>,
    pub emitted: Vec<Request>,
    pub completed: Vec<(u32, CallOutcome)>,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, id: u32, response: Response) {
        self.incoming.push_back(BusCall::SubmitResponse {
            response,
            reply: id,
        });
    }

    pub fn outcome_of(&self, id: u32) -> Option<CallOutcome> {
        self.completed
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, o)| *o)
    }
}

impl IpcBus for MockBus {
    type Reply = u32;

    fn process(&mut self) -> io::Result<Vec<BusCall<u32>>> {
        Ok(self.incoming.drain(..).collect())
    }

    fn emit_received(&mut self, request: &Request) {
        self.emitted.push(request.clone());
    }

    fn complete(&mut self, reply: u32, outcome: CallOutcome) {
        self.completed.push((reply, outcome));
    }
}

/// A successful response to a request with this seq, netfn 3, cmd 1.
#[allow(dead_code)]
pub fn ok_response(seq: u8, data: &[u8]) -> Response {
    Response {
        netfn: 3,
        lun: 0,
        seq,
        cmd: 1,
        completion_code: 0,
        data: data.to_vec(),
    }
}

/// Request frame: netfn 2, lun 0, cmd 1, no data.
#[allow(dead_code)]
pub fn request_frame(seq: u8) -> [u8; 4] {
    [0x03, 0x08, seq, 0x01]
}
