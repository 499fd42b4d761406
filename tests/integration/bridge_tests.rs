//! Integration tests for the Bridge: device → queue → bus → device.
//!
//! Everything runs against the recording mocks in `mock_hw`; the clock
//! only moves when a test advances it.

use core::time::Duration;

use btbridge::app::commands::BusCall;
use btbridge::app::events::CallOutcome;
use btbridge::app::service::Bridge;
use btbridge::error::IntakeError;
use nix::errno::Errno;

use super::mock_hw::{MockBus, MockDevice, MockTimer, ok_response, request_frame};

const TIMEOUT: Duration = Duration::from_secs(5);

struct Rig {
    bridge: Bridge<u32, MockTimer>,
    timer: MockTimer,
    dev: MockDevice,
    bus: MockBus,
}

impl Rig {
    fn new() -> Self {
        let timer = MockTimer::new();
        Self {
            bridge: Bridge::new(timer.clone(), TIMEOUT),
            timer,
            dev: MockDevice::new(),
            bus: MockBus::new(),
        }
    }

    fn host_request_at(&mut self, at: Duration, frame: &[u8]) {
        self.timer.advance_to(at);
        self.dev.host_sends(frame);
        self.bridge.on_readable(&mut self.dev, &mut self.bus);
    }

    fn deliver_bus_calls(&mut self) {
        for call in std::mem::take(&mut self.bus.incoming) {
            self.bridge.handle_call(call, &mut self.dev, &mut self.bus);
        }
    }

    fn answer(&mut self, id: u32, seq: u8) {
        self.bus.submit(id, ok_response(seq, &[]));
        self.deliver_bus_calls();
    }

    fn writable(&mut self) {
        self.bridge.on_writable(&mut self.dev, &mut self.bus);
    }

    fn tick(&mut self, at: Duration) {
        self.timer.advance_to(at);
        self.bridge.on_timer(&mut self.bus);
    }
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

// ── Inbound ───────────────────────────────────────────────────

#[test]
fn request_is_queued_broadcast_and_timed() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(10), &[0x06, 0x18, 0x2a, 0x01, 0xaa, 0xbb, 0xcc]);

    assert_eq!(rig.bus.emitted.len(), 1);
    let req = &rig.bus.emitted[0];
    assert_eq!((req.netfn, req.lun, req.seq, req.cmd), (6, 0, 0x2a, 1));
    assert_eq!(req.data.as_slice(), &[0xaa, 0xbb, 0xcc]);

    assert_eq!(rig.bridge.queue().len(), 1);
    assert_eq!(rig.timer.armed(), Some(secs(15)));
    assert!(!rig.bridge.wants_write());
    assert_eq!(rig.bridge.stats().requests_received, 1);
}

#[test]
fn short_read_is_dropped_without_broadcast() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &[0x06, 0x08, 0x01]);

    assert!(rig.bus.emitted.is_empty());
    assert!(rig.bridge.queue().is_empty());
    assert_eq!(rig.timer.armed(), None);
    assert_eq!(rig.bridge.stats().frames_dropped, 1);
}

#[test]
fn spurious_readability_is_not_a_drop() {
    let mut rig = Rig::new();
    rig.bridge.on_readable(&mut rig.dev, &mut rig.bus);
    assert_eq!(rig.bridge.stats().frames_dropped, 0);
    assert!(rig.bus.emitted.is_empty());
}

#[test]
fn only_first_enqueue_arms_the_timer() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.host_request_at(secs(1), &request_frame(2));
    rig.host_request_at(secs(2), &request_frame(3));

    assert_eq!(rig.timer.arm_calls(), 1);
    assert_eq!(rig.timer.armed(), Some(secs(5)));
}

// ── Outbound ──────────────────────────────────────────────────

#[test]
fn response_frame_matches_wire_bytes() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(0x2a));
    rig.answer(1, 0x2a);
    assert!(rig.bridge.wants_write());

    rig.writable();
    assert_eq!(rig.dev.written, vec![vec![0x04, 0x0c, 0x2a, 0x01, 0x00]]);
    assert_eq!(rig.bus.outcome_of(1), Some(CallOutcome::Success));
    assert!(rig.bridge.queue().is_empty());
    assert_eq!(rig.timer.armed(), None);
    assert!(!rig.bridge.wants_write());
}

#[test]
fn answered_request_overtakes_waiting_head() {
    let mut rig = Rig::new();
    for (at, seq) in [(0, 1), (1, 2), (2, 3)] {
        rig.host_request_at(secs(at), &request_frame(seq));
    }

    rig.answer(10, 2);
    rig.writable();
    assert_eq!(rig.dev.written_seqs(), vec![2]);
    // Head unchanged, so its deadline stands.
    assert_eq!(rig.timer.armed(), Some(secs(5)));
    assert_eq!(rig.timer.arm_calls(), 1);

    rig.answer(11, 3);
    rig.answer(12, 1);
    rig.writable();
    rig.writable();
    assert_eq!(rig.dev.written_seqs(), vec![2, 1, 3]);
    assert!(rig.bridge.queue().is_empty());
    assert!(!rig.bridge.wants_write());
}

#[test]
fn removing_head_moves_timer_to_next_entry() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.host_request_at(secs(3), &request_frame(2));

    rig.answer(1, 1);
    rig.writable();
    assert_eq!(rig.timer.armed(), Some(secs(8)));
}

#[test]
fn pollout_with_nothing_ready_drops_interest() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.writable();
    assert!(rig.dev.written.is_empty());
    assert!(!rig.bridge.wants_write());
    assert_eq!(rig.bridge.queue().len(), 1);
}

#[test]
fn oversized_response_is_truncated() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(4));
    rig.bus.submit(1, ok_response(4, &[0x55; 100]));
    rig.deliver_bus_calls();
    rig.writable();

    let frame = &rig.dev.written[0];
    assert_eq!(frame.len(), 64);
    assert_eq!(frame[0], 63);
    assert_eq!(rig.bus.outcome_of(1), Some(CallOutcome::Success));
}

#[test]
fn smaller_frame_limit_is_honoured() {
    let timer = MockTimer::new();
    let mut bridge: Bridge<u32, MockTimer> = Bridge::with_max_frame(timer, TIMEOUT, 8);
    let mut dev = MockDevice::new();
    let mut bus = MockBus::new();

    dev.host_sends(&request_frame(4));
    bridge.on_readable(&mut dev, &mut bus);
    assert!(bridge.submit_response(ok_response(4, &[1, 2, 3, 4, 5]), 1).is_ok());
    bridge.on_writable(&mut dev, &mut bus);
    assert_eq!(dev.written[0], vec![0x07, 0x0c, 0x04, 0x01, 0x00, 1, 2, 3]);
}

#[test]
fn write_error_fails_caller_and_drops_entry() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.answer(1, 1);
    rig.dev.fail_writes = true;
    rig.writable();

    assert!(matches!(
        rig.bus.outcome_of(1),
        Some(CallOutcome::Failed {
            errno: Errno::EIO,
            ..
        })
    ));
    assert!(rig.bridge.queue().is_empty());
    assert_eq!(rig.bridge.stats().write_failures, 1);
}

#[test]
fn short_write_is_reported_as_failure() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.answer(1, 1);
    rig.dev.write_limit = Some(3);
    rig.writable();

    assert!(!rig.bus.outcome_of(1).unwrap().is_success());
    assert!(rig.bridge.queue().is_empty());
}

// ── Response intake ───────────────────────────────────────────

#[test]
fn unknown_seq_is_rejected_with_einval() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.answer(7, 9);

    assert!(matches!(
        rig.bus.outcome_of(7),
        Some(CallOutcome::Failed {
            errno: Errno::EINVAL,
            ..
        })
    ));
    assert!(!rig.bridge.wants_write());
    assert_eq!(rig.bridge.stats().responses_rejected, 1);
}

#[test]
fn second_response_for_same_request_is_refused() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.answer(1, 1);

    let rejected = rig
        .bridge
        .submit_response(ok_response(1, &[]), 2)
        .unwrap_err();
    assert_eq!(rejected.error, IntakeError::AlreadyResponded { seq: 1 });
    assert_eq!(rejected.reply, 2);

    rig.writable();
    assert_eq!(rig.bus.completed, vec![(1, CallOutcome::Success)]);
}

#[test]
fn duplicate_seq_binds_oldest_request() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &[0x03, 0x08, 0x05, 0x01]);
    rig.host_request_at(secs(1), &[0x03, 0x08, 0x05, 0x02]);
    rig.answer(1, 5);
    rig.writable();

    assert_eq!(rig.dev.written.len(), 1);
    let remaining = rig.bridge.queue().head().unwrap();
    assert_eq!(remaining.request().cmd, 2);
}

// ── Timeouts ──────────────────────────────────────────────────

#[test]
fn expired_head_gets_timeout_response() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &[0x03, 0x18, 0x07, 0x30]);
    rig.tick(secs(5));

    assert!(rig.bridge.wants_write());
    rig.writable();
    assert_eq!(rig.dev.written, vec![vec![0x04, 0x1c, 0x07, 0x30, 0xce]]);
    assert_eq!(rig.bridge.stats().timeouts, 1);
    assert!(rig.bus.completed.is_empty());
}

#[test]
fn waiting_entries_time_out_one_after_another() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.host_request_at(secs(2), &request_frame(2));

    rig.tick(secs(5));
    rig.writable();
    assert_eq!(rig.timer.armed(), Some(secs(7)));

    rig.tick(secs(7));
    rig.writable();
    assert_eq!(rig.dev.written_seqs(), vec![1, 2]);
    assert!(rig.dev.written.iter().all(|f| f[4] == 0xce));
    assert_eq!(rig.timer.armed(), None);
}

#[test]
fn late_reply_is_told_about_the_timeout() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(3));
    rig.answer(4, 3);
    rig.tick(secs(5));

    assert_eq!(rig.bus.outcome_of(4), Some(CallOutcome::timed_out()));
    rig.writable();
    assert_eq!(rig.dev.written[0][4], 0xce);
    // Answered exactly once.
    assert_eq!(rig.bus.completed.len(), 1);
}

#[test]
fn response_after_expiry_replaces_timeout_frame() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(3));
    rig.tick(secs(5));
    rig.answer(4, 3);
    rig.writable();

    assert_eq!(rig.dev.written, vec![vec![0x04, 0x0c, 0x03, 0x01, 0x00]]);
    assert_eq!(rig.bus.outcome_of(4), Some(CallOutcome::Success));
}

#[test]
fn stale_timer_wakeup_is_ignored() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.tick(secs(1));

    assert!(!rig.bridge.wants_write());
    assert!(!rig.bridge.queue().head().unwrap().is_expired());
    assert_eq!(rig.bridge.stats().timeouts, 0);
}

// ── Device faults ─────────────────────────────────────────────

#[test]
fn device_fault_is_counted_and_cleared_by_traffic() {
    let mut rig = Rig::new();
    rig.bridge.on_device_fault(&rig.dev);
    rig.bridge.on_device_fault(&rig.dev);
    assert!(rig.bridge.device_faulted());
    assert_eq!(rig.bridge.stats().device_faults, 2);

    rig.host_request_at(secs(0), &request_frame(1));
    assert!(!rig.bridge.device_faulted());
    assert_eq!(rig.bridge.queue().len(), 1);
}

// ── Attention and shutdown ────────────────────────────────────

#[test]
fn send_attention_reaches_device() {
    let mut rig = Rig::new();
    rig.bus.incoming.push_back(BusCall::SendAttention { reply: 1 });
    rig.deliver_bus_calls();
    assert_eq!(rig.dev.attentions, 1);
    assert_eq!(rig.bus.outcome_of(1), Some(CallOutcome::Success));

    rig.dev.fail_attention = true;
    rig.bus.incoming.push_back(BusCall::SendAttention { reply: 2 });
    rig.deliver_bus_calls();
    assert!(matches!(
        rig.bus.outcome_of(2),
        Some(CallOutcome::Failed {
            errno: Errno::ENOTTY,
            ..
        })
    ));
}

#[test]
fn shutdown_discards_unanswered_requests() {
    let mut rig = Rig::new();
    rig.host_request_at(secs(0), &request_frame(1));
    rig.host_request_at(secs(0), &request_frame(2));
    rig.answer(1, 2);

    rig.bridge.shutdown();
    assert!(rig.bridge.queue().is_empty());
    assert!(!rig.bridge.wants_write());
    assert!(rig.dev.written.is_empty());
}
