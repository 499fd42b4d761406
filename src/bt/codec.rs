//! BT wire-frame codec.
//!
//! Wire format (both directions, at most 64 bytes):
//! ```text
//! ┌─────┬──────────────┬─────┬─────┬──────────────┬─────────────┐
//! │  L  │ netfn<<2|lun │ seq │ cmd │ cc (rsp only)│ data ...    │
//! │ 1B  │ 1B           │ 1B  │ 1B  │ 1B           │ L-3 / L-4 B │
//! └─────┴──────────────┴─────┴─────┴──────────────┴─────────────┘
//! ```
//!
//! `L` counts every byte after itself. The BT hardware hands over one whole
//! frame per read, so unlike a stream codec there is no partial-frame
//! reassembly: a read shorter than `L + 1` is a dropped frame.

use heapless::Vec;
use log::warn;

use crate::error::FrameError;

/// Largest frame the BT hardware buffer accepts, length byte included.
pub const MAX_FRAME_SIZE: usize = 64;

/// Bytes before request data: L, netfn/lun, seq, cmd.
pub const REQUEST_HEADER_SIZE: usize = 4;

/// Bytes before response data: L, netfn/lun, seq, cmd, cc.
pub const RESPONSE_HEADER_SIZE: usize = 5;

/// Request payload capacity.
pub const MAX_REQUEST_DATA: usize = MAX_FRAME_SIZE - REQUEST_HEADER_SIZE;

/// "Command response could not be provided".
pub const CC_TIMEOUT: u8 = 0xce;

/// An encoded frame, ready to hand to the device.
pub type Frame = Vec<u8, MAX_FRAME_SIZE>;

/// A request received from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub netfn: u8,
    pub lun: u8,
    pub seq: u8,
    pub cmd: u8,
    pub data: Vec<u8, MAX_REQUEST_DATA>,
}

/// A response headed back to the host.
///
/// `data` is unbounded here because callers may submit more than the
/// hardware can carry; [`encode`] truncates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub netfn: u8,
    pub lun: u8,
    pub seq: u8,
    pub cmd: u8,
    pub completion_code: u8,
    pub data: std::vec::Vec<u8>,
}

impl Response {
    /// Synthesize the timeout response for `request`.
    pub fn timeout_for(request: &Request) -> Self {
        Self {
            netfn: request.netfn.wrapping_add(1),
            lun: request.lun,
            seq: request.seq,
            cmd: request.cmd,
            completion_code: CC_TIMEOUT,
            data: std::vec::Vec::new(),
        }
    }
}

/// Decode one frame read from the BT device.
pub fn decode(buf: &[u8]) -> Result<Request, FrameError> {
    let Some(&len) = buf.first() else {
        return Err(FrameError::ShortRead {
            got: 0,
            expected: 1,
        });
    };

    let expected = len as usize + 1;
    if buf.len() < expected {
        return Err(FrameError::ShortRead {
            got: buf.len(),
            expected,
        });
    }
    if expected < REQUEST_HEADER_SIZE {
        return Err(FrameError::Malformed { len });
    }

    let body = &buf[REQUEST_HEADER_SIZE..expected];
    let mut data = Vec::new();
    // A u8 length caps the frame at 256 bytes, the device at 64.
    if data.extend_from_slice(body).is_err() {
        return Err(FrameError::Malformed { len });
    }

    Ok(Request {
        netfn: buf[1] >> 2,
        lun: buf[1] & 0x3,
        seq: buf[2],
        cmd: buf[3],
        data,
    })
}

/// Encode a response into a frame of at most `max_len` bytes.
///
/// Data that does not fit is truncated and logged: the host always gets
/// a response, even a lossy one.
pub fn encode(response: &Response, max_len: usize) -> Frame {
    let max_len = max_len.clamp(RESPONSE_HEADER_SIZE, MAX_FRAME_SIZE);
    let room = max_len - RESPONSE_HEADER_SIZE;

    let mut data_len = response.data.len();
    if data_len > room {
        warn!(
            "Response message size ({}) too big, truncating to {}",
            data_len, room
        );
        data_len = room;
    }

    let mut frame = Frame::new();
    // Capacity is MAX_FRAME_SIZE and max_len never exceeds it.
    let _ = frame.push((RESPONSE_HEADER_SIZE - 1 + data_len) as u8);
    let _ = frame.push((response.netfn << 2) | (response.lun & 0x3));
    let _ = frame.push(response.seq);
    let _ = frame.push(response.cmd);
    let _ = frame.push(response.completion_code);
    let _ = frame.extend_from_slice(&response.data[..data_len]);
    frame
}
