//! Fuzz target: `codec::encode`
//!
//! Builds a response from arbitrary bytes and checks that the encoded
//! frame never exceeds the requested limit and that its length byte is
//! consistent.
//!
//! cargo fuzz run fuzz_response_encoder

#![no_main]

use btbridge::bt::codec::{self, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((head, body)) = data.split_first_chunk::<6>() else {
        return;
    };
    let rsp = Response {
        netfn: head[0] >> 2,
        lun: head[1] & 0x3,
        seq: head[2],
        cmd: head[3],
        completion_code: head[4],
        data: body.to_vec(),
    };
    let max_len = head[5] as usize;
    let frame = codec::encode(&rsp, max_len);
    assert!(frame.len() <= max_len.clamp(5, 64));
    assert_eq!(frame[0] as usize, frame.len() - 1);
});
