//! Fuzz target: `codec::decode`
//!
//! Feeds arbitrary device reads (any length byte, garbage, truncation)
//! into the request decoder and checks that accepted frames are within
//! the device's bounds and that their timeout reply still fits a frame.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use btbridge::bt::codec::{self, MAX_FRAME_SIZE, MAX_REQUEST_DATA, Response};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = codec::decode(data) {
        assert!(req.data.len() <= MAX_REQUEST_DATA, "payload exceeds frame");
        assert_eq!(req.data.len() + 3, data[0] as usize);
        assert!(req.lun < 4);

        let frame = codec::encode(&Response::timeout_for(&req), MAX_FRAME_SIZE);
        assert_eq!(frame.len(), 5);
    }
});
