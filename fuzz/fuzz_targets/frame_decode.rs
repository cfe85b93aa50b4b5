//! Fuzz target for Frame::decode
//!
//! Session streams and discovery datagrams both start here, so arbitrary
//! bytes must never:
//! - panic the parser
//! - read past the end of the buffer
//! - produce a frame that encodes to something else
//!
//! Invalid inputs return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pairplay_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    // Whatever decodes must re-encode to the bytes it consumed
    let encoded = frame.to_vec().expect("decoded frame must encode");
    assert_eq!(&data[..encoded.len()], encoded.as_slice());
    assert_eq!(Frame::decode(&encoded).expect("re-decode"), frame);
});
