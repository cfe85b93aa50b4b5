//! Fuzz target for Payload::decode
//!
//! Feeds arbitrary CBOR under every opcode to catch:
//! - Malformed CBOR data
//! - Type confusion (wrong payload shape for opcode)
//! - Oversized strings or collections
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pairplay_proto::{Frame, FrameHeader, Opcode, Payload};

const OPCODES: [Opcode; 5] =
    [Opcode::Invite, Opcode::InviteReply, Opcode::Goodbye, Opcode::Move, Opcode::Beacon];

fuzz_target!(|data: &[u8]| {
    for opcode in OPCODES {
        let _ = Payload::decode(opcode, data);

        let frame = Frame::new(FrameHeader::new(opcode), data.to_vec());
        if let Ok(payload) = Payload::from_frame(&frame) {
            assert_eq!(payload.opcode(), opcode);
        }
    }
});
