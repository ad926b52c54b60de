//! Fuzzes a single ACC broadcasting frame against a fresh session.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_acc_broadcast_frame
#![no_main]
use acc_broadcast_protocol::{ClientSession, RegistrationParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary bytes; errors are expected, panics are not.
    let mut session = ClientSession::new(RegistrationParams::default());
    let _ = session.connect();
    let _ = session.handle_inbound(data);
});
