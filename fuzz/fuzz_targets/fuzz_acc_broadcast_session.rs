//! Fuzzes a sequence of ACC broadcasting frames against one registered
//! session with a populated entry list.
//!
//! Input is split on 0xFF separators; each chunk is handed to the session as
//! one datagram. A frame that fails must leave the state untouched.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_acc_broadcast_session
#![no_main]
use acc_broadcast_protocol::{ClientSession, RegistrationParams};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut session = ClientSession::new(RegistrationParams::default());
    if session.connect().is_err()
        || session.handle_inbound(&[0x01, 7, 0, 0, 0]).is_err()
        || session
            .handle_inbound(&[0x04, 7, 0, 0, 0, 3, 0, 0, 0, 1, 0, 2, 0])
            .is_err()
    {
        return;
    }

    for datagram in data.split(|&b| b == 0xFF) {
        let before = session.state().clone();
        if session.handle_inbound(datagram).is_err() {
            assert_eq!(session.state(), &before);
        }
    }
});
