#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use network_interceptor::protocol::framing;

fuzz_target!(|data: &[u8]| {
    // Fuzz frame splitting - test for panics, crashes, infinite loops
    let mut buf = BytesMut::from(data);
    while let Ok(Some(frame)) = framing::split_frame(&mut buf, 1 << 16) {
        // Whatever split, re-emitting must succeed and round-trip
        let mut wire = BytesMut::new();
        if framing::emit_frame(&mut wire, &frame, 1 << 16).is_ok() {
            let mut reparsed = wire;
            let again = framing::split_frame(&mut reparsed, 1 << 16);
            assert_eq!(again.unwrap().as_deref(), Some(&frame[..]));
        }
    }
});
