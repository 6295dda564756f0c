#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use network_interceptor::protocol::framing;

fuzz_target!(|data: &[u8]| {
    // Fuzz VarInt parsing
    if let Ok(Some((value, len))) = framing::peek_varint(data) {
        assert!(len <= framing::MAX_VARINT_LEN);
        assert!(len <= data.len());

        // Re-encoding the parsed value must produce a parseable VarInt
        let mut buf = BytesMut::new();
        framing::write_varint(&mut buf, value);
        let (reparsed, _) = framing::peek_varint(&buf).unwrap().unwrap();
        assert_eq!(reparsed, value);
    }
});
