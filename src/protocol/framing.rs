//! Frame boundary detection and emission.
//!
//! The wire format is a VarInt length prefix followed by that many body
//! bytes. This module owns the framing contract: splitting discrete frames
//! off an inbound byte stream and length-prefixing outbound bodies. Length
//! claims are validated against the configured maximum before any
//! allocation happens.

use crate::error::{constants, InterceptError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Widest legal VarInt encoding for a 32-bit value.
pub const MAX_VARINT_LEN: usize = 5;

/// Read a VarInt from the front of `src` without consuming.
///
/// Returns `Ok(None)` when more bytes are needed, `Ok(Some((value, len)))`
/// once a complete VarInt is present.
pub fn peek_varint(src: &[u8]) -> Result<Option<(i32, usize)>> {
    let mut value: u32 = 0;
    for (i, &byte) in src.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(InterceptError::MalformedFrame(
                constants::ERR_VARINT_TOO_LONG.into(),
            ));
        }
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            if i == MAX_VARINT_LEN - 1 && byte > 0x0F {
                return Err(InterceptError::MalformedFrame(
                    constants::ERR_VARINT_TOO_LONG.into(),
                ));
            }
            return Ok(Some((value as i32, i + 1)));
        }
    }
    Ok(None)
}

/// Read and consume a VarInt from `src`.
///
/// Unlike [`peek_varint`], running out of bytes mid-value is an error here:
/// this is for parsing inside an already-split frame, where truncation means
/// corruption rather than "wait for more".
pub fn read_varint(src: &mut BytesMut) -> Result<i32> {
    match peek_varint(src)? {
        Some((value, len)) => {
            src.advance(len);
            Ok(value)
        }
        None => Err(InterceptError::MalformedFrame(
            constants::ERR_TRUNCATED_VARINT.into(),
        )),
    }
}

/// Append `value` to `dst` as a VarInt.
pub fn write_varint(dst: &mut BytesMut, value: i32) {
    let mut remaining = value as u32;
    loop {
        let byte = (remaining & 0x7F) as u8;
        remaining >>= 7;
        if remaining == 0 {
            dst.put_u8(byte);
            return;
        }
        dst.put_u8(byte | 0x80);
    }
}

/// Encoded width of `value` as a VarInt.
pub fn varint_len(value: i32) -> usize {
    let mut remaining = value as u32;
    let mut len = 1;
    while remaining >= 0x80 {
        remaining >>= 7;
        len += 1;
    }
    len
}

/// Split one complete frame off the front of `src`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a whole frame. The
/// length claim is validated before the body is touched; an oversized or
/// negative claim poisons the stream and is surfaced as an error.
pub fn split_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<BytesMut>> {
    let Some((claimed, prefix_len)) = peek_varint(src)? else {
        return Ok(None);
    };

    if claimed < 0 {
        return Err(InterceptError::MalformedFrame(format!(
            "negative frame length {claimed}"
        )));
    }
    let body_len = claimed as usize;
    if body_len > max_frame_size {
        return Err(InterceptError::OversizedFrame(body_len));
    }

    if src.len() < prefix_len + body_len {
        // Partial frame; reserve so the remainder lands without realloc.
        src.reserve(prefix_len + body_len - src.len());
        return Ok(None);
    }

    src.advance(prefix_len);
    Ok(Some(src.split_to(body_len)))
}

/// Append `body` to `dst` as one length-prefixed frame.
pub fn emit_frame(dst: &mut BytesMut, body: &[u8], max_frame_size: usize) -> Result<()> {
    if body.len() > max_frame_size {
        return Err(InterceptError::OversizedFrame(body.len()));
    }
    dst.reserve(varint_len(body.len() as i32) + body.len());
    write_varint(dst, body.len() as i32);
    dst.put_slice(body);
    Ok(())
}
