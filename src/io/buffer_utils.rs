//! Buffer utilities for varint and fixed-width integer framing
//!
//! Readers get whatever bytes the transport has buffered so far, so decoding
//! here reports "need more bytes" as `None` instead of failing.

use crate::{
    Error,
    Result,
};
use bytes::{
    Buf,
    BufMut,
    BytesMut,
};

/// Longest varint encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Decode a varint from the start of `buffer`
///
/// Returns the value and the number of bytes it occupied, or `None` when the
/// buffer ends before the terminating byte.
pub fn try_read_varint(buffer: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut result: u64 = 0;
    let mut shift = 0;

    for (i, &byte) in buffer.iter().enumerate() {
        if shift >= 64 || (shift == 63 && byte & 0x7E != 0) {
            return Err(Error::Protocol("Varint overflow".to_string()));
        }

        result |= ((byte & 0x7F) as u64) << shift;

        if byte & 0x80 == 0 {
            return Ok(Some((result, i + 1)));
        }

        shift += 7;
    }

    if buffer.len() >= MAX_VARINT_LEN {
        return Err(Error::Protocol("Varint overflow".to_string()));
    }

    Ok(None)
}

/// Number of bytes the varint encoding of `value` takes
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Write a varint-encoded u64 to a byte buffer
pub fn write_varint(buffer: &mut BytesMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;

        if value != 0 {
            byte |= 0x80;
        }

        buffer.put_u8(byte);

        if value == 0 {
            break;
        }
    }
}

/// Encode a varint into the front of `out`
///
/// Returns the number of bytes written, or `None` (writing nothing) when
/// `out` is too short for the whole encoding.
pub fn put_varint(out: &mut [u8], mut value: u64) -> Option<usize> {
    let len = varint_len(value);
    if out.len() < len {
        return None;
    }

    for slot in out.iter_mut().take(len) {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        *slot = byte;
    }

    Some(len)
}

/// Write a varint to a raw Vec<u8> (convenience for tests)
pub fn write_varint_to_vec(buf: &mut Vec<u8>, value: u64) {
    let mut encoded = BytesMut::with_capacity(MAX_VARINT_LEN);
    write_varint(&mut encoded, value);
    buf.extend_from_slice(&encoded);
}

/// Read a little-endian u64 if at least 8 bytes are available
pub fn try_read_u64_le(buffer: &[u8]) -> Option<u64> {
    if buffer.len() < 8 {
        return None;
    }
    let mut head = &buffer[..8];
    Some(head.get_u64_le())
}

/// Write a little-endian u64 if `out` has room for it
pub fn try_write_u64_le(out: &mut [u8], value: u64) -> bool {
    if out.len() < 8 {
        return false;
    }
    out[..8].copy_from_slice(&value.to_le_bytes());
    true
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_varint_roundtrip() {
        let test_cases =
            vec![0u64, 1, 127, 128, 255, 256, 65535, 65536, u64::MAX];

        for value in test_cases {
            let mut buf = BytesMut::new();
            write_varint(&mut buf, value);
            assert_eq!(buf.len(), varint_len(value));

            let decoded = try_read_varint(&buf).unwrap();
            assert_eq!(
                decoded,
                Some((value, buf.len())),
                "Varint roundtrip failed for {}",
                value
            );
        }
    }

    #[test]
    fn test_varint_incomplete() {
        let mut buf = BytesMut::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf.len(), 2);

        assert_eq!(try_read_varint(&buf[..1]).unwrap(), None);
        assert_eq!(try_read_varint(&[]).unwrap(), None);
    }

    #[test]
    fn test_varint_overflow() {
        let buf = [0xFFu8; 10];
        assert!(try_read_varint(&buf).is_err());

        // Tenth byte may carry only the top bit of a u64
        let mut buf = [0xFFu8; 10];
        buf[9] = 0x02;
        assert!(try_read_varint(&buf).is_err());
    }

    #[test]
    fn test_put_varint() {
        let mut out = [0u8; 1];
        assert_eq!(put_varint(&mut out, 300), None);
        assert_eq!(out, [0]);

        let mut out = [0u8; 4];
        assert_eq!(put_varint(&mut out, 300), Some(2));
        assert_eq!(try_read_varint(&out).unwrap(), Some((300, 2)));
    }

    #[test]
    fn test_varint_to_vec() {
        let mut buf = Vec::new();
        write_varint_to_vec(&mut buf, 300);
        assert_eq!(try_read_varint(&buf).unwrap(), Some((300, 2)));
    }

    #[test]
    fn test_u64_le() {
        let mut out = [0u8; 9];
        assert!(try_write_u64_le(&mut out, 0x0102));
        assert_eq!(try_read_u64_le(&out), Some(0x0102));
        assert_eq!(try_read_u64_le(&out[..7]), None);
        assert!(!try_write_u64_le(&mut out[..3], 1));
    }
}
