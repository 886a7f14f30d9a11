//! Standard-alphabet base64 for buffer contents.
//!
//! Encoding goes through the `base64` crate's STANDARD engine (`A-Z a-z 0-9
//! + /`, `=` padding, output `ceil(n/3)*4` bytes). Decoding is deliberately
//! not the crate's strict decoder: hosts feed this path whatever text they
//! were handed, so the walk is permissive. It stops at the first `=` or at a
//! truncated quartet, and characters outside the alphabet pass through the
//! value table unvalidated.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const PAD: u8 = b'=';

/// Marker for bytes outside the base64 alphabet.
const INVALID: u8 = 0xff;

/// Sextet value table; `INVALID` for bytes outside the alphabet.
const UNBASE64: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 26 {
        table[b'A' as usize + i] = i as u8;
        table[b'a' as usize + i] = 26 + i as u8;
        i += 1;
    }
    let mut d = 0;
    while d < 10 {
        table[b'0' as usize + d] = 52 + d as u8;
        d += 1;
    }
    table[b'+' as usize] = 62;
    table[b'/' as usize] = 63;
    table
};

/// Encode `data` as base64 text.
pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Number of bytes `src` decodes to.
///
/// `floor(n/4)*3`, plus one extra byte for a 2-character remainder and two
/// for a 3-character remainder; a lone 1-character remainder cannot encode a
/// byte and contributes nothing. Each trailing `=` then subtracts one.
pub fn decoded_len(src: &[u8]) -> usize {
    let mut size = (src.len() / 4) * 3;
    match src.len() % 4 {
        2 => size += 1,
        3 => size += 2,
        _ => {}
    }

    if size > 0 && src[src.len() - 1] == PAD {
        size -= 1;
    }
    if size > 0 && src.len() >= 2 && src[src.len() - 2] == PAD {
        size -= 1;
    }

    size
}

/// Decode base64 text into `dst`, returning the number of bytes written.
///
/// The walk stops at the first `=` and at a truncated final quartet. `dst`
/// must hold at least [`decoded_len`]`(src)` bytes; the walk never writes
/// more than that.
pub fn decode_into(src: &[u8], dst: &mut [u8]) -> usize {
    let mut written = 0;
    let mut i = 0;

    while i < src.len() && src[i] != PAD {
        let a = UNBASE64[src[i] as usize];
        i += 1;

        if i >= src.len() || src[i] == PAD {
            break;
        }
        let b = UNBASE64[src[i] as usize];
        i += 1;
        dst[written] = (a << 2) | ((b & 0x30) >> 4);
        written += 1;

        if i >= src.len() || src[i] == PAD {
            break;
        }
        let c = UNBASE64[src[i] as usize];
        i += 1;
        dst[written] = ((b & 0x0f) << 4) | ((c & 0x3c) >> 2);
        written += 1;

        if i >= src.len() || src[i] == PAD {
            break;
        }
        let d = UNBASE64[src[i] as usize];
        i += 1;
        dst[written] = ((c & 0x03) << 6) | (d & 0x3f);
        written += 1;
    }

    written
}
