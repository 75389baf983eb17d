//! LZW stream decoder using the weezl crate.
//!
//! LZW decoder with TIFF/PNG predictor support.

use crate::error::Result;
use weezl::{BitOrder, decode::Decoder};

/// Decode LZW-encoded data (PDF variant: MSB first, 8-bit, EarlyChange=1).
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    lzwdecode_with_earlychange(data, 1)
}

/// Decode LZW-encoded data with an explicit EarlyChange setting.
///
/// EarlyChange=1 is the PDF default; EarlyChange=0 uses TIFF code-size
/// switching one symbol later than the default.
pub fn lzwdecode_with_earlychange(data: &[u8], early_change: i32) -> Result<Vec<u8>> {
    let mut decoder = if early_change == 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    // Lenient: ignore trailing corruption and return
    // whatever decoded cleanly.
    let _ = decoder.into_vec(&mut output).decode(data);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lzwdecode() {
        let input = b"\x80\x0b\x60\x50\x22\x0c\x0c\x85\x01";
        let expected = b"\x2d\x2d\x2d\x2d\x2d\x41\x2d\x2d\x2d\x42";
        assert_eq!(lzwdecode(input).unwrap(), expected);
    }
}
