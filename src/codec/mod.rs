//! Codec modules for PDF stream compression and encryption.
//!
//! This module contains:
//! - `aes`: AES encryption/decryption
//! - `arcfour`: RC4 encryption
//! - `ascii85`: ASCII85 and ASCIIHex encoding
//! - `lzw`: LZW decompression
//! - `runlength`: Run-length decoding
//!
//! Image-pixel codecs (CCITT, JBIG2) are out of scope: the interpreter
//! hands undecoded image streams straight to the device.

pub mod aes;
pub mod arcfour;
pub mod ascii85;
pub mod lzw;
pub mod runlength;

// Re-export main functions for convenience
pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt, unpad_aes};
pub use arcfour::Arcfour;
pub use ascii85::{ascii85decode, asciihexdecode};
pub use lzw::lzwdecode_with_earlychange;
pub use runlength::rldecode;
