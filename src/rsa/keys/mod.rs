pub mod key_writer;
pub mod key_reader;
pub mod key_data;
pub mod key_pair;

pub use key_pair::*;
pub use key_reader::*;
pub use key_writer::*;
pub use key_data::*;

use num_bigint::{BigInt, BigUint};
use thiserror::Error;

/// An exponent with its modulus: `(E, N)` for a public key, `(D, N)` for a private one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Key {
    pub exponent: BigUint,
    pub modulus: BigUint,
}

impl Key {
    pub fn new(exponent: BigUint, modulus: BigUint) -> Self {
        Self { exponent, modulus }
    }
}

#[derive(Debug, Clone)]
pub struct KeySet {
    pub public: Key,
    pub private: Key,
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Key data truncated: {need} bytes needed at offset {offset}, {left} left")]
    Truncated { offset: usize, need: usize, left: usize },
    #[error("Key data has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("Key field is negative")]
    Negative,
    #[error("Key field is not minimally encoded")]
    NonCanonical,
    #[error("Key modulus must be at least 2")]
    InvalidModulus,
    #[error("Key file format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Key file {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

/// Width of the little-endian length prefix in front of every field.
pub const LENGTH_PREFIX: usize = 4;

/// Minimal little-endian two's-complement bytes of a non-negative value.
/// A zero byte is appended when the top bit of the last byte is set, so readers
/// using a signed convention still see a positive number.
pub fn to_wire_bytes(value: &BigUint) -> Vec<u8> {
    BigInt::from(value.clone()).to_signed_bytes_le()
}

/// Reads bytes written by [`to_wire_bytes`] without insisting on the minimal form.
pub fn from_wire_bytes(bytes: &[u8]) -> Result<BigUint, KeyError> {
    BigInt::from_signed_bytes_le(bytes).to_biguint().ok_or(KeyError::Negative)
}
