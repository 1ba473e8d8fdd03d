//! Textbook RSA on a whole payload: `c = m^e mod n`, no padding.
//!
//! The payload is read as one unsigned little-endian integer, so it only comes
//! back intact when that integer is smaller than the modulus. Trailing zero
//! bytes of the payload are not recovered either. Both limits are left unchecked.

use log::warn;
use num_bigint::BigUint;
use num_traits::Zero;
use crate::rsa::keys::{from_wire_bytes, to_wire_bytes, Key, KeyError};
use crate::rsa::prime_gen::fast_modular_exponent;

/// Encrypts with a public `(E, N)` and returns the base64 ciphertext.
pub fn encrypt(plaintext: &[u8], key: &Key) -> String {
    let m = BigUint::from_bytes_le(plaintext);
    if m >= key.modulus {
        warn!("Plaintext of {} bytes does not fit below the {}-bit modulus, it will not decrypt back",
            plaintext.len(), key.modulus.bits());
    }
    let c = fast_modular_exponent(&m, &key.exponent, &key.modulus);
    base64::encode(to_wire_bytes(&c))
}

/// Decrypts a base64 ciphertext with a private `(D, N)`.
pub fn decrypt(ciphertext: &str, key: &Key) -> Result<Vec<u8>, KeyError> {
    let c = from_wire_bytes(&base64::decode(ciphertext.trim())?)?;
    let m = fast_modular_exponent(&c, &key.exponent, &key.modulus);
    if m.is_zero() {
        return Ok(Vec::new());
    }
    Ok(m.to_bytes_le())
}
