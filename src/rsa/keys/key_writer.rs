use num_bigint::BigUint;
use crate::rsa::keys::{to_wire_bytes, Key};

fn write_field(out: &mut Vec<u8>, value: &BigUint) {
    let bytes = to_wire_bytes(value);
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&bytes);
}

impl Key {
    /// `[len E][E][len N][N]`, or `[len D][D][len N][N]` for a private key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_field(&mut out, &self.exponent);
        write_field(&mut out, &self.modulus);
        out
    }

    pub fn encode(&self) -> String {
        base64::encode(self.to_bytes())
    }
}
