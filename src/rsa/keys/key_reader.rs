use num_bigint::BigUint;
use crate::rsa::keys::{from_wire_bytes, to_wire_bytes, Key, KeyError, LENGTH_PREFIX};

/// Walks a decoded key buffer field by field.
pub struct KeyReader<'a> {
    data: &'a [u8],
    cur: usize,
}

impl<'a> KeyReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cur: 0 }
    }

    fn take(&mut self, need: usize) -> Result<&'a [u8], KeyError> {
        let left = self.data.len() - self.cur;
        if need > left {
            return Err(KeyError::Truncated { offset: self.cur, need, left });
        }
        let data = self.data;
        let bytes = &data[self.cur..self.cur + need];
        self.cur += need;
        Ok(bytes)
    }

    pub fn read_field(&mut self) -> Result<BigUint, KeyError> {
        let mut len = [0u8; LENGTH_PREFIX];
        len.copy_from_slice(self.take(LENGTH_PREFIX)?);
        let bytes = self.take(u32::from_le_bytes(len) as usize)?;
        let value = from_wire_bytes(bytes)?;
        if to_wire_bytes(&value) != bytes {
            return Err(KeyError::NonCanonical);
        }
        Ok(value)
    }

    /// Errors if anything is left after the last field.
    pub fn finish(self) -> Result<(), KeyError> {
        match self.data.len() - self.cur {
            0 => Ok(()),
            n => Err(KeyError::TrailingBytes(n)),
        }
    }
}

impl Key {
    pub fn from_bytes(data: &[u8]) -> Result<Self, KeyError> {
        let mut reader = KeyReader::new(data);
        let exponent = reader.read_field()?;
        let modulus = reader.read_field()?;
        reader.finish()?;
        if modulus < BigUint::from(2u32) {
            return Err(KeyError::InvalidModulus);
        }
        Ok(Key { exponent, modulus })
    }

    pub fn decode(text: &str) -> Result<Self, KeyError> {
        Key::from_bytes(&base64::decode(text.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use num_bigint::BigUint;
    use num_traits::One;
    use crate::rsa::keys::{Key, KeyError};

    #[test]
    fn test_decode_known() -> Result<(), Box<dyn Error>> {
        let key = Key::decode("AwAAAAEAAQQAAADu/8AA")?;
        assert_eq!(key, Key::new(BigUint::from(65537u32), BigUint::from(0xc0ffeeu32)));
        Ok(())
    }

    #[test]
    fn test_round_trip_varied_lengths() -> Result<(), Box<dyn Error>> {
        let values: Vec<BigUint> = vec![
            BigUint::from(0u32),
            BigUint::one(),
            BigUint::from(0x7fu32),
            BigUint::from(0x80u32),
            BigUint::from(0xffffu32),
            BigUint::one() << 127usize,
            (BigUint::one() << 1024usize) - 1u32,
        ];
        for e in &values {
            for n in values.iter().skip(2) {
                let key = Key::new(e.clone(), n.clone());
                let encoded = key.encode();
                let decoded = Key::decode(&encoded)?;
                assert_eq!(decoded, key);
                assert_eq!(decoded.encode(), encoded);
            }
        }
        Ok(())
    }

    #[test]
    fn test_truncated() {
        let mut bytes = Key::new(BigUint::from(65537u32), BigUint::from(3233u32)).to_bytes();
        bytes.pop();
        assert!(matches!(Key::from_bytes(&bytes), Err(KeyError::Truncated { .. })));
        assert!(matches!(Key::from_bytes(&[3, 0, 0]), Err(KeyError::Truncated { offset: 0, need: 4, left: 3 })));
        assert!(matches!(Key::from_bytes(&[]), Err(KeyError::Truncated { .. })));
    }

    #[test]
    fn test_length_prefix_overflow() {
        let bytes = [0xff, 0xff, 0xff, 0x7f, 1, 2, 3];
        assert!(matches!(Key::from_bytes(&bytes), Err(KeyError::Truncated { offset: 4, .. })));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut bytes = Key::new(BigUint::from(3u32), BigUint::from(33u32)).to_bytes();
        bytes.extend_from_slice(&[9, 9]);
        assert!(matches!(Key::from_bytes(&bytes), Err(KeyError::TrailingBytes(2))));
    }

    #[test]
    fn test_rejects_non_minimal_and_negative() {
        // 5 padded with an extra zero byte
        let padded = [2, 0, 0, 0, 5, 0, 1, 0, 0, 0, 7];
        assert!(matches!(Key::from_bytes(&padded), Err(KeyError::NonCanonical)));
        let empty = [0, 0, 0, 0, 1, 0, 0, 0, 7];
        assert!(matches!(Key::from_bytes(&empty), Err(KeyError::NonCanonical)));
        let negative = [1, 0, 0, 0, 0xff, 1, 0, 0, 0, 7];
        assert!(matches!(Key::from_bytes(&negative), Err(KeyError::Negative)));
    }

    #[test]
    fn test_rejects_degenerate_modulus() {
        let zero = [1u8, 0, 0, 0, 0x11, 1, 0, 0, 0, 0];
        assert!(matches!(Key::decode(&base64::encode(zero)), Err(KeyError::InvalidModulus)));
        let one = [1u8, 0, 0, 0, 0x11, 1, 0, 0, 0, 1];
        assert!(matches!(Key::from_bytes(&one), Err(KeyError::InvalidModulus)));
        let two = [1u8, 0, 0, 0, 0x11, 1, 0, 0, 0, 2];
        assert!(Key::from_bytes(&two).is_ok());
    }

    #[test]
    fn test_bad_base64() {
        assert!(matches!(Key::decode("not base64!"), Err(KeyError::Base64(_))));
    }
}
