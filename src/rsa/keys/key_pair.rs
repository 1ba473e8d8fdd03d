use std::path::Path;
use crate::rsa::keys::key_data::*;
use crate::rsa::keys::{KeyError, KeySet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    pub public: PublicKeyData,
    pub private: PrivateKeyData,
}

impl From<&KeySet> for KeyPair {
    fn from(keys: &KeySet) -> Self {
        Self { public: PublicKeyData::new(&keys.public), private: PrivateKeyData::new(&keys.private) }
    }
}

impl KeyPair {
    pub fn load(public_path: &Path, private_path: &Path) -> Result<Self, KeyError> {
        Ok(Self { public: PublicKeyData::load(public_path)?, private: PrivateKeyData::load(private_path)? })
    }

    /// Both files are serialized before either is written.
    pub fn save(&self, public_path: &Path, private_path: &Path) -> Result<(), KeyError> {
        let public = self.public.to_json()?;
        let private = self.private.to_json()?;
        write_text(public_path, &public)?;
        write_text(private_path, &private)
    }
}
