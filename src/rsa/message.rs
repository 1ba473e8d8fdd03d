use serde::{Deserialize, Serialize};
use crate::rsa::keys::{Key, KeyError};
use crate::rsa::transform;

/// Message body exchanged with the server, `content` holds the base64 ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub email: String,
    pub content: String,
}

impl Message {
    pub fn encrypt(email: &str, plaintext: &str, key: &Key) -> Self {
        Self { email: email.to_string(), content: transform::encrypt(plaintext.as_bytes(), key) }
    }

    pub fn decrypt(&self, key: &Key) -> Result<String, KeyError> {
        let bytes = transform::decrypt(&self.content, key)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
