use std::fs;
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::rsa::keys::{Key, KeyError};

/// Identity a freshly generated key carries until it is sent to the server.
pub const PLACEHOLDER_EMAIL: &str = "temp";

/// `{"email": "...", "key": "<base64>"}`, the form the server stores and hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyData {
    pub email: String,
    pub key: String,
}

/// `{"email": [...], "key": "<base64>"}`, kept only on the local machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyData {
    pub email: Vec<String>,
    pub key: String,
}

impl PublicKeyData {
    pub fn new(key: &Key) -> Self {
        Self { email: PLACEHOLDER_EMAIL.to_string(), key: key.encode() }
    }

    pub fn key(&self) -> Result<Key, KeyError> {
        Key::decode(&self.key)
    }
}

impl PrivateKeyData {
    pub fn new(key: &Key) -> Self {
        Self { email: vec![PLACEHOLDER_EMAIL.to_string()], key: key.encode() }
    }

    pub fn key(&self) -> Result<Key, KeyError> {
        Key::decode(&self.key)
    }

    /// Adds `email` to the identity set. The first identity replaces the
    /// placeholder; an identity already present is left alone. Returns whether
    /// the set changed.
    pub fn add_email(&mut self, email: &str) -> bool {
        if self.email.first().map_or(false, |first| first == PLACEHOLDER_EMAIL) {
            self.email[0] = email.to_string();
        } else if self.email.iter().any(|e| e == email) {
            return false;
        } else {
            self.email.push(email.to_string());
        }
        true
    }

    pub fn has_email(&self, email: &str) -> bool {
        email != PLACEHOLDER_EMAIL && self.email.iter().any(|e| e == email)
    }
}

macro_rules! json_file {
    ($NAME: ident) => {
impl $NAME {
    pub fn to_json(&self) -> Result<String, KeyError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, KeyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, KeyError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), KeyError> {
        write_text(path, &self.to_json()?)
    }
}
    };
}

json_file!(PublicKeyData);
json_file!(PrivateKeyData);

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, KeyError> {
    let text = fs::read_to_string(path)
        .map_err(|source| KeyError::Io { path: path.display().to_string(), source })?;
    Ok(serde_json::from_str(&text)?)
}

pub(crate) fn write_text(path: &Path, text: &str) -> Result<(), KeyError> {
    fs::write(path, text).map_err(|source| KeyError::Io { path: path.display().to_string(), source })
}
