use std::fmt::{Display, Formatter};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Server request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Key,
    Message,
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Key => write!(f, "Key"),
            StoreKind::Message => write!(f, "Message"),
        }
    }
}

/// Remote key/message store addressed by kind and email.
pub trait KeyStore {
    fn put(&self, kind: StoreKind, email: &str, body: String) -> Result<(), ServerError>;

    /// `None` when the server has nothing stored for `email`.
    fn get(&self, kind: StoreKind, email: &str) -> Result<Option<String>, ServerError>;
}

impl<T: KeyStore + ?Sized> KeyStore for &T {
    fn put(&self, kind: StoreKind, email: &str, body: String) -> Result<(), ServerError> {
        (**self).put(kind, email, body)
    }

    fn get(&self, kind: StoreKind, email: &str) -> Result<Option<String>, ServerError> {
        (**self).get(kind, email)
    }
}

pub struct HttpStore {
    base: String,
    client: Client,
}

impl HttpStore {
    pub fn new(base: &str) -> Self {
        Self { base: base.trim_end_matches('/').to_string(), client: Client::new() }
    }

    pub fn url(&self, kind: StoreKind, email: &str) -> String {
        format!("{}/{}/{}", self.base, kind, email)
    }
}

impl KeyStore for HttpStore {
    fn put(&self, kind: StoreKind, email: &str, body: String) -> Result<(), ServerError> {
        let url = self.url(kind, email);
        debug!("PUT {}", url);
        self.client.put(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?
            .error_for_status()?;
        Ok(())
    }

    fn get(&self, kind: StoreKind, email: &str) -> Result<Option<String>, ServerError> {
        let url = self.url(kind, email);
        debug!("GET {}", url);
        let body = self.client.get(url).send()?.error_for_status()?.text()?;
        Ok(match body.trim() {
            "" | "null" => None,
            _ => Some(body),
        })
    }
}
