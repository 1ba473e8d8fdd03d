use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use num::Integer;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};
use rand::Rng;
use thiserror::Error;

pub mod config;
pub mod prime_gen;
pub mod keys;
pub mod transform;
pub mod message;
pub mod server;

use config::*;
use keys::*;
use message::Message;
use prime_gen::*;
use server::*;

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Generate a key pair of <BITS> bits (a multiple of 8) into public.key and private.key
    #[command(name = "keyGen")]
    KeyGen { bits: usize },
    /// Attach <EMAIL> to the local key pair and upload the public key
    #[command(name = "sendKey")]
    SendKey { email: String },
    /// Download the public key of <EMAIL> into <EMAIL>.key
    #[command(name = "getKey")]
    GetKey { email: String },
    /// Encrypt <PLAINTEXT> with the stored key of <EMAIL> and upload it
    #[command(name = "sendMsg")]
    SendMsg { email: String, plaintext: String },
    /// Download and decrypt the message waiting for <EMAIL>
    #[command(name = "getMsg")]
    GetMsg { email: String },
}

#[macro_export]
macro_rules! messenger_t {
    ($CONFIG: expr, $NAME: ident) => {
#[derive(Debug, Parser)]
#[command(name = "messenger", version, about = "Generate RSA keys and exchange encrypted messages through a key server")]
pub struct $NAME {
    #[command(subcommand)]
    pub command: Command,
    #[arg(short, long, global = true, default_value = $CONFIG.key_dir.as_str(), help = "Directory holding public.key, private.key and <EMAIL>.key")]
    pub key_dir: String,
    #[arg(long, global = true, env = "MESSENGER_SERVER", default_value = $CONFIG.server.as_str(), help = "Key server base url")]
    pub server: String,
    #[arg(short, long, global = true, default_value_t = $CONFIG.threads, help = "Search primes in <THREADS> threads")]
    pub threads: usize,
    #[arg(short, long, global = true, default_value_t = $CONFIG.rounds, help = "Miller Rabin rounds")]
    pub rounds: u32,
    #[arg(long, global = true, default_value_t = $CONFIG.exponent_bits, help = "Bits of the public exponent prime")]
    pub exponent_bits: usize,
    #[arg(short, long, global = true, default_value_t = $CONFIG.silent, help = "Disable log output")]
    pub silent: bool,
}
    };
}

messenger_t!(CONFIG_DEF, Cli);

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("<keysize> must be a multiple of 8 and at least 16, got {0}")]
    InvalidKeySize(usize),
    #[error("{0} not found, please use keyGen first")]
    MissingKey(String),
    #[error("Key does not exist for {0}, please use getKey first")]
    NoPublicKey(String),
    #[error("You do not have a key for {0}, please use sendKey first")]
    UnknownIdentity(String),
    #[error("The email ({0}) does not seem to exist on the server")]
    NoKey(String),
    #[error("The email ({0}) does not have any messages currently")]
    NoMessage(String),
    #[error("Message format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Prime(#[from] PrimeError),
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Server(#[from] ServerError),
}

pub fn euler(p: &BigUint, q: &BigUint) -> BigUint {
    (p - 1u32) * (q - 1u32)
}

/// Inverse of `a` modulo `n` by the iterative extended Euclidean algorithm.
///
/// `a` and `n` must be coprime. That is not checked in release builds and the
/// result is meaningless otherwise.
pub fn mod_inverse(a: &BigUint, n: &BigUint) -> BigUint {
    let modulus = BigInt::from(n.clone());
    let (mut i, mut a) = (modulus.clone(), BigInt::from(a.clone()));
    let (mut v, mut d) = (BigInt::zero(), BigInt::one());
    while a.is_positive() {
        let (t, rem) = i.div_rem(&a);
        i = std::mem::replace(&mut a, rem);
        let next = &v - &t * &d;
        v = std::mem::replace(&mut d, next);
    }
    debug_assert!(i.is_one(), "mod_inverse called on non-coprime inputs");
    v %= &modulus;
    if v.is_negative() {
        v += &modulus;
    }
    v.magnitude().clone()
}

/// Splits `total_bits` into prime sizes, skewed 20-30% away from an even split
/// and rounded down to whole bytes. Each side keeps at least 8 bits.
pub fn split_bits<R: Rng>(total_bits: usize, rng: &mut R) -> (usize, usize) {
    let skew = rng.gen_range(20..31) * total_bits / 100;
    let half = total_bits / 2;
    let bits_p = if rng.gen_bool(0.5) { half + skew } else { half - skew };
    let bits_p = (bits_p - bits_p % 8).clamp(8, total_bits - 8);
    (bits_p, total_bits - bits_p)
}

/// Runs the searches for `p` and `q` side by side.
fn find_pair(search: &PrimeSearch, bits_p: usize, bits_q: usize) -> Result<(BigUint, BigUint), PrimeError> {
    let (tx, rx) = bounded(2);
    let handles = [bits_p, bits_q].into_iter().enumerate().map(|(i, bits)| {
        let (tx, search) = (tx.clone(), search.clone());
        thread::spawn(move || {
            let _ = tx.send((i, search.find_prime(bits)));
        })
    }).collect::<Vec<_>>();
    drop(tx);
    let mut primes = [None, None];
    for (i, prime) in rx.iter() {
        primes[i] = Some(prime);
    }
    for handle in handles { let _ = handle.join(); }
    let [p, q] = primes;
    Ok((p.ok_or(PrimeError::NoResult)??, q.ok_or(PrimeError::NoResult)??))
}

pub fn generate_key(search: &PrimeSearch, total_bits: usize, exponent_bits: usize) -> Result<KeySet, PrimeError> {
    if total_bits < 16 || total_bits % 8 != 0 {
        return Err(PrimeError::InvalidBits(total_bits));
    }
    let (bits_p, bits_q) = split_bits(total_bits, &mut rand::thread_rng());
    info!("Generating {}-bit key from {}-bit p and {}-bit q", total_bits, bits_p, bits_q);
    let (p, mut q) = find_pair(search, bits_p, bits_q)?;
    while p == q {
        q = search.find_prime(bits_q)?;
    }
    let n = &p * &q;
    let r = euler(&p, &q);
    let mut e;
    loop {
        e = search.find_prime(exponent_bits)?;
        if r.gcd(&e).is_one() { break; }
        debug!("Exponent {} divides r, drawing another", e);
    }
    let d = mod_inverse(&e, &r);
    check_key_set(&d, &e, &r);
    Ok(KeySet { public: Key::new(e, n.clone()), private: Key::new(d, n) })
}

fn check_key_set(d: &BigUint, e: &BigUint, r: &BigUint) {
    let res = (d * e) % r;
    debug!("(d * e) % r = {} % {} = {}", d * e, r, res);
    debug_assert!(res.is_one());
}

/// The command layer: key files under `dir`, keys and messages exchanged through `store`.
pub struct Messenger<S: KeyStore> {
    pub store: S,
    pub dir: PathBuf,
    pub search: PrimeSearch,
    pub exponent_bits: usize,
}

impl<S: KeyStore> Messenger<S> {
    pub fn new(store: S, dir: PathBuf, search: PrimeSearch) -> Self {
        Self { store, dir, search, exponent_bits: CONFIG_DEF.exponent_bits }
    }

    pub fn public_path(&self) -> PathBuf { self.dir.join(PUBLIC_KEY_FILE) }

    pub fn private_path(&self) -> PathBuf { self.dir.join(PRIVATE_KEY_FILE) }

    pub fn contact_path(&self, email: &str) -> PathBuf { self.dir.join(format!("{}.key", email)) }

    fn require(path: PathBuf) -> Result<PathBuf, MessengerError> {
        match path.exists() {
            true => Ok(path),
            false => Err(MessengerError::MissingKey(path.display().to_string())),
        }
    }

    pub fn key_gen(&self, bits: usize) -> Result<KeyPair, MessengerError> {
        if bits < 16 || bits % 8 != 0 {
            return Err(MessengerError::InvalidKeySize(bits));
        }
        let keys = generate_key(&self.search, bits, self.exponent_bits)?;
        let pair = KeyPair::from(&keys);
        pair.save(&self.public_path(), &self.private_path())?;
        info!("Generated key files: {}, {}", self.public_path().display(), self.private_path().display());
        Ok(pair)
    }

    pub fn send_key(&self, email: &str) -> Result<(), MessengerError> {
        let public_path = Self::require(self.public_path())?;
        let private_path = Self::require(self.private_path())?;
        let mut pair = KeyPair::load(&public_path, &private_path)?;
        pair.public.email = email.to_string();
        if !pair.private.add_email(email) {
            debug!("{} is already attached to the private key", email);
        }
        pair.save(&public_path, &private_path)?;
        self.store.put(StoreKind::Key, email, pair.public.to_json()?)?;
        info!("Public key uploaded for {}", email);
        Ok(())
    }

    pub fn get_key(&self, email: &str) -> Result<PublicKeyData, MessengerError> {
        let body = self.store.get(StoreKind::Key, email)?
            .ok_or_else(|| MessengerError::NoKey(email.to_string()))?;
        let data = PublicKeyData::from_json(&body)?;
        data.key()?;
        let path = self.contact_path(email);
        data.save(&path)?;
        info!("Stored key of {} in {}", email, path.display());
        Ok(data)
    }

    pub fn send_msg(&self, email: &str, plaintext: &str) -> Result<Message, MessengerError> {
        let path = self.contact_path(email);
        if !path.exists() {
            return Err(MessengerError::NoPublicKey(email.to_string()));
        }
        let key = PublicKeyData::load(&path)?.key()?;
        let message = Message::encrypt(email, plaintext, &key);
        self.store.put(StoreKind::Message, email, message.to_json()?)?;
        Ok(message)
    }

    pub fn get_msg(&self, email: &str) -> Result<String, MessengerError> {
        let private = PrivateKeyData::load(&Self::require(self.private_path())?)?;
        if !private.has_email(email) {
            return Err(MessengerError::UnknownIdentity(email.to_string()));
        }
        let body = self.store.get(StoreKind::Message, email)?
            .ok_or_else(|| MessengerError::NoMessage(email.to_string()))?;
        let message = Message::from_json(&body)?;
        Ok(message.decrypt(&private.key()?)?)
    }
}

impl Cli {
    pub fn messenger(&self) -> Messenger<HttpStore> {
        let mut messenger = Messenger::new(
            HttpStore::new(&self.server),
            PathBuf::from(&self.key_dir),
            PrimeSearch::new(self.threads, self.rounds));
        messenger.exponent_bits = self.exponent_bits;
        messenger
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        if self.silent { return None; }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    pub fn run(&self) -> Result<(), MessengerError> {
        debug!("Run args: {:?}", self);
        let messenger = self.messenger();
        match &self.command {
            Command::KeyGen { bits } => {
                let pb = self.spinner(format!("Generating {}-bit key", bits));
                let res = messenger.key_gen(*bits);
                if let Some(pb) = pb { pb.finish_and_clear(); }
                res?;
            }
            Command::SendKey { email } => {
                messenger.send_key(email)?;
                println!("Key saved");
            }
            Command::GetKey { email } => {
                messenger.get_key(email)?;
            }
            Command::SendMsg { email, plaintext } => {
                messenger.send_msg(email, plaintext)?;
                println!("Message written");
            }
            Command::GetMsg { email } => {
                println!("{}", messenger.get_msg(email)?);
            }
        }
        Ok(())
    }
}
