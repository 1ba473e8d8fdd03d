use lazy_static::lazy_static;
use num_cpus;
use crate::rsa::prime_gen::DEFAULT_CONFIDENCE;

pub const PUBLIC_KEY_FILE: &str = "public.key";
pub const PRIVATE_KEY_FILE: &str = "private.key";

#[derive(Debug, Clone)]
pub struct Config {
    pub key_dir: String,
    pub server: String,
    pub threads: usize,
    pub rounds: u32,
    pub exponent_bits: usize,
    pub silent: bool,
}

lazy_static! {
    pub static ref CONFIG_DEF: Config = Config {
        key_dir: String::from("."),
        server: String::from("http://kayrun.cs.rit.edu:5000"),
        threads: num_cpus::get(),
        rounds: DEFAULT_CONFIDENCE,
        exponent_bits: 16,
        silent: false,
    };
}
