//! Throwaway identities for registration traffic.
use rand::Rng;
use serde::Serialize;
use stampede_core::FixtureCredential;
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = vec![];
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// A short token that is unique with overwhelming probability: random bits followed by the wall
/// clock in milliseconds, both in base 36.
pub fn random_token() -> String {
    let random: u64 = rand::thread_rng().gen();
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    format!("{}{}", base36(random), base36(millis))
}

/// `u_<token>@<domain>`
pub fn unique_email(domain: &str) -> String {
    format!("u_{}@{domain}", random_token())
}

/// JSON body of the register and login endpoints.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Credentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a FixtureCredential> for Credentials<'a> {
    fn from(credential: &'a FixtureCredential) -> Self {
        Self {
            email: &credential.email,
            password: &credential.password,
        }
    }
}
