//! Credentials handed to the engine, and how task files store them.
//!
//! The engine only ever sees plaintext [`Credentials`]. How passwords are
//! stored at rest is the business of a [`CredentialProvider`]; the one
//! shipped here reads the hex-encoded XOR format used by existing task
//! files, keyed by the login name. That format is obfuscation, not
//! encryption.

use std::fmt::Write as _;
use std::iter;

use secrecy::SecretString;

use crate::error::{CredentialError, Result};

/// Plaintext credentials for one task.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    /// Set when superuser escalation is requested.
    pub superuser_password: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            superuser_password: None,
        }
    }

    pub fn with_superuser(mut self, password: impl Into<String>) -> Self {
        self.superuser_password = Some(SecretString::from(password.into()));
        self
    }
}

/// Turns stored credential fields into plaintext [`Credentials`].
pub trait CredentialProvider {
    fn credentials(
        &self,
        username: &str,
        stored_password: &str,
        stored_superuser_password: Option<&str>,
    ) -> Result<Credentials>;
}

/// Passwords stored as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCredentials;

impl CredentialProvider for PlainCredentials {
    fn credentials(
        &self,
        username: &str,
        stored_password: &str,
        stored_superuser_password: Option<&str>,
    ) -> Result<Credentials> {
        let mut credentials = Credentials::new(username, stored_password);
        if let Some(su) = stored_superuser_password {
            credentials = credentials.with_superuser(su);
        }
        Ok(credentials)
    }
}

/// Passwords stored as hex-encoded XOR ciphertext keyed by the username.
#[derive(Debug, Clone, Copy, Default)]
pub struct XorHexCredentials;

impl CredentialProvider for XorHexCredentials {
    fn credentials(
        &self,
        username: &str,
        stored_password: &str,
        stored_superuser_password: Option<&str>,
    ) -> Result<Credentials> {
        let mut credentials = Credentials::new(username, xor_decrypt(stored_password, username)?);
        if let Some(su) = stored_superuser_password {
            credentials = credentials.with_superuser(xor_decrypt(su, username)?);
        }
        Ok(credentials)
    }
}

/// XOR each character with the cycling key, then hex-encode the UTF-8 bytes.
pub fn xor_encrypt(plaintext: &str, key: &str) -> String {
    let mut out = String::with_capacity(plaintext.len() * 2);
    let mut buf = [0u8; 4];
    for (c, k) in plaintext.chars().zip(key.chars().cycle()) {
        let x = char::from_u32(c as u32 ^ k as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
        for byte in x.encode_utf8(&mut buf).bytes() {
            let _ = write!(out, "{:02x}", byte);
        }
    }
    out
}

/// Reverse of [`xor_encrypt`]: hex-decode, then XOR each byte with the
/// cycling key.
pub fn xor_decrypt(ciphertext: &str, key: &str) -> std::result::Result<String, CredentialError> {
    if key.is_empty() {
        return Err(CredentialError::EmptyKey);
    }

    let bytes = decode_hex(ciphertext.trim())?;
    iter::zip(bytes, key.chars().cycle())
        .map(|(b, k)| char::from_u32(u32::from(b) ^ k as u32).ok_or(CredentialError::InvalidText))
        .collect()
}

fn decode_hex(s: &str) -> std::result::Result<Vec<u8>, CredentialError> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return Err(CredentialError::InvalidHex);
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| CredentialError::InvalidHex))
        .collect()
}
