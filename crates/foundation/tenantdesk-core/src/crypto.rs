//! Passwords and the per-user epoch cipher.
//!
//! A user's *epoch* is a pair of random 96-bit nonces stored on the user
//! record. CAP sign-in rotates it and seals the plan end date and the role
//! name under it; the sealed strings travel inside the JWT. Once the epoch
//! rotates, older tokens no longer authenticate on decrypt.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

const LETTERS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SYMBOLS: &str = "!@#$*";

/// Password used for generated accounts in development environments.
pub const DEV_PASSWORD: &str = "test@123";

pub fn generate_password(length: usize, numbers: bool, symbols: bool) -> String {
    let mut chars = String::from(LETTERS);
    if numbers {
        chars.push_str(DIGITS);
    }
    if symbols {
        chars.push_str(SYMBOLS);
    }
    let pool: Vec<char> = chars.chars().collect();
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect()
}

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for a malformed stored hash alike.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epoch {
    time_nonce: [u8; NONCE_LEN],
    role_nonce: [u8; NONCE_LEN],
}

impl Epoch {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut time_nonce = [0u8; NONCE_LEN];
        let mut role_nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut time_nonce);
        rng.fill_bytes(&mut role_nonce);
        Self {
            time_nonce,
            role_nonce,
        }
    }

    /// Form stored on `user.iv`.
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(NONCE_LEN * 2);
        raw.extend_from_slice(&self.time_nonce);
        raw.extend_from_slice(&self.role_nonce);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::InvalidEpoch(e.to_string()))?;
        if raw.len() != NONCE_LEN * 2 {
            return Err(Error::InvalidEpoch(format!(
                "expected {} bytes, got {}",
                NONCE_LEN * 2,
                raw.len()
            )));
        }
        let mut time_nonce = [0u8; NONCE_LEN];
        let mut role_nonce = [0u8; NONCE_LEN];
        time_nonce.copy_from_slice(&raw[..NONCE_LEN]);
        role_nonce.copy_from_slice(&raw[NONCE_LEN..]);
        Ok(Self {
            time_nonce,
            role_nonce,
        })
    }
}

/// Symmetric cipher keyed from `CRYPTO_SECRET`.
#[derive(Clone)]
pub struct EpochCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for EpochCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpochCipher").finish_non_exhaustive()
    }
}

impl EpochCipher {
    pub fn new(secret: &str) -> Result<Self> {
        let key = Sha256::digest(secret.as_bytes());
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| Error::Cipher(e.to_string()))?;
        Ok(Self { cipher })
    }

    fn seal(&self, nonce: &[u8; NONCE_LEN], plaintext: &str) -> Result<String> {
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .map_err(|e| Error::Cipher(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn open(&self, nonce: &[u8; NONCE_LEN], sealed: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(sealed)
            .map_err(|e| Error::Cipher(e.to_string()))?;
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), raw.as_ref())
            .map_err(|e| Error::Cipher(e.to_string()))?;
        String::from_utf8(plain).map_err(|e| Error::Cipher(e.to_string()))
    }

    /// Seal the plan end date (epoch millis).
    pub fn seal_time(&self, epoch: &Epoch, millis: i64) -> Result<String> {
        self.seal(&epoch.time_nonce, &millis.to_string())
    }

    pub fn open_time(&self, epoch: &Epoch, sealed: &str) -> Result<i64> {
        self.open(&epoch.time_nonce, sealed)?
            .parse::<i64>()
            .map_err(|e| Error::Cipher(e.to_string()))
    }

    pub fn seal_role(&self, epoch: &Epoch, role: &str) -> Result<String> {
        self.seal(&epoch.role_nonce, role)
    }

    pub fn open_role(&self, epoch: &Epoch, sealed: &str) -> Result<String> {
        self.open(&epoch.role_nonce, sealed)
    }
}
