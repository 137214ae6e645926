//! Password digest computation for the hash document loader.
//!
//! Every password line is hashed with one or more algorithms from a small fixed
//! set. This crate wraps the RustCrypto hashers behind a single
//! [`digest`] entry point that returns both the raw digest bytes and the
//! lowercase hex string that ends up in the stored document.
//!
//! Nothing here holds state, so the functions are safe to call from any number
//! of workers at once.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest as _, Sha256, Sha384, Sha512};

/// Hex lookup table for digest encoding (lowercase).
pub const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unsupported digest algorithm '{name}'")]
    UnsupportedAlgorithm { name: String },
}

/// Digest algorithms a password line can be hashed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Canonical identifier, also used as the default document field name.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha384 => "SHA384",
            Algorithm::Sha512 => "SHA512",
        }
    }

    /// Digest size in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Accepts `sha256`, `SHA256` and `SHA-256` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        Algorithm::ALL
            .into_iter()
            .find(|alg| alg.name() == normalized)
            .ok_or_else(|| Error::UnsupportedAlgorithm { name: s.to_string() })
    }
}

/// A computed digest: the raw bytes and their lowercase hex encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub raw: Vec<u8>,
    pub hex: String,
}

/// Hashes `bytes` with `algorithm`.
pub fn digest(bytes: &[u8], algorithm: Algorithm) -> Digest {
    let raw = match algorithm {
        Algorithm::Md5 => Md5::digest(bytes).to_vec(),
        Algorithm::Sha1 => Sha1::digest(bytes).to_vec(),
        Algorithm::Sha256 => Sha256::digest(bytes).to_vec(),
        Algorithm::Sha384 => Sha384::digest(bytes).to_vec(),
        Algorithm::Sha512 => Sha512::digest(bytes).to_vec(),
    };
    let hex = encode_hex(&raw);

    Digest { raw, hex }
}

/// Hashes `bytes` with the algorithm named by `name`.
///
/// Fails with [`Error::UnsupportedAlgorithm`] when the identifier is unknown.
pub fn digest_named(bytes: &[u8], name: &str) -> Result<Digest, Error> {
    Ok(digest(bytes, name.parse()?))
}

/// Lowercase hex, two digits per byte, no separators.
#[inline]
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}
