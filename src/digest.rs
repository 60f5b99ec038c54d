//! File content hashing
//!
//! Files are streamed through an incremental hasher with a fixed-size buffer,
//! so memory use does not depend on file size.

use crate::error::{FimError, Result};
use sha2::Digest;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const BUFFER_SIZE: usize = 64 * 1024; // 64KB

/// Supported content hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    Sha512_224,
    Sha512_256,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Blake2b,
    Blake2s,
    Blake3,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 15] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha512_224,
        HashAlgorithm::Sha512_256,
        HashAlgorithm::Sha3_224,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_384,
        HashAlgorithm::Sha3_512,
        HashAlgorithm::Blake2b,
        HashAlgorithm::Blake2s,
        HashAlgorithm::Blake3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha512_224 => "sha512_224",
            HashAlgorithm::Sha512_256 => "sha512_256",
            HashAlgorithm::Sha3_224 => "sha3_224",
            HashAlgorithm::Sha3_256 => "sha3_256",
            HashAlgorithm::Sha3_384 => "sha3_384",
            HashAlgorithm::Sha3_512 => "sha3_512",
            HashAlgorithm::Blake2b => "blake2b",
            HashAlgorithm::Blake2s => "blake2s",
            HashAlgorithm::Blake3 => "blake3",
        }
    }

    /// Length of the hex digest this algorithm produces
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha224 | HashAlgorithm::Sha512_224 | HashAlgorithm::Sha3_224 => 56,
            HashAlgorithm::Sha256
            | HashAlgorithm::Sha512_256
            | HashAlgorithm::Sha3_256
            | HashAlgorithm::Blake2s
            | HashAlgorithm::Blake3 => 64,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha3_384 => 96,
            HashAlgorithm::Sha512 | HashAlgorithm::Sha3_512 | HashAlgorithm::Blake2b => 128,
        }
    }

    fn accumulator(&self) -> Accumulator {
        match self {
            HashAlgorithm::Md5 => Accumulator::Md5(md5::Md5::new()),
            HashAlgorithm::Sha1 => Accumulator::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha224 => Accumulator::Sha224(sha2::Sha224::new()),
            HashAlgorithm::Sha256 => Accumulator::Sha256(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => Accumulator::Sha384(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => Accumulator::Sha512(sha2::Sha512::new()),
            HashAlgorithm::Sha512_224 => Accumulator::Sha512_224(sha2::Sha512_224::new()),
            HashAlgorithm::Sha512_256 => Accumulator::Sha512_256(sha2::Sha512_256::new()),
            HashAlgorithm::Sha3_224 => Accumulator::Sha3_224(sha3::Sha3_224::new()),
            HashAlgorithm::Sha3_256 => Accumulator::Sha3_256(sha3::Sha3_256::new()),
            HashAlgorithm::Sha3_384 => Accumulator::Sha3_384(sha3::Sha3_384::new()),
            HashAlgorithm::Sha3_512 => Accumulator::Sha3_512(sha3::Sha3_512::new()),
            HashAlgorithm::Blake2b => Accumulator::Blake2b(blake2::Blake2b512::new()),
            HashAlgorithm::Blake2s => Accumulator::Blake2s(blake2::Blake2s256::new()),
            HashAlgorithm::Blake3 => Accumulator::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = FimError;

    /// Accepts names case-insensitively, with `-` or `_` separators ("SHA-256", "sha3_512")
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let compact = normalized.replace('_', "");
        match compact.as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            "sha512224" => Ok(HashAlgorithm::Sha512_224),
            "sha512256" => Ok(HashAlgorithm::Sha512_256),
            "sha3224" => Ok(HashAlgorithm::Sha3_224),
            "sha3256" => Ok(HashAlgorithm::Sha3_256),
            "sha3384" => Ok(HashAlgorithm::Sha3_384),
            "sha3512" => Ok(HashAlgorithm::Sha3_512),
            "blake2b" | "blake2b512" => Ok(HashAlgorithm::Blake2b),
            "blake2s" | "blake2s256" => Ok(HashAlgorithm::Blake2s),
            "blake3" => Ok(HashAlgorithm::Blake3),
            _ => Err(FimError::InvalidAlgorithm(s.to_string())),
        }
    }
}

/// Incremental hash state for one file
enum Accumulator {
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha224(sha2::Sha224),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Sha512_224(sha2::Sha512_224),
    Sha512_256(sha2::Sha512_256),
    Sha3_224(sha3::Sha3_224),
    Sha3_256(sha3::Sha3_256),
    Sha3_384(sha3::Sha3_384),
    Sha3_512(sha3::Sha3_512),
    Blake2b(blake2::Blake2b512),
    Blake2s(blake2::Blake2s256),
    Blake3(Box<blake3::Hasher>),
}

impl Accumulator {
    fn update(&mut self, chunk: &[u8]) {
        match self {
            Accumulator::Md5(h) => h.update(chunk),
            Accumulator::Sha1(h) => h.update(chunk),
            Accumulator::Sha224(h) => h.update(chunk),
            Accumulator::Sha256(h) => h.update(chunk),
            Accumulator::Sha384(h) => h.update(chunk),
            Accumulator::Sha512(h) => h.update(chunk),
            Accumulator::Sha512_224(h) => h.update(chunk),
            Accumulator::Sha512_256(h) => h.update(chunk),
            Accumulator::Sha3_224(h) => h.update(chunk),
            Accumulator::Sha3_256(h) => h.update(chunk),
            Accumulator::Sha3_384(h) => h.update(chunk),
            Accumulator::Sha3_512(h) => h.update(chunk),
            Accumulator::Blake2b(h) => h.update(chunk),
            Accumulator::Blake2s(h) => h.update(chunk),
            Accumulator::Blake3(h) => {
                h.update(chunk);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Accumulator::Md5(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha1(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha224(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha256(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha384(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha512(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha512_224(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha512_256(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha3_224(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha3_256(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha3_384(h) => format!("{:x}", h.finalize()),
            Accumulator::Sha3_512(h) => format!("{:x}", h.finalize()),
            Accumulator::Blake2b(h) => format!("{:x}", h.finalize()),
            Accumulator::Blake2s(h) => format!("{:x}", h.finalize()),
            Accumulator::Blake3(h) => h.finalize().to_hex().to_string(),
        }
    }
}

/// Hash a file's full content.
///
/// Returns `Ok(None)` when the file cannot be opened or read (deleted between
/// listing and open, permission denied, ...). That is an expected outcome
/// during a scan, not a failure.
pub fn digest_file(path: &Path, algorithm: HashAlgorithm) -> Option<String> {
    let mut hasher = algorithm.accumulator();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("Skipping unreadable file {}: {}", path.display(), e);
            return None;
        }
    };

    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Read failed for {}: {}", path.display(), e);
                return None;
            }
        };

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Some(hasher.finalize_hex())
}

/// Hash a file using an algorithm given by name.
///
/// An unknown algorithm name fails with [`FimError::InvalidAlgorithm`] before
/// the file is touched.
pub fn digest_named(path: &Path, algorithm: &str) -> Result<Option<String>> {
    let algorithm: HashAlgorithm = algorithm.parse()?;
    Ok(digest_file(path, algorithm))
}
