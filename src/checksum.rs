use std::fmt;
use std::str::FromStr;

use digest::{Digest, DynDigest};

use crate::error::{Error, Result};
use crate::manifest::{Hash, ManifestEntry};

/// A checksum algorithm accepted in Manifest hash fields.
///
/// The set is closed: Manifest lines only ever carry these nine names, and
/// the fetch pipeline constructs one streaming accumulator per requested
/// variant. See [GLEP 74](https://www.gentoo.org/glep/glep-0074.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HashAlgorithm {
    /// BLAKE2b with a 512-bit digest (`BLAKE2B`).
    Blake2b,
    /// BLAKE2s with a 256-bit digest (`BLAKE2S`).
    Blake2s,
    /// MD5 (`MD5`).
    Md5,
    /// RIPEMD-160 (`RMD160`).
    Rmd160,
    /// SHA-1 (`SHA1`).
    Sha1,
    /// SHA-256 (`SHA256`).
    Sha256,
    /// SHA3-256 (`SHA3_256`).
    Sha3_256,
    /// SHA3-512 (`SHA3_512`).
    Sha3_512,
    /// SHA-512 (`SHA512`).
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, in manifest-name order.
    pub const ALL: [HashAlgorithm; 9] = [
        HashAlgorithm::Blake2b,
        HashAlgorithm::Blake2s,
        HashAlgorithm::Md5,
        HashAlgorithm::Rmd160,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_512,
        HashAlgorithm::Sha512,
    ];

    /// The name used in Manifest hash fields.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Blake2b => "BLAKE2B",
            HashAlgorithm::Blake2s => "BLAKE2S",
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Rmd160 => "RMD160",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha3_256 => "SHA3_256",
            HashAlgorithm::Sha3_512 => "SHA3_512",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Construct a fresh streaming accumulator for this algorithm.
    pub fn hasher(self) -> Result<Box<dyn DynDigest + Send>> {
        Ok(match self {
            HashAlgorithm::Blake2b => Box::new(blake2::Blake2b512::new()),
            HashAlgorithm::Blake2s => Box::new(blake2::Blake2s256::new()),
            HashAlgorithm::Md5 => Box::new(md5::Md5::new()),
            HashAlgorithm::Rmd160 => Box::new(ripemd::Ripemd160::new()),
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Box::new(sha2::Sha256::new()),
            HashAlgorithm::Sha3_256 => Box::new(sha3::Sha3_256::new()),
            HashAlgorithm::Sha3_512 => Box::new(sha3::Sha3_512::new()),
            HashAlgorithm::Sha512 => Box::new(sha2::Sha512::new()),
        })
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BLAKE2B" => Ok(HashAlgorithm::Blake2b),
            "BLAKE2S" => Ok(HashAlgorithm::Blake2s),
            "MD5" => Ok(HashAlgorithm::Md5),
            "RMD160" => Ok(HashAlgorithm::Rmd160),
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "SHA256" => Ok(HashAlgorithm::Sha256),
            "SHA3_256" => Ok(HashAlgorithm::Sha3_256),
            "SHA3_512" => Ok(HashAlgorithm::Sha3_512),
            "SHA512" => Ok(HashAlgorithm::Sha512),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The outcome of hashing one fetched resource.
///
/// Holds the total byte count and one hex digest per requested algorithm,
/// in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumResult {
    /// Total number of bytes consumed from the response body.
    pub size: i64,
    /// `(algorithm, lowercase hex digest)` pairs for the requested algorithms.
    pub digests: Vec<(HashAlgorithm, String)>,
}

impl ChecksumResult {
    /// Look up the digest computed for `algorithm`, if it was requested.
    pub fn digest(&self, algorithm: HashAlgorithm) -> Option<&str> {
        self.digests
            .iter()
            .find(|(a, _)| *a == algorithm)
            .map(|(_, v)| v.as_str())
    }

    /// Convert into a manifest entry for `filename` with the given type tag.
    pub fn into_entry(self, kind: &str, filename: &str) -> ManifestEntry {
        let hashes = self
            .digests
            .into_iter()
            .map(|(algorithm, value)| Hash { algorithm, value })
            .collect();
        ManifestEntry {
            kind: kind.to_string(),
            filename: filename.to_string(),
            size: self.size,
            hashes,
        }
    }
}
