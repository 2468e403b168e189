//! Content digests used by `checksum` and `verify_checksum`.
//!
//! Algorithm names follow the usual registry spellings (`MD5`, `SHA-1`,
//! `SHA-256`, ...). Matching ignores case and the dash, so `sha256` and
//! `SHA-256` name the same algorithm.

use crate::errors::{ContentError, ContentResult};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl ChecksumAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Start an incremental digest for this algorithm.
    pub fn hasher(&self) -> ContentHasher {
        match self {
            Self::Md5 => ContentHasher::Md5(md5::Context::new()),
            Self::Sha1 => ContentHasher::Sha1(Sha1::new()),
            Self::Sha256 => ContentHasher::Sha256(Sha256::new()),
            Self::Sha384 => ContentHasher::Sha384(Sha384::new()),
            Self::Sha512 => ContentHasher::Sha512(Sha512::new()),
        }
    }

    /// Lowercase hex digest of `data`.
    pub fn hex_digest(&self, data: &[u8]) -> String {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_hex()
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(ContentError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Incremental digest state.
pub enum ContentHasher {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl ContentHasher {
    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Md5(ctx) => ctx.consume(chunk),
            Self::Sha1(h) => h.update(chunk),
            Self::Sha256(h) => h.update(chunk),
            Self::Sha384(h) => h.update(chunk),
            Self::Sha512(h) => h.update(chunk),
        }
    }

    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(ctx) => format!("{:x}", ctx.compute()),
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
            Self::Sha384(h) => hex::encode(h.finalize()),
            Self::Sha512(h) => hex::encode(h.finalize()),
        }
    }
}

/// Parse an algorithm name, producing `UnsupportedAlgorithm` for unknown names.
pub fn parse_algorithm(name: &str) -> ContentResult<ChecksumAlgorithm> {
    name.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("MD5", "5d41402abc4b2a76b9719d911017c592")]
    #[case("SHA-1", "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")]
    #[case(
        "SHA-256",
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    )]
    fn known_digests_of_hello(#[case] name: &str, #[case] expected: &str) {
        let algorithm = parse_algorithm(name).unwrap();
        assert_eq!(algorithm.hex_digest(b"hello"), expected);
    }

    #[rstest]
    #[case("sha256", ChecksumAlgorithm::Sha256)]
    #[case("SHA-512", ChecksumAlgorithm::Sha512)]
    #[case("sha_384", ChecksumAlgorithm::Sha384)]
    #[case(" md5 ", ChecksumAlgorithm::Md5)]
    fn names_are_matched_loosely(#[case] name: &str, #[case] expected: ChecksumAlgorithm) {
        assert_eq!(parse_algorithm(name).unwrap(), expected);
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = parse_algorithm("CRC32").unwrap_err();
        assert!(matches!(err, ContentError::UnsupportedAlgorithm(name) if name == "CRC32"));
    }

    #[test]
    fn incremental_digest_matches_one_shot() {
        let mut hasher = ChecksumAlgorithm::Sha256.hasher();
        hasher.update(b"hel");
        hasher.update(b"lo");
        assert_eq!(
            hasher.finalize_hex(),
            ChecksumAlgorithm::Sha256.hex_digest(b"hello")
        );
    }

    #[test]
    fn sha512_digest_is_128_hex_chars() {
        let digest = ChecksumAlgorithm::Sha512.hex_digest(b"");
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
