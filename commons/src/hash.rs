use core::{
    fmt::{self, Display},
    str::FromStr,
};

use md4::{Digest as _, Md4};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};
use thiserror::Error;

use crate::{ntlm::ntlm, Digest};

/// All the supported unsalted hash functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashType {
    Ntlm,
    Md4,
    Md5,
    Sha1,
    Sha2_224,
    Sha2_256,
    Sha2_384,
    Sha2_512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

/// The identifier does not name a supported hash function.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown hash function: {0}")]
pub struct UnknownHashType(pub String);

impl HashType {
    /// Every hash function, in declaration order.
    pub const ALL: [HashType; 12] = [
        HashType::Ntlm,
        HashType::Md4,
        HashType::Md5,
        HashType::Sha1,
        HashType::Sha2_224,
        HashType::Sha2_256,
        HashType::Sha2_384,
        HashType::Sha2_512,
        HashType::Sha3_224,
        HashType::Sha3_256,
        HashType::Sha3_384,
        HashType::Sha3_512,
    ];

    /// Hashes a password using the right hash function.
    #[inline]
    pub fn hash(&self, password: &str) -> Digest {
        let bytes = password.as_bytes();

        match self {
            HashType::Ntlm => to_digest(&ntlm(password)),
            HashType::Md4 => to_digest(&Md4::digest(bytes)),
            HashType::Md5 => to_digest(&Md5::digest(bytes)),
            HashType::Sha1 => to_digest(&Sha1::digest(bytes)),
            HashType::Sha2_224 => to_digest(&Sha224::digest(bytes)),
            HashType::Sha2_256 => to_digest(&Sha256::digest(bytes)),
            HashType::Sha2_384 => to_digest(&Sha384::digest(bytes)),
            HashType::Sha2_512 => to_digest(&Sha512::digest(bytes)),
            HashType::Sha3_224 => to_digest(&Sha3_224::digest(bytes)),
            HashType::Sha3_256 => to_digest(&Sha3_256::digest(bytes)),
            HashType::Sha3_384 => to_digest(&Sha3_384::digest(bytes)),
            HashType::Sha3_512 => to_digest(&Sha3_512::digest(bytes)),
        }
    }

    /// Gets the digest size in bytes.
    pub fn digest_size(&self) -> usize {
        match self {
            HashType::Ntlm => Md4::output_size(),
            HashType::Md4 => Md4::output_size(),
            HashType::Md5 => Md5::output_size(),
            HashType::Sha1 => Sha1::output_size(),
            HashType::Sha2_224 => Sha224::output_size(),
            HashType::Sha2_256 => Sha256::output_size(),
            HashType::Sha2_384 => Sha384::output_size(),
            HashType::Sha2_512 => Sha512::output_size(),
            HashType::Sha3_224 => Sha3_224::output_size(),
            HashType::Sha3_256 => Sha3_256::output_size(),
            HashType::Sha3_384 => Sha3_384::output_size(),
            HashType::Sha3_512 => Sha3_512::output_size(),
        }
    }

    /// The canonical identifier of the hash function.
    pub fn name(&self) -> &'static str {
        match self {
            HashType::Ntlm => "ntlm",
            HashType::Md4 => "md4",
            HashType::Md5 => "md5",
            HashType::Sha1 => "sha1",
            HashType::Sha2_224 => "sha224",
            HashType::Sha2_256 => "sha256",
            HashType::Sha2_384 => "sha384",
            HashType::Sha2_512 => "sha512",
            HashType::Sha3_224 => "sha3-224",
            HashType::Sha3_256 => "sha3-256",
            HashType::Sha3_384 => "sha3-384",
            HashType::Sha3_512 => "sha3-512",
        }
    }
}

impl FromStr for HashType {
    type Err = UnknownHashType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");

        let hash_type = match normalized.as_str() {
            "ntlm" | "nt" => HashType::Ntlm,
            "md4" => HashType::Md4,
            "md5" => HashType::Md5,
            "sha1" | "sha-1" => HashType::Sha1,
            "sha224" | "sha-224" | "sha2-224" => HashType::Sha2_224,
            "sha256" | "sha-256" | "sha2-256" => HashType::Sha2_256,
            "sha384" | "sha-384" | "sha2-384" => HashType::Sha2_384,
            "sha512" | "sha-512" | "sha2-512" => HashType::Sha2_512,
            "sha3-224" => HashType::Sha3_224,
            "sha3-256" => HashType::Sha3_256,
            "sha3-384" => HashType::Sha3_384,
            "sha3-512" => HashType::Sha3_512,
            _ => return Err(UnknownHashType(s.to_owned())),
        };

        Ok(hash_type)
    }
}

impl Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[inline]
fn to_digest(bytes: &[u8]) -> Digest {
    let mut digest = Digest::new();
    digest.extend_from_slice(bytes);

    digest
}
