//! Hash targets and their verification.

use core::{
    fmt::{self, Display},
    ops::RangeInclusive,
    str::FromStr,
};
use std::io::BufRead;

use hashaudit_commons::{Digest, HashType};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::error::{AuditError, AuditResult};

/// The work factors accepted by bcrypt.
pub const BCRYPT_COSTS: RangeInclusive<u32> = 4..=31;

/// The pseudo-random function used by PBKDF2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pbkdf2Prf {
    Sha1,
    Sha256,
    Sha512,
}

impl FromStr for Pbkdf2Prf {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(Pbkdf2Prf::Sha1),
            "sha256" => Ok(Pbkdf2Prf::Sha256),
            "sha512" => Ok(Pbkdf2Prf::Sha512),
            _ => Err(AuditError::UnsupportedAlgorithm(format!("pbkdf2:{s}"))),
        }
    }
}

/// An algorithm a target can be hashed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// A fast unsalted hash function.
    Digest(HashType),
    /// bcrypt, verify-only.
    Bcrypt,
    /// PBKDF2, verify-only.
    Pbkdf2,
}

impl Algorithm {
    /// Every supported algorithm, fast hash functions first.
    pub fn all() -> impl Iterator<Item = Algorithm> {
        HashType::ALL
            .into_iter()
            .map(Algorithm::Digest)
            .chain([Algorithm::Bcrypt, Algorithm::Pbkdf2])
    }

    /// Returns true if candidates can only be checked with the verification routine
    /// of the algorithm.
    pub fn is_verify_only(&self) -> bool {
        !matches!(self, Algorithm::Digest(_))
    }
}

impl FromStr for Algorithm {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bcrypt" => Ok(Algorithm::Bcrypt),
            "pbkdf2" => Ok(Algorithm::Pbkdf2),
            other => Ok(Algorithm::Digest(other.parse()?)),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Digest(hash_type) => hash_type.fmt(f),
            Algorithm::Bcrypt => f.write_str("bcrypt"),
            Algorithm::Pbkdf2 => f.write_str("pbkdf2"),
        }
    }
}

/// Parameters extracted from the target when it is built.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Params {
    Digest(Digest),
    Bcrypt,
    Pbkdf2 {
        prf: Pbkdf2Prf,
        iterations: u32,
        salt: Vec<u8>,
        key: Vec<u8>,
    },
}

/// A hash to audit. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashTarget {
    algorithm: Algorithm,
    digest: String,
    salt: Option<String>,
    work_factor: Option<u32>,
    params: Params,
}

impl HashTarget {
    /// Creates a new target, validating the digest against the algorithm.
    pub fn new(algorithm: Algorithm, digest: &str) -> AuditResult<Self> {
        let digest = digest.trim();

        match algorithm {
            Algorithm::Digest(hash_type) => Self::new_digest(hash_type, digest),
            Algorithm::Bcrypt => Self::new_bcrypt(digest),
            Algorithm::Pbkdf2 => Self::new_pbkdf2(digest),
        }
    }

    /// Creates a new target from an algorithm name.
    pub fn parse(algorithm: &str, digest: &str) -> AuditResult<Self> {
        Self::new(algorithm.parse()?, digest)
    }

    /// Reads one target per line, all hashed with the same algorithm.
    /// Blank lines are skipped.
    pub fn parse_list<R: BufRead>(algorithm: &str, reader: R) -> AuditResult<Vec<Self>> {
        let algorithm = algorithm.parse::<Algorithm>()?;
        let mut targets = Vec::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let target = Self::new(algorithm, &line).map_err(|err| match err {
                AuditError::MalformedDigest(reason) => {
                    AuditError::MalformedDigest(format!("line {}: {reason}", i + 1))
                }
                err => err,
            })?;
            targets.push(target);
        }

        if targets.is_empty() {
            return Err(AuditError::Source("the hash list is empty".to_owned()));
        }

        Ok(targets)
    }

    fn new_digest(hash_type: HashType, digest: &str) -> AuditResult<Self> {
        let digest = digest.to_ascii_lowercase();
        let bytes = hex::decode(&digest)
            .map_err(|_| AuditError::MalformedDigest(format!("{digest} is not valid hexadecimal")))?;

        if bytes.len() != hash_type.digest_size() {
            return Err(AuditError::MalformedDigest(format!(
                "a {hash_type} digest is {} bytes long, got {}",
                hash_type.digest_size(),
                bytes.len()
            )));
        }

        let mut decoded = Digest::new();
        decoded.extend_from_slice(&bytes);

        Ok(Self {
            algorithm: Algorithm::Digest(hash_type),
            digest,
            salt: None,
            work_factor: None,
            params: Params::Digest(decoded),
        })
    }

    /// Expects `$2b$<cost>$<22-char salt><31-char hash>`.
    fn new_bcrypt(digest: &str) -> AuditResult<Self> {
        let malformed = || AuditError::MalformedDigest(format!("{digest} is not a bcrypt hash"));

        let rest = ["$2a$", "$2b$", "$2y$"]
            .iter()
            .find_map(|prefix| digest.strip_prefix(prefix))
            .ok_or_else(malformed)?;

        let (cost, body) = rest.split_once('$').ok_or_else(malformed)?;
        if cost.is_empty() || !cost.bytes().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let cost = cost
            .parse::<u32>()
            .ok()
            .filter(|cost| BCRYPT_COSTS.contains(cost))
            .ok_or_else(|| {
                AuditError::MalformedDigest(format!(
                    "{digest} has a bcrypt cost outside of {BCRYPT_COSTS:?}"
                ))
            })?;

        if body.is_empty() {
            return Err(AuditError::MissingSalt("bcrypt"));
        }

        let is_bcrypt_base64 = |c: u8| c.is_ascii_alphanumeric() || c == b'.' || c == b'/';
        if body.len() != 53 || !body.bytes().all(is_bcrypt_base64) {
            return Err(malformed());
        }

        Ok(Self {
            algorithm: Algorithm::Bcrypt,
            digest: digest.to_owned(),
            salt: Some(body[..22].to_owned()),
            work_factor: Some(cost),
            params: Params::Bcrypt,
        })
    }

    /// Expects `pbkdf2:<algorithm>:<iterations>:<salt>:<derived key hex>`.
    fn new_pbkdf2(digest: &str) -> AuditResult<Self> {
        let malformed =
            |reason: &str| AuditError::MalformedDigest(format!("{digest} is not a pbkdf2 hash: {reason}"));

        let fields = digest.split(':').collect::<Vec<_>>();
        let [scheme, prf, iterations, salt, key] = fields.as_slice() else {
            return Err(malformed("expected 5 fields separated by ':'"));
        };

        if *scheme != "pbkdf2" {
            return Err(malformed("missing the pbkdf2 prefix"));
        }

        let prf = prf.parse::<Pbkdf2Prf>()?;

        let iterations = iterations
            .parse::<u32>()
            .ok()
            .filter(|iterations| *iterations > 0)
            .ok_or_else(|| malformed("the iteration count should be a positive integer"))?;

        if salt.is_empty() {
            return Err(AuditError::MissingSalt("pbkdf2"));
        }

        let key = key.to_ascii_lowercase();
        let key_bytes = hex::decode(&key)
            .ok()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| malformed("the derived key is not valid hexadecimal"))?;

        Ok(Self {
            algorithm: Algorithm::Pbkdf2,
            digest: format!("pbkdf2:{}:{iterations}:{salt}:{key}", prf_name(prf)),
            salt: Some((*salt).to_owned()),
            work_factor: Some(iterations),
            params: Params::Pbkdf2 {
                prf,
                iterations,
                salt: salt.as_bytes().to_vec(),
                key: key_bytes,
            },
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The normalized digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    /// The bcrypt cost or the PBKDF2 iteration count.
    pub fn work_factor(&self) -> Option<u32> {
        self.work_factor
    }
}

fn prf_name(prf: Pbkdf2Prf) -> &'static str {
    match prf {
        Pbkdf2Prf::Sha1 => "sha1",
        Pbkdf2Prf::Sha256 => "sha256",
        Pbkdf2Prf::Sha512 => "sha512",
    }
}

/// Checks candidates against a target.
pub trait Verify: Sync {
    /// Returns true if the candidate produces the target.
    fn verify(&self, candidate: &str) -> AuditResult<bool>;

    /// Whether a single verification is expensive.
    /// Attempts on slow verifiers are reported one by one.
    fn is_slow(&self) -> bool {
        false
    }
}

/// Verifies candidates against a [`HashTarget`].
#[derive(Clone, Debug)]
pub struct HashVerifier {
    target: HashTarget,
}

impl HashVerifier {
    pub fn new(target: HashTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &HashTarget {
        &self.target
    }

    /// Computes the digest of a candidate.
    /// Returns `None` for verify-only algorithms.
    #[inline]
    pub fn compute(&self, candidate: &str) -> Option<Digest> {
        match self.target.algorithm {
            Algorithm::Digest(hash_type) => Some(hash_type.hash(candidate)),
            Algorithm::Bcrypt | Algorithm::Pbkdf2 => None,
        }
    }
}

impl Verify for HashVerifier {
    fn is_slow(&self) -> bool {
        self.target.algorithm.is_verify_only()
    }

    #[inline]
    fn verify(&self, candidate: &str) -> AuditResult<bool> {
        match &self.target.params {
            Params::Digest(expected) => Ok(self.compute(candidate).as_ref() == Some(expected)),

            Params::Bcrypt => bcrypt::verify(candidate, &self.target.digest)
                .map_err(|err| AuditError::Verification(err.to_string())),

            Params::Pbkdf2 {
                prf,
                iterations,
                salt,
                key,
            } => {
                let mut derived = vec![0; key.len()];
                let password = candidate.as_bytes();

                match prf {
                    Pbkdf2Prf::Sha1 => pbkdf2_hmac::<Sha1>(password, salt, *iterations, &mut derived),
                    Pbkdf2Prf::Sha256 => {
                        pbkdf2_hmac::<Sha256>(password, salt, *iterations, &mut derived)
                    }
                    Pbkdf2Prf::Sha512 => {
                        pbkdf2_hmac::<Sha512>(password, salt, *iterations, &mut derived)
                    }
                }

                Ok(derived == *key)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hashaudit_commons::HashType;

    use super::{Algorithm, HashTarget, HashVerifier, Verify};
    use crate::error::AuditError;

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(Algorithm::Bcrypt, "bcrypt".parse().unwrap());
        assert_eq!(Algorithm::Pbkdf2, "PBKDF2".parse().unwrap());
        assert_eq!(
            Algorithm::Digest(HashType::Sha2_256),
            "sha256".parse().unwrap()
        );
        assert!(matches!(
            "whirlpool".parse::<Algorithm>(),
            Err(AuditError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_digest_target() {
        let target = HashTarget::parse("md5", "  5F4DCC3B5AA765D61D8327DEB882CF99\n").unwrap();
        assert_eq!("5f4dcc3b5aa765d61d8327deb882cf99", target.digest());
        assert!(!target.algorithm().is_verify_only());

        let verifier = HashVerifier::new(target);
        assert!(verifier.verify("password").unwrap());
        assert!(!verifier.verify("Password").unwrap());
        assert_eq!(16, verifier.compute("x").unwrap().len());
    }

    #[test]
    fn test_malformed_digest() {
        assert!(matches!(
            HashTarget::parse("md5", "zz4dcc3b5aa765d61d8327deb882cf99"),
            Err(AuditError::MalformedDigest(_))
        ));
        // a sha1 digest given as sha256
        assert!(matches!(
            HashTarget::parse("sha256", "5baa61e4c9b93f3f0682250b6cf8331b7ee68fd8"),
            Err(AuditError::MalformedDigest(_))
        ));
    }

    #[test]
    fn test_ntlm_target() {
        let target = HashTarget::parse("ntlm", "8846f7eaee8fb117ad06bdd830b7586c").unwrap();
        assert!(HashVerifier::new(target).verify("password").unwrap());
    }

    #[test]
    fn test_bcrypt() {
        let hash = bcrypt::hash("hunter2", 4).unwrap();
        let target = HashTarget::new(Algorithm::Bcrypt, &hash).unwrap();

        assert_eq!(Some(4), target.work_factor());
        assert_eq!(Some(&hash[7..29]), target.salt());

        let verifier = HashVerifier::new(target);
        assert_eq!(None, verifier.compute("hunter2"));
        assert!(verifier.verify("hunter2").unwrap());
        assert!(!verifier.verify("hunter3").unwrap());
    }

    #[test]
    fn test_parse_list() {
        let list = "5f4dcc3b5aa765d61d8327deb882cf99\n\n  E10ADC3949BA59ABBE56E057F20F883E \n";
        let targets = HashTarget::parse_list("md5", list.as_bytes()).unwrap();

        assert_eq!(2, targets.len());
        assert_eq!("e10adc3949ba59abbe56e057f20f883e", targets[1].digest());

        let err = HashTarget::parse_list("md5", "5f4dcc3b5aa765d61d8327deb882cf99\nabc\n".as_bytes())
            .unwrap_err();
        assert!(matches!(&err, AuditError::MalformedDigest(reason) if reason.starts_with("line 2")));

        assert!(matches!(
            HashTarget::parse_list("md5", "\n \n".as_bytes()),
            Err(AuditError::Source(_))
        ));
        assert!(matches!(
            HashTarget::parse_list("whirlpool", "00".as_bytes()),
            Err(AuditError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_all_algorithms() {
        let names = Algorithm::all().map(|algorithm| algorithm.to_string()).collect::<Vec<_>>();

        assert_eq!(14, names.len());
        for name in names {
            assert!(name.parse::<Algorithm>().is_ok(), "{name}");
        }
    }

    #[test]
    fn test_malformed_bcrypt() {
        assert!(matches!(
            HashTarget::parse("bcrypt", "invalid_hash"),
            Err(AuditError::MalformedDigest(_))
        ));
        assert!(matches!(
            HashTarget::parse("bcrypt", "$2b$10$"),
            Err(AuditError::MissingSalt("bcrypt"))
        ));
        assert!(matches!(
            HashTarget::parse("bcrypt", "$2b$10$tooshort"),
            Err(AuditError::MalformedDigest(_))
        ));

        let body = "N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";
        for cost in ["03", "32", "99"] {
            assert!(matches!(
                HashTarget::parse("bcrypt", &format!("$2b${cost}${body}")),
                Err(AuditError::MalformedDigest(_))
            ));
        }
        assert!(HashTarget::parse("bcrypt", &format!("$2b$31${body}")).is_ok());
    }

    #[test]
    fn test_pbkdf2() {
        let target = HashTarget::parse(
            "pbkdf2",
            "pbkdf2:sha256:1:salt:120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b",
        )
        .unwrap();
        assert_eq!(Some("salt"), target.salt());
        assert_eq!(Some(1), target.work_factor());

        let verifier = HashVerifier::new(target);
        assert!(verifier.verify("password").unwrap());
        assert!(!verifier.verify("passw0rd").unwrap());

        let target = HashTarget::parse(
            "pbkdf2",
            "pbkdf2:sha1:2:salt:EA6C014DC72D6F8CCD1ED92ACE1D41F0D8DE8957",
        )
        .unwrap();
        assert!(HashVerifier::new(target).verify("password").unwrap());
    }

    #[test]
    fn test_malformed_pbkdf2() {
        assert!(matches!(
            HashTarget::parse("pbkdf2", "pbkdf2:sha256:1::abcd"),
            Err(AuditError::MissingSalt("pbkdf2"))
        ));
        assert!(matches!(
            HashTarget::parse("pbkdf2", "pbkdf2:md5:1:salt:abcd"),
            Err(AuditError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            HashTarget::parse("pbkdf2", "pbkdf2:sha256:0:salt:abcd"),
            Err(AuditError::MalformedDigest(_))
        ));
        assert!(matches!(
            HashTarget::parse("pbkdf2", "pbkdf2:sha256:1:salt"),
            Err(AuditError::MalformedDigest(_))
        ));
    }
}
