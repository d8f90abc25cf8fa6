//! Primitives shared by the audit engine and its front-ends:
//! unsalted hash functions and mask candidate spaces.

mod hash;
pub mod mask;
mod ntlm;

pub use hash::{HashType, UnknownHashType};
pub use mask::{Mask, MaskError, MaskSpace, MaskToken};
pub use ntlm::ntlm;
pub use tinyvec::ArrayVec;

/// The maximum digest size allowed.
pub const MAX_DIGEST_LENGTH_ALLOWED: usize = 64;

/// A digest stored in a stack-allocated vector.
pub type Digest = ArrayVec<[u8; MAX_DIGEST_LENGTH_ALLOWED]>;
