//! Mask parsing and mixed-radix indexing of candidate spaces.
//!
//! A mask is an ordered list of character classes. Every candidate of a
//! fixed-length mask is identified by an index in `[0, space_size)`, the
//! first token being the most significant digit. Indexing never materializes
//! the space, so any chunk of it can be seeked to in O(length).

use core::{
    fmt::{self, Display},
    ops::Range,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowercase letters.
pub const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// Uppercase letters.
pub const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Decimal digits.
pub const DIGITS: &[u8] = b"0123456789";

/// Special symbols.
pub const SYMBOLS: &[u8] = b"!@#$%^&*()-_=+[]{}|;:,.<>?/~`";

/// Lowercase, uppercase, digits and symbols, in this order.
pub const ALL_PRINTABLE: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()-_=+[]{}|;:,.<>?/~`";

/// Binary digits.
pub const BINARY: &[u8] = b"01";

/// Lowercase hexadecimal digits.
pub const HEX_LOWER: &[u8] = b"0123456789abcdef";

/// Uppercase hexadecimal digits.
pub const HEX_UPPER: &[u8] = b"0123456789ABCDEF";

/// An error encountered while building a mask.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
    #[error("The mask cannot be empty")]
    Empty,

    #[error("Invalid placeholder '{placeholder}' at position {position}")]
    InvalidPlaceholder { placeholder: String, position: usize },

    #[error("Incomplete placeholder at position {0}")]
    Incomplete(usize),

    #[error("Invalid length range {min}..={max}, lengths must satisfy 1 <= min <= max")]
    LengthRange { min: usize, max: usize },

    #[error("Masks only support spaces up to 2^64, but the provided space is 2^{0}")]
    Space(u32),
}

/// One character class of a mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaskToken {
    /// `?l`
    Lower,
    /// `?u`
    Upper,
    /// `?d`
    Digit,
    /// `?s`
    Symbol,
    /// `?a`
    All,
    /// `?b`
    Binary,
    /// `?h`
    HexLower,
    /// `?H`
    HexUpper,
}

impl MaskToken {
    /// Every token, in placeholder order.
    pub const ALL: [MaskToken; 8] = [
        MaskToken::Lower,
        MaskToken::Upper,
        MaskToken::Digit,
        MaskToken::Symbol,
        MaskToken::All,
        MaskToken::Binary,
        MaskToken::HexLower,
        MaskToken::HexUpper,
    ];

    /// Maps the character following a `?` to its token.
    pub fn from_placeholder(c: char) -> Option<Self> {
        let token = match c {
            'l' => MaskToken::Lower,
            'u' => MaskToken::Upper,
            'd' => MaskToken::Digit,
            's' => MaskToken::Symbol,
            'a' => MaskToken::All,
            'b' => MaskToken::Binary,
            'h' => MaskToken::HexLower,
            'H' => MaskToken::HexUpper,
            _ => return None,
        };

        Some(token)
    }

    /// The two-character placeholder of this token.
    pub fn placeholder(&self) -> &'static str {
        match self {
            MaskToken::Lower => "?l",
            MaskToken::Upper => "?u",
            MaskToken::Digit => "?d",
            MaskToken::Symbol => "?s",
            MaskToken::All => "?a",
            MaskToken::Binary => "?b",
            MaskToken::HexLower => "?h",
            MaskToken::HexUpper => "?H",
        }
    }

    /// The ordered character set of this token.
    pub fn charset(&self) -> &'static [u8] {
        match self {
            MaskToken::Lower => LOWERCASE,
            MaskToken::Upper => UPPERCASE,
            MaskToken::Digit => DIGITS,
            MaskToken::Symbol => SYMBOLS,
            MaskToken::All => ALL_PRINTABLE,
            MaskToken::Binary => BINARY,
            MaskToken::HexLower => HEX_LOWER,
            MaskToken::HexUpper => HEX_UPPER,
        }
    }

    /// The size of the character set.
    #[inline]
    pub fn radix(&self) -> u64 {
        self.charset().len() as u64
    }

    /// Position of an ASCII character in the character set.
    #[inline]
    pub fn position(&self, c: u8) -> Option<u64> {
        self.charset()
            .iter()
            .position(|x| *x == c)
            .map(|position| position as u64)
    }
}

/// A fixed-length mask.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mask {
    tokens: Vec<MaskToken>,
}

impl Mask {
    /// Parses a mask made exclusively of two-character placeholders.
    pub fn parse(pattern: &str) -> Result<Self, MaskError> {
        if pattern.is_empty() {
            return Err(MaskError::Empty);
        }

        let mut tokens = Vec::with_capacity(pattern.len() / 2);
        let mut chars = pattern.char_indices();

        while let Some((position, c)) = chars.next() {
            if c != '?' {
                return Err(MaskError::InvalidPlaceholder {
                    placeholder: c.to_string(),
                    position,
                });
            }

            let Some((_, class)) = chars.next() else {
                return Err(MaskError::Incomplete(position));
            };

            match MaskToken::from_placeholder(class) {
                Some(token) => tokens.push(token),
                None => {
                    return Err(MaskError::InvalidPlaceholder {
                        placeholder: format!("?{class}"),
                        position,
                    })
                }
            }
        }

        Ok(Self { tokens })
    }

    /// Creates a mask from its tokens.
    pub fn from_tokens(tokens: Vec<MaskToken>) -> Self {
        Self { tokens }
    }

    /// The tokens of the mask, most significant first.
    pub fn tokens(&self) -> &[MaskToken] {
        &self.tokens
    }

    /// The length of every candidate of this mask.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The number of candidates, or `None` if it does not fit in 128 bits.
    pub fn space_size(&self) -> Option<u128> {
        self.tokens
            .iter()
            .try_fold(1u128, |size, token| size.checked_mul(token.radix() as u128))
    }

    /// The space size of [`Mask::with_length`], without building the mask.
    /// `None` on overflow, which happens within 128 tokens since every radix is at least 2.
    pub fn space_size_with_length(&self, length: usize) -> Option<u128> {
        self.tokens
            .iter()
            .cycle()
            .take(length)
            .try_fold(1u128, |size, token| size.checked_mul(token.radix() as u128))
    }

    /// Derives the mask of the given length by cycling through the tokens.
    pub fn with_length(&self, length: usize) -> Mask {
        Mask {
            tokens: self.tokens.iter().copied().cycle().take(length).collect(),
        }
    }

    /// Writes the candidate at `index` into `buf`.
    /// The index must be lower than the space size.
    #[inline]
    pub fn write_candidate(&self, mut index: u64, buf: &mut Vec<u8>) {
        buf.clear();
        buf.resize(self.tokens.len(), 0);

        // least significant token last
        for (slot, token) in buf.iter_mut().zip(&self.tokens).rev() {
            let radix = token.radix();
            *slot = token.charset()[(index % radix) as usize];
            index /= radix;
        }
    }

    /// Returns the candidate at `index`.
    pub fn index_to_candidate(&self, index: u64) -> String {
        let mut buf = Vec::new();
        self.write_candidate(index, &mut buf);

        buf.into_iter().map(char::from).collect()
    }

    /// Returns the index of a candidate, or `None` if the mask cannot produce it.
    pub fn candidate_to_index(&self, candidate: &str) -> Option<u64> {
        let bytes = candidate.as_bytes();
        if bytes.len() != self.tokens.len() {
            return None;
        }

        let mut index: u64 = 0;
        for (&c, token) in bytes.iter().zip(&self.tokens) {
            index = index
                .checked_mul(token.radix())?
                .checked_add(token.position(c)?)?;
        }

        Some(index)
    }
}

impl Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(token.placeholder())?;
        }

        Ok(())
    }
}

/// A family of fixed-length masks, enumerated length-ascending.
/// Each length owns a contiguous range of global indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskSpace {
    masks: Vec<Mask>,
    /// `offsets[i]` is the first global index of `masks[i]`,
    /// the last element is the total size.
    offsets: Vec<u64>,
}

impl MaskSpace {
    /// Creates the space of every candidate of `pattern` whose length is in
    /// `min_length..=max_length`.
    pub fn new(pattern: &Mask, min_length: usize, max_length: usize) -> Result<Self, MaskError> {
        if pattern.is_empty() {
            return Err(MaskError::Empty);
        }

        if min_length == 0 || min_length > max_length {
            return Err(MaskError::LengthRange {
                min: min_length,
                max: max_length,
            });
        }

        let mut masks = Vec::new();
        let mut offsets = vec![0];
        let mut n: u128 = 0;

        // the size at least doubles with each length, so this stops within 64 lengths
        for length in min_length..=max_length {
            n = pattern
                .space_size_with_length(length)
                .and_then(|size| n.checked_add(size))
                .ok_or(MaskError::Space(128))?;

            // make sure the search space is <= 2^64
            if n > u64::MAX as u128 {
                return Err(MaskError::Space(bits(n)));
            }

            offsets.push(n as u64);
            masks.push(pattern.with_length(length));
        }

        Ok(Self { masks, offsets })
    }

    /// Creates the space of a single fixed-length mask.
    pub fn fixed(mask: &Mask) -> Result<Self, MaskError> {
        Self::new(mask, mask.len(), mask.len())
    }

    /// The total number of candidates.
    pub fn len(&self) -> u64 {
        self.offsets[self.offsets.len() - 1]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed-length masks, shortest first.
    pub fn masks(&self) -> &[Mask] {
        &self.masks
    }

    /// The global index range owned by each fixed-length mask.
    pub fn segments(&self) -> impl Iterator<Item = (&Mask, Range<u64>)> + '_ {
        self.masks
            .iter()
            .zip(self.offsets.windows(2))
            .map(|(mask, bounds)| (mask, bounds[0]..bounds[1]))
    }

    /// The number of candidates of the given length, zero if the length is not covered.
    pub fn candidate_count(&self, length: usize) -> u64 {
        self.segments()
            .find(|(mask, _)| mask.len() == length)
            .map_or(0, |(_, range)| range.end - range.start)
    }

    /// Writes the candidate at the global `index` into `buf`.
    /// The index must be lower than `self.len()`.
    #[inline]
    pub fn write_candidate(&self, index: u64, buf: &mut Vec<u8>) {
        // the first offset is always 0, so a segment is always found
        let segment = self.offsets.partition_point(|offset| *offset <= index) - 1;
        let segment = segment.min(self.masks.len() - 1);

        self.masks[segment].write_candidate(index - self.offsets[segment], buf);
    }

    /// Returns the candidate at the global `index`.
    pub fn index_to_candidate(&self, index: u64) -> String {
        let mut buf = Vec::new();
        self.write_candidate(index, &mut buf);

        buf.into_iter().map(char::from).collect()
    }

    /// Returns the global index of a candidate.
    pub fn candidate_to_index(&self, candidate: &str) -> Option<u64> {
        self.segments()
            .find(|(mask, _)| mask.len() == candidate.len())
            .and_then(|(mask, range)| Some(range.start + mask.candidate_to_index(candidate)?))
    }
}

/// Number of bits needed to represent `n`.
fn bits(n: u128) -> u32 {
    128 - n.leading_zeros()
}
