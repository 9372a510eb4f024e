//! Additive stream cipher with a chained running key.
//!
//! The scrambled form of a byte is its plain value plus the plain value of the
//! byte above it; the top byte of the range is keyed by the seed instead.
//! Undoing that has to start at the top and walk down, feeding each recovered
//! byte forward as the key of the one below. Redoing it walks up, so every
//! neighbour is read while it is still plain.
//!
//! The two passes are not mirror images of one another. They are only meant to
//! be used as "unscramble, edit, rescramble" over the same range and seed.

use crate::ImageBuffer;
use crate::buffer::RegionError;
use snafu::{ResultExt, Snafu, ensure};

/// Errors for the scramble passes.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CipherError {
    #[snafu(display("scramble range 0x{from:04X}..=0x{to:04X} is inverted"))]
    InvertedRange { from: u32, to: u32 },

    #[snafu(display("scramble range 0x{from:04X}..=0x{to:04X} is outside the image"))]
    OutOfRange {
        from: u32,
        to: u32,
        source: RegionError,
    },
}

/// Order in which a pass visits the bytes of a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lowest address first.
    Ascending,
    /// Highest address first.
    Descending,
}

impl Direction {
    /// Returns the slice index visited at `step` of a `len`-byte walk.
    fn position(self, step: usize, len: usize) -> usize {
        match self {
            Self::Ascending => step,
            Self::Descending => len - 1 - step,
        }
    }
}

/// Where the key for each position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFeed {
    /// The byte just produced keys the next position. The first position takes the seed.
    Output,
    /// The higher-addressed neighbour, still unmodified, keys the position.
    /// The top position takes the seed.
    UpperNeighbour,
}

/// One of the two scramble passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Decrypt,
    Encrypt,
}

impl Transform {
    #[must_use]
    pub const fn direction(self) -> Direction {
        match self {
            Self::Decrypt => Direction::Descending,
            Self::Encrypt => Direction::Ascending,
        }
    }

    #[must_use]
    pub const fn key_feed(self) -> KeyFeed {
        match self {
            Self::Decrypt => KeyFeed::Output,
            Self::Encrypt => KeyFeed::UpperNeighbour,
        }
    }

    /// Runs the pass over `bytes` in place.
    pub fn apply(self, bytes: &mut [u8], seed: u8) {
        let len = bytes.len();
        let mut key = seed;

        for step in 0..len {
            let n = self.direction().position(step, len);

            if self.key_feed() == KeyFeed::UpperNeighbour {
                key = bytes.get(n + 1).copied().unwrap_or(seed);
            }

            bytes[n] = match self {
                Self::Decrypt => bytes[n].wrapping_sub(key),
                Self::Encrypt => bytes[n].wrapping_add(key),
            };

            if self.key_feed() == KeyFeed::Output {
                key = bytes[n];
            }
        }
    }
}

/// An inclusive address range scrambled under a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleRange {
    from: u32,
    to: u32,
    seed: u8,
}

impl ScrambleRange {
    /// Creates a range covering `from..=to`.
    pub fn new(from: u32, to: u32, seed: u8) -> Result<Self, CipherError> {
        ensure!(from <= to, InvertedRangeSnafu { from, to });
        Ok(Self { from, to, seed })
    }

    #[must_use]
    pub fn from(&self) -> u32 {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> u32 {
        self.to
    }

    #[must_use]
    pub fn seed(&self) -> u8 {
        self.seed
    }

    /// Returns the number of bytes covered.
    #[must_use]
    pub fn len(&self) -> usize {
        (self.to - self.from) as usize + 1
    }

    /// A range always covers at least one byte.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    fn run(&self, image: &mut ImageBuffer, transform: Transform) -> Result<(), CipherError> {
        let (from, to) = (self.from, self.to);
        let bytes = image.span_mut(from, to).context(OutOfRangeSnafu { from, to })?;
        transform.apply(bytes, self.seed);
        Ok(())
    }
}

/// Unscrambles `range` of `image` in place.
pub fn decrypt(image: &mut ImageBuffer, range: &ScrambleRange) -> Result<(), CipherError> {
    range.run(image, Transform::Decrypt)
}

/// Scrambles `range` of `image` in place.
pub fn encrypt(image: &mut ImageBuffer, range: &ScrambleRange) -> Result<(), CipherError> {
    range.run(image, Transform::Encrypt)
}
