//! A library for patching binary memory images.
//!
//! An image is a dump of machine code addressed by absolute load address.
//! This crate maps those addresses onto an owned byte buffer and applies an
//! ordered list of byte-level edits to it. Images stored under the additive
//! running-key scramble can be unscrambled before editing and rescrambled
//! afterwards.
//!
//! # Features
//!
//! - Bounds-checked writes, fills and block shifts at absolute addresses
//! - Ordered patch sequencing with last-write-wins overlap
//! - Additive chained stream cipher (descending decrypt, ascending encrypt)
//! - PRG load-address headers
//!
//! No instruction is ever decoded. Patches are raw bytes whose lengths the
//! caller knows.
//!
//! # Example
//!
//! ```
//! use patchwork_image::{ImageBuffer, Patch, ScrambleRange, apply_patches, decrypt, encrypt};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut image = ImageBuffer::new(vec![0x10, 0x20, 0x30, 0x40], 0x6A00);
//! let range = ScrambleRange::new(0x6A00, 0x6A03, 0x05)?;
//!
//! decrypt(&mut image, &range)?;
//! assert_eq!(image.as_bytes(), &[0xE5, 0x2B, 0xF5, 0x3B]);
//!
//! let patches = [Patch::nops(0x6A01, 2)];
//! apply_patches(&mut image, &patches, &())?;
//!
//! encrypt(&mut image, &range)?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod cipher;
pub mod patch;
pub mod prg;

pub use self::buffer::{ImageBuffer, RegionError};
pub use self::cipher::{CipherError, ScrambleRange, Transform, decrypt, encrypt};
pub use self::patch::{
    ApplyError, Patch, PatchKind, PatchObserver, PatchRecord, Sequencer, apply_patches,
};
pub use self::prg::PrgHeader;
