use snafu::{Snafu, ensure};
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Errors when reading a PRG header.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("PRG file is too small to hold a load address"))]
    TooSmall,

    #[snafu(display("load address 0x{load_address:04X} leaves no room for the header"))]
    LoadAddressTooLow { load_address: u16 },
}

/// The size of the PRG header on disk.
pub const HEADER_SIZE: usize = 2;

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct PrgHeaderRaw {
    load_address: U16, // 0x00
}

/// Commodore program file header.
///
/// A PRG file starts with the little-endian address its payload is loaded to.
/// The header bytes are kept in front of the payload, so index 0 of the file
/// corresponds to `load_address - 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrgHeader {
    load_address: u16,
}

impl PrgHeader {
    /// Parses the header from the start of `data`.
    pub fn read(data: &[u8]) -> Result<Self, ReadError> {
        let (raw, _) = PrgHeaderRaw::read_from_prefix(data).map_err(|_| TooSmallSnafu.build())?;
        let load_address = raw.load_address.get();

        ensure!(
            usize::from(load_address) >= HEADER_SIZE,
            LoadAddressTooLowSnafu { load_address }
        );

        Ok(Self { load_address })
    }

    /// Returns the address the first payload byte is loaded to.
    #[must_use]
    pub fn load_address(&self) -> u16 {
        self.load_address
    }

    /// Returns the address that maps to the first byte of the file.
    #[must_use]
    pub fn base_offset(&self) -> u32 {
        u32::from(self.load_address) - HEADER_SIZE as u32
    }

    /// Serializes the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let raw = PrgHeaderRaw {
            load_address: U16::new(self.load_address),
        };
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageBuffer;

    #[test]
    fn read_little_endian_load_address() {
        let header = PrgHeader::read(&[0x00, 0x6A, 0xFF]).unwrap();

        assert_eq!(header.load_address(), 0x6A00);
        assert_eq!(header.base_offset(), 0x69FE);
        assert_eq!(header.to_bytes(), [0x00, 0x6A]);
    }

    #[test]
    fn too_small() {
        assert!(matches!(PrgHeader::read(&[0x01]), Err(ReadError::TooSmall)));
        assert!(matches!(PrgHeader::read(&[]), Err(ReadError::TooSmall)));
    }

    #[test]
    fn load_address_below_header() {
        assert!(matches!(
            PrgHeader::read(&[0x01, 0x00]),
            Err(ReadError::LoadAddressTooLow { load_address: 1 })
        ));
    }

    #[test]
    fn image_from_prg_maps_load_address_past_header() {
        let image = ImageBuffer::from_prg(vec![0x00, 0x11, 0xAA, 0xBB]).unwrap();

        assert_eq!(image.base_offset(), 0x10FE);
        assert_eq!(image.read(0x1100, 2).unwrap(), &[0xAA, 0xBB]);
    }
}
