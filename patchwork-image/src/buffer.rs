use snafu::Snafu;
use std::ops::Range;

/// Errors when touching a region of an [`ImageBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[non_exhaustive]
pub enum RegionError {
    #[snafu(display(
        "region at index {index} with length {len} is outside the {image_len}-byte image"
    ))]
    OutOfRange {
        index: i64,
        len: usize,
        image_len: usize,
    },
}

type Result<T, E = RegionError> = std::result::Result<T, E>;

/// A loaded memory image with a fixed load base.
///
/// Absolute addresses map to buffer indices by subtracting the base offset.
/// Every write is bounds-checked against the whole region before the first
/// byte changes, so a failed operation leaves the buffer untouched. The
/// length only changes through [`append()`](Self::append).
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct ImageBuffer {
    data: Vec<u8>,
    base_offset: u32,
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("len", &self.data.len())
            .field("base_offset", &format_args!("0x{:04X}", self.base_offset))
            .finish_non_exhaustive()
    }
}

impl ImageBuffer {
    /// Creates a buffer whose index 0 corresponds to `base_offset`.
    pub fn new(data: Vec<u8>, base_offset: u32) -> Self {
        Self { data, base_offset }
    }

    /// Creates a buffer from a PRG file, taking the base from its load-address header.
    ///
    /// The header itself stays in the buffer, so the byte at the load address is
    /// at index 2 and the base offset is `load_address - 2`.
    pub fn from_prg(data: Vec<u8>) -> Result<Self, crate::prg::ReadError> {
        let header = crate::prg::PrgHeader::read(&data)?;
        Ok(Self::new(data, header.base_offset()))
    }

    /// Returns the address that maps to index 0.
    #[must_use]
    pub fn base_offset(&self) -> u32 {
        self.base_offset
    }

    /// Returns the current length of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the whole image.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer and returns the image bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Translates an absolute address into a buffer index.
    ///
    /// The result may be negative or past the end; range checks belong to the
    /// region operations.
    #[must_use]
    pub fn offset_of(&self, address: u32) -> i64 {
        i64::from(address) - i64::from(self.base_offset)
    }

    /// Returns `len` bytes starting at `index`.
    pub fn read_region(&self, index: i64, len: usize) -> Result<&[u8]> {
        let range = self.region(index, len)?;
        Ok(&self.data[range])
    }

    /// Overwrites `data.len()` bytes starting at `index`.
    pub fn write_region(&mut self, index: i64, data: &[u8]) -> Result<()> {
        let range = self.region(index, data.len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    /// Overwrites `count` bytes starting at `index` with `value`.
    pub fn fill_region(&mut self, index: i64, count: usize, value: u8) -> Result<()> {
        let range = self.region(index, count)?;
        self.data[range].fill(value);
        Ok(())
    }

    /// Moves `length` bytes from `index + shift` down to `index`.
    ///
    /// Bytes are copied one at a time in ascending order. With a positive shift
    /// every read happens ahead of the write cursor, so overlapping windows behave
    /// like a move. With a negative shift an overlapping window replicates the
    /// bytes already written, exactly as the ascending loop dictates.
    ///
    /// A zero-length shift touches nothing and always succeeds.
    pub fn shift_region(&mut self, index: i64, length: usize, shift: i64) -> Result<()> {
        if length == 0 {
            return Ok(());
        }

        let dst = self.region(index, length)?;
        let src_index = index.checked_add(shift).ok_or(RegionError::OutOfRange {
            index,
            len: length,
            image_len: self.data.len(),
        })?;
        let src = self.region(src_index, length)?;

        for i in 0..length {
            self.data[dst.start + i] = self.data[src.start + i];
        }

        Ok(())
    }

    /// Grows the image by `data`. Appending nothing is a no-op.
    pub fn append(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Reads `len` bytes at an absolute address.
    pub fn read(&self, address: u32, len: usize) -> Result<&[u8]> {
        self.read_region(self.offset_of(address), len)
    }

    /// Overwrites bytes at an absolute address.
    pub fn write(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.write_region(self.offset_of(address), data)
    }

    /// Fills bytes at an absolute address.
    pub fn fill(&mut self, address: u32, count: usize, value: u8) -> Result<()> {
        self.fill_region(self.offset_of(address), count, value)
    }

    /// Shifts a block at an absolute address, see [`shift_region()`](Self::shift_region).
    pub fn shift(&mut self, address: u32, length: usize, shift: i64) -> Result<()> {
        self.shift_region(self.offset_of(address), length, shift)
    }

    /// Returns the mutable bytes of the inclusive address range `from..=to`.
    pub(crate) fn span_mut(&mut self, from: u32, to: u32) -> Result<&mut [u8]> {
        let index = self.offset_of(from);
        let len = (to - from) as usize + 1;
        let range = self.region(index, len)?;
        Ok(&mut self.data[range])
    }

    fn region(&self, index: i64, len: usize) -> Result<Range<usize>> {
        let image_len = self.data.len();
        let start = usize::try_from(index).ok();
        let end = start.and_then(|s| s.checked_add(len));

        match start.zip(end) {
            Some((start, end)) if end <= image_len => Ok(start..end),
            _ => OutOfRangeSnafu {
                index,
                len,
                image_len,
            }
            .fail(),
        }
    }
}
