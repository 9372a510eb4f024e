use crate::ImageBuffer;
use crate::buffer::RegionError;
use snafu::{ResultExt, Snafu, ensure};
use std::fmt;

use apply_error::*;

/// A single edit to an image.
///
/// Patches are applied in the order given. Later patches may overwrite bytes
/// written by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch {
    /// Overwrites bytes at `address` with an external payload.
    InsertBlob {
        address: u32,
        name: String,
        bytes: Vec<u8>,
    },

    /// Overwrites bytes at `address` with inline literal bytes.
    InsertBytes { address: u32, bytes: Vec<u8> },

    /// Overwrites `count` bytes at `address` with `value`.
    InsertFill { address: u32, count: usize, value: u8 },

    /// Copies `address + i + shift` into `address + i` for ascending `i` in `0..length`.
    ShiftBlock {
        address: u32,
        length: usize,
        shift: i64,
    },

    /// Attaches an external payload to the end of the image.
    AppendBlob { name: String, bytes: Vec<u8> },
}

impl Patch {
    /// The 6502 `NOP` opcode, used to blank out removed instructions.
    pub const NOP: u8 = 0xEA;

    /// Creates a fill of `count` `NOP`s.
    pub fn nops(address: u32, count: usize) -> Self {
        Self::InsertFill {
            address,
            count,
            value: Self::NOP,
        }
    }

    #[must_use]
    pub fn kind(&self) -> PatchKind {
        match self {
            Self::InsertBlob { .. } => PatchKind::Blob,
            Self::InsertBytes { .. } => PatchKind::Bytes,
            Self::InsertFill { .. } => PatchKind::Fill,
            Self::ShiftBlock { .. } => PatchKind::Shift,
            Self::AppendBlob { .. } => PatchKind::Append,
        }
    }

    /// Returns the number of bytes the patch writes.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::InsertBlob { bytes, .. }
            | Self::InsertBytes { bytes, .. }
            | Self::AppendBlob { bytes, .. } => bytes.len(),
            Self::InsertFill { count, .. } => *count,
            Self::ShiftBlock { length, .. } => *length,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the payload name for blob patches.
    #[must_use]
    pub fn payload_name(&self) -> Option<&str> {
        match self {
            Self::InsertBlob { name, .. } | Self::AppendBlob { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the target address. Appends land just past the current end of
    /// `image`, saturating at `u32::MAX`.
    #[must_use]
    pub fn address(&self, image: &ImageBuffer) -> u32 {
        match self {
            Self::InsertBlob { address, .. }
            | Self::InsertBytes { address, .. }
            | Self::InsertFill { address, .. }
            | Self::ShiftBlock { address, .. } => *address,
            Self::AppendBlob { .. } => {
                let len = u32::try_from(image.len()).unwrap_or(u32::MAX);
                image.base_offset().saturating_add(len)
            }
        }
    }

    /// Applies the patch to `image`. Either every byte is written or none is.
    pub fn apply(&self, image: &mut ImageBuffer) -> Result<(), RegionError> {
        match self {
            Self::InsertBlob { address, bytes, .. } | Self::InsertBytes { address, bytes } => {
                image.write(*address, bytes)
            }
            Self::InsertFill {
                address,
                count,
                value,
            } => image.fill(*address, *count, *value),
            Self::ShiftBlock {
                address,
                length,
                shift,
            } => image.shift(*address, *length, *shift),
            Self::AppendBlob { bytes, .. } => {
                image.append(bytes);
                Ok(())
            }
        }
    }
}

/// The kind of a [`Patch`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Blob,
    Bytes,
    Fill,
    Shift,
    Append,
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Blob => "insert blob",
            Self::Bytes => "insert bytes",
            Self::Fill => "fill",
            Self::Shift => "shift block",
            Self::Append => "append blob",
        };
        f.write_str(name)
    }
}

/// What a patch did, delivered to a [`PatchObserver`] after it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchRecord<'a> {
    pub kind: PatchKind,
    pub address: u32,
    pub len: usize,
    /// Payload name for blob patches, fill value for fills.
    pub detail: Detail<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail<'a> {
    None,
    Payload(&'a str),
    Value(u8),
    Shift(i64),
}

/// Receives a record of every applied patch.
///
/// Records are advisory. Nothing an observer does can affect the image.
pub trait PatchObserver {
    /// Called after patch `index` has been applied.
    fn patch_applied(&self, _index: usize, _record: &PatchRecord<'_>) {}

    /// Called before a shift that reads below its destination is applied.
    fn backward_shift(&self, _index: usize, _address: u32, _shift: i64) {}
}

impl PatchObserver for () {}

/// Progress of a [`Sequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Pending,
    Applying(usize),
    Done,
    Failed(usize),
}

/// Applies an ordered list of patches to an image.
///
/// Patches run strictly in list order with no reordering or overlap detection.
/// The first failure stops the run; patches before it stay applied. A sequencer
/// runs once.
#[derive(Debug)]
#[must_use]
pub struct Sequencer<'p> {
    patches: &'p [Patch],
    state: SequenceState,
}

impl<'p> Sequencer<'p> {
    pub fn new(patches: &'p [Patch]) -> Self {
        Self {
            patches,
            state: SequenceState::Pending,
        }
    }

    #[must_use]
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Applies every patch to `image`, reporting each one to `observer`.
    pub fn run<O: PatchObserver + ?Sized>(
        &mut self,
        image: &mut ImageBuffer,
        observer: &O,
    ) -> Result<(), ApplyError> {
        ensure!(self.state == SequenceState::Pending, AlreadyRunSnafu);

        for (index, patch) in self.patches.iter().enumerate() {
            self.state = SequenceState::Applying(index);

            let address = patch.address(image);
            let kind = patch.kind();

            if let Patch::ShiftBlock { shift, .. } = patch
                && *shift < 0
            {
                observer.backward_shift(index, address, *shift);
            }

            if let Err(source) = patch.apply(image) {
                self.state = SequenceState::Failed(index);
                return Err(source).context(PatchFailedSnafu {
                    index,
                    kind,
                    address,
                });
            }

            let detail = match patch {
                Patch::InsertBlob { name, .. } | Patch::AppendBlob { name, .. } => {
                    Detail::Payload(name)
                }
                Patch::InsertFill { value, .. } => Detail::Value(*value),
                Patch::ShiftBlock { shift, .. } => Detail::Shift(*shift),
                Patch::InsertBytes { .. } => Detail::None,
            };

            observer.patch_applied(
                index,
                &PatchRecord {
                    kind,
                    address,
                    len: patch.len(),
                    detail,
                },
            );
        }

        self.state = SequenceState::Done;
        Ok(())
    }
}

/// Applies `patches` to `image` in order.
pub fn apply_patches<O: PatchObserver + ?Sized>(
    image: &mut ImageBuffer,
    patches: &[Patch],
    observer: &O,
) -> Result<(), ApplyError> {
    Sequencer::new(patches).run(image, observer)
}

#[derive(Debug, Snafu)]
#[snafu(module)]
#[non_exhaustive]
pub enum ApplyError {
    #[snafu(display("patch #{index} ({kind}) at 0x{address:04X} failed"))]
    PatchFailed {
        index: usize,
        kind: PatchKind,
        address: u32,
        source: RegionError,
    },

    #[snafu(display("patch sequence has already been run"))]
    AlreadyRun,
}

impl ApplyError {
    /// Returns the index of the failing patch, if a patch failed.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::PatchFailed { index, .. } => Some(*index),
            Self::AlreadyRun => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        applied: RefCell<Vec<(usize, PatchKind, u32, usize)>>,
        backward: RefCell<Vec<(usize, u32, i64)>>,
    }

    impl PatchObserver for Recorder {
        fn patch_applied(&self, index: usize, record: &PatchRecord<'_>) {
            self.applied
                .borrow_mut()
                .push((index, record.kind, record.address, record.len));
        }

        fn backward_shift(&self, index: usize, address: u32, shift: i64) {
            self.backward.borrow_mut().push((index, address, shift));
        }
    }

    #[test]
    fn later_patch_overrides_fill() {
        let mut image = ImageBuffer::new(vec![0; 32], 0xA13D);
        let patches = [
            Patch::nops(0xA13F, 28),
            Patch::InsertBytes {
                address: 0xA140,
                bytes: vec![0x4C, 0x35],
            },
        ];

        apply_patches(&mut image, &patches, &()).unwrap();

        let bytes = image.as_bytes();
        assert_eq!(&bytes[..3], &[0, 0, Patch::NOP]);
        assert_eq!(&bytes[3..5], &[0x4C, 0x35]);
        assert!(bytes[5..30].iter().all(|&b| b == Patch::NOP));
        assert_eq!(&bytes[30..], &[0, 0]);
    }

    #[test]
    fn shift_then_overwrite() {
        // INY / LDA (V),Y / TAX in front, block shuffled down by four bytes.
        let mut image = ImageBuffer::new((0..40).collect(), 0x9FD9);
        let patches = [
            Patch::InsertBytes {
                address: 0x9FD9,
                bytes: vec![0xC8, 0xB1, 0x5B, 0xAA],
            },
            Patch::ShiftBlock {
                address: 0x9FDD,
                length: 20,
                shift: 4,
            },
            Patch::InsertBytes {
                address: 0x9FF1,
                bytes: vec![0xC8, 0xB1, 0x5B, 0xAA],
            },
            Patch::nops(0x9FF5, 2),
        ];

        apply_patches(&mut image, &patches, &()).unwrap();

        let bytes = image.as_bytes();
        assert_eq!(&bytes[..4], &[0xC8, 0xB1, 0x5B, 0xAA]);
        assert_eq!(bytes[4..24], (8..28).collect::<Vec<u8>>());
        assert_eq!(&bytes[24..28], &[0xC8, 0xB1, 0x5B, 0xAA]);
        assert_eq!(&bytes[28..30], &[Patch::NOP, Patch::NOP]);
        assert_eq!(bytes[30], 30);
    }

    #[test]
    fn failure_stops_sequence_and_keeps_earlier_patches() {
        let mut image = ImageBuffer::new(vec![0; 8], 0x1000);
        let patches = [
            Patch::nops(0x1000, 2),
            Patch::InsertBytes {
                address: 0x1006,
                bytes: vec![1, 2, 3],
            },
            Patch::nops(0x1004, 1),
        ];

        let mut sequencer = Sequencer::new(&patches);
        let err = sequencer.run(&mut image, &()).unwrap_err();

        assert_eq!(err.index(), Some(1));
        assert!(matches!(
            err,
            ApplyError::PatchFailed {
                index: 1,
                kind: PatchKind::Bytes,
                address: 0x1006,
                ..
            }
        ));
        assert_eq!(sequencer.state(), SequenceState::Failed(1));
        assert_eq!(image.as_bytes(), &[0xEA, 0xEA, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn sequencer_runs_once() {
        let mut image = ImageBuffer::new(vec![0; 4], 0);
        let patches = [Patch::nops(0, 1)];
        let mut sequencer = Sequencer::new(&patches);

        assert_eq!(sequencer.state(), SequenceState::Pending);
        sequencer.run(&mut image, &()).unwrap();
        assert_eq!(sequencer.state(), SequenceState::Done);
        assert!(matches!(
            sequencer.run(&mut image, &()),
            Err(ApplyError::AlreadyRun)
        ));
    }

    #[test]
    fn observer_sees_every_patch_in_order() {
        let mut image = ImageBuffer::new(vec![0; 8], 0xCCD8);
        let patches = [
            Patch::InsertBlob {
                address: 0xCCD8,
                name: "shppt.bin".into(),
                bytes: vec![1, 2, 3],
            },
            Patch::AppendBlob {
                name: "extra.bin".into(),
                bytes: vec![9; 5],
            },
            Patch::ShiftBlock {
                address: 0xCCDA,
                length: 2,
                shift: -1,
            },
        ];
        let recorder = Recorder::default();

        apply_patches(&mut image, &patches, &recorder).unwrap();

        assert_eq!(
            *recorder.applied.borrow(),
            vec![
                (0, PatchKind::Blob, 0xCCD8, 3),
                (1, PatchKind::Append, 0xCCE0, 5),
                (2, PatchKind::Shift, 0xCCDA, 2),
            ]
        );
        assert_eq!(*recorder.backward.borrow(), vec![(2, 0xCCDA, -1)]);
        assert_eq!(image.len(), 13);
    }

    #[test]
    fn kind_and_len() {
        let fill = Patch::nops(0x9F3D, 10);
        assert_eq!(fill.kind(), PatchKind::Fill);
        assert_eq!(fill.len(), 10);
        assert_eq!(fill.payload_name(), None);
        assert_eq!(PatchKind::Shift.to_string(), "shift block");
    }

    #[test]
    fn append_address_follows_image_end() {
        let append = Patch::AppendBlob {
            name: "extra.bin".into(),
            bytes: vec![1],
        };

        let image = ImageBuffer::new(vec![0; 4], 0xCCDE);
        assert_eq!(append.address(&image), 0xCCE2);

        let image = ImageBuffer::new(vec![0; 4], u32::MAX - 1);
        assert_eq!(append.address(&image), u32::MAX);
    }
}
