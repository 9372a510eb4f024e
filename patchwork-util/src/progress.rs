use patchwork_image::ScrambleRange;
use patchwork_image::patch::{Detail, PatchKind, PatchRecord};
use std::path::Path;

/// Trait for receiving patching progress updates.
///
/// All methods take `&self` (not `&mut self`) so the progress reporter can be
/// shared across threads while jobs run in parallel.
pub trait PatchProgress: Send + Sync {
    /// Called once before any job runs.
    fn jobs_start(&self, _total: usize) {}

    /// Called when a job starts.
    fn job_start(&self, _job: &str, _patches: usize) {}

    /// Called when a job's input image has been read.
    fn image_read(&self, _job: &str, _path: &Path, _len: usize) {}

    /// Called after the image has been unscrambled.
    fn image_decrypted(&self, _job: &str, _range: &ScrambleRange) {}

    /// Called after each patch is applied.
    fn patch_applied(&self, _job: &str, _index: usize, _record: &PatchRecord<'_>) {}

    /// Called before a shift that reads below its destination.
    fn backward_shift(&self, _job: &str, _index: usize, _address: u32, _shift: i64) {}

    /// Called after the image has been rescrambled.
    fn image_encrypted(&self, _job: &str, _range: &ScrambleRange) {}

    /// Called when an output file has been written.
    fn artifact_saved(&self, _job: &str, _path: &Path) {}

    /// Called when a job is done.
    fn job_completed(&self, _job: &str) {}

    /// Called once after every job has finished.
    fn jobs_completed(&self, _done: usize) {}
}

/// A no-op progress implementation that discards all updates.
pub struct SilentProgress;

impl PatchProgress for SilentProgress {}

/// Describes a patch record the way the console reporter prints it.
#[must_use]
pub fn describe(record: &PatchRecord<'_>) -> String {
    match (record.kind, record.detail) {
        (PatchKind::Blob, Detail::Payload(name)) => {
            format!("insert file {} at 0x{:04X}", name, record.address)
        }
        (PatchKind::Append, Detail::Payload(name)) => format!("append file {}", name),
        (PatchKind::Fill, Detail::Value(patchwork_image::Patch::NOP)) => {
            format!("insert {} NOPs at 0x{:04X}", record.len, record.address)
        }
        (PatchKind::Fill, Detail::Value(value)) => format!(
            "fill {} bytes with 0x{:02X} at 0x{:04X}",
            record.len, value, record.address
        ),
        (PatchKind::Shift, Detail::Shift(shift)) => format!(
            "shift {} bytes by {} at 0x{:04X}",
            record.len, shift, record.address
        ),
        _ => format!("insert {} bytes at 0x{:04X}", record.len, record.address),
    }
}

/// Console progress reporter using an indicatif progress bar.
///
/// Each step is printed as a tagged line above a bar counting finished jobs.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }

    fn line(&self, tag: &str, job: &str, message: &str) {
        self.bar
            .suspend(|| println!("[ {:<7} ] {}: {}", tag, job, message));
    }
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl PatchProgress for ConsoleProgress {
    fn jobs_start(&self, total: usize) {
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {pos}/{len} images [{elapsed_precise}]")
                .unwrap()
                .progress_chars("━╸─"),
        );
        self.bar.reset();
    }

    fn image_read(&self, job: &str, path: &Path, len: usize) {
        self.line(
            "Read",
            job,
            &format!("{} ({} bytes)", path.display(), len),
        );
    }

    fn image_decrypted(&self, job: &str, range: &ScrambleRange) {
        self.line(
            "Decrypt",
            job,
            &format!("0x{:04X}-0x{:04X}", range.from(), range.to()),
        );
    }

    fn patch_applied(&self, job: &str, _index: usize, record: &PatchRecord<'_>) {
        self.line("Modify", job, &describe(record));
    }

    fn backward_shift(&self, job: &str, index: usize, address: u32, shift: i64) {
        self.line(
            "Warning",
            job,
            &format!(
                "patch #{} shifts backwards by {} at 0x{:04X}",
                index, -shift, address
            ),
        );
    }

    fn image_encrypted(&self, job: &str, range: &ScrambleRange) {
        self.line(
            "Encrypt",
            job,
            &format!("0x{:04X}-0x{:04X}", range.from(), range.to()),
        );
    }

    fn artifact_saved(&self, job: &str, path: &Path) {
        self.line("Save", job, &path.display().to_string());
    }

    fn job_completed(&self, _job: &str) {
        self.bar.inc(1);
    }

    fn jobs_completed(&self, done: usize) {
        self.bar.finish_and_clear();
        println!("Patched {} images.", done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: PatchKind, len: usize, detail: Detail<'_>) -> PatchRecord<'_> {
        PatchRecord {
            kind,
            address: 0x9A8D,
            len,
            detail,
        }
    }

    #[test]
    fn describe_records() {
        assert_eq!(
            describe(&record(PatchKind::Blob, 40, Detail::Payload("shppt.bin"))),
            "insert file shppt.bin at 0x9A8D"
        );
        assert_eq!(
            describe(&record(PatchKind::Bytes, 3, Detail::None)),
            "insert 3 bytes at 0x9A8D"
        );
        assert_eq!(
            describe(&record(PatchKind::Fill, 1, Detail::Value(0xEA))),
            "insert 1 NOPs at 0x9A8D"
        );
        assert_eq!(
            describe(&record(PatchKind::Fill, 2, Detail::Value(0))),
            "fill 2 bytes with 0x00 at 0x9A8D"
        );
        assert_eq!(
            describe(&record(PatchKind::Shift, 20, Detail::Shift(4))),
            "shift 20 bytes by 4 at 0x9A8D"
        );
        assert_eq!(
            describe(&record(PatchKind::Append, 5, Detail::Payload("extra.bin"))),
            "append file extra.bin"
        );
    }
}
