use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur while running a job.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum JobError {
    // Input errors
    #[snafu(display("job '{job}': cannot read {}: {source}", path.display()))]
    ReadInputFailed {
        job: String,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("job '{job}': invalid PRG header: {source}"))]
    ParsePrgFailed {
        job: String,
        source: patchwork_image::prg::ReadError,
    },

    #[snafu(display("job '{job}': input SHA-256 is {actual}, expected {expected}"))]
    DigestMismatch {
        job: String,
        expected: String,
        actual: String,
    },

    // Engine errors
    #[snafu(display("job '{job}': cannot decrypt: {source}"))]
    DecryptFailed {
        job: String,
        source: patchwork_image::CipherError,
    },

    #[snafu(display("job '{job}': {source}"))]
    ApplyFailed {
        job: String,
        source: patchwork_image::ApplyError,
    },

    #[snafu(display("job '{job}': cannot encrypt: {source}"))]
    EncryptFailed {
        job: String,
        source: patchwork_image::CipherError,
    },

    // Output errors
    #[snafu(display("cannot create directory {}: {source}", path.display()))]
    CreateDirectoryFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create file {}: {source}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot write to {}: {source}", path.display()))]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
