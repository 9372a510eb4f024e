use crate::payload::PayloadError;
use snafu::Snafu;
use std::path::PathBuf;

/// Errors when loading or resolving a patch catalogue.
///
/// Everything here is detected before any image is touched.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum CatalogueError {
    #[snafu(display("cannot read catalogue {}: {source}", path.display()))]
    ReadCatalogueFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot parse catalogue: {source}"))]
    ParseCatalogueFailed { source: serde_json::Error },

    #[snafu(display("job '{job}' appears more than once"))]
    DuplicateJob { job: String },

    #[snafu(display("job '{job}': cannot evaluate '{text}'"))]
    InvalidNumber { job: String, text: String },

    #[snafu(display("job '{job}': unknown symbol '{name}'"))]
    UnknownSymbol { job: String, name: String },

    #[snafu(display("job '{job}': {field} of patch #{index} is negative ({value})"))]
    NegativeLength {
        job: String,
        index: usize,
        field: &'static str,
        value: i64,
    },

    #[snafu(display("job '{job}': {value} does not fit in a byte"))]
    ByteOutOfRange { job: String, value: i64 },

    #[snafu(display("job '{job}': address {value} is out of range"))]
    AddressOutOfRange { job: String, value: i64 },

    #[snafu(display("job '{job}': invalid scramble range"))]
    InvalidScrambleRange {
        job: String,
        source: patchwork_image::CipherError,
    },

    #[snafu(display("job '{job}': only one appended file is allowed"))]
    MultipleAppends { job: String },

    #[snafu(display("job '{job}' has platform tables, but no platform was selected"))]
    PlatformRequired { job: String },

    #[snafu(display("job '{job}': '{text}' is not a SHA-256 digest: {source}"))]
    InvalidDigest {
        job: String,
        text: String,
        source: hex::FromHexError,
    },

    #[snafu(display("job '{job}': artifact name '{text}' has no {{kind}} placeholder"))]
    InvalidArtifactName { job: String, text: String },

    #[snafu(display("job '{job}': payload for patch #{index} is unavailable"))]
    PayloadUnavailable {
        job: String,
        index: usize,
        source: PayloadError,
    },
}
