//! Patch catalogues.
//!
//! A catalogue is a JSON document listing one job per image: where the image
//! comes from, how it is addressed, whether it is scrambled, and the ordered
//! patches to apply. Resolving a catalogue validates every number and fetches
//! every payload, so nothing can fail for catalogue reasons once an image is
//! being modified.
//!
//! ```json
//! {
//!   "title": "Flicker-free ships",
//!   "jobs": [{
//!     "name": "gma6",
//!     "input": "gma6",
//!     "layout": "prg",
//!     "scramble": { "from": "0x6A00", "to": "0x6A00 + 0x62D6", "seed": "0x49" },
//!     "symbols": { "patch1": "0xCD1E" },
//!     "patches": [
//!       { "op": "insert_file", "address": "0x9932", "file": "shppt.bin" },
//!       { "op": "insert_bytes", "address": "0x9A8A", "bytes": ["0x20", "<patch1", ">patch1"] },
//!       { "op": "insert_nops", "address": "0x9A8D", "count": 1 }
//!     ]
//!   }]
//! }
//! ```

mod error;
mod number;

pub use self::error::CatalogueError;
pub use self::number::{ByteItem, Number, parse_literal};

use self::error::*;
use self::number::{EvalError, Symbols};
use crate::job::ArtifactKind;
use crate::payload::PayloadSource;
use patchwork_image::prg::ReadError;
use patchwork_image::{ImageBuffer, Patch, ScrambleRange};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, ensure};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

type Result<T, E = CatalogueError> = std::result::Result<T, E>;

/// Video standard of the target release, selecting a job's platform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Platform {
    Pal,
    Ntsc,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pal => "PAL",
            Self::Ntsc => "NTSC",
        })
    }
}

/// A parsed, unresolved catalogue.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalogue {
    pub title: String,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

impl Catalogue {
    /// Parses a catalogue from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context(ParseCatalogueFailedSnafu)
    }

    /// Reads and parses a catalogue file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).context(ReadCatalogueFailedSnafu { path })?;
        Self::from_json(&text)
    }

    /// Validates every job and fetches its payloads.
    pub fn resolve<S: PayloadSource + ?Sized>(
        &self,
        platform: Option<Platform>,
        source: &S,
    ) -> Result<Vec<Job>> {
        let mut names = HashSet::new();
        let mut outputs = HashSet::new();

        for spec in &self.jobs {
            let output = spec.artifact_name(ArtifactKind::Modified);
            ensure!(
                names.insert(spec.name.as_str()) && outputs.insert(output),
                DuplicateJobSnafu { job: &spec.name }
            );
        }

        self.jobs
            .iter()
            .map(|spec| spec.resolve(platform, source))
            .collect()
    }
}

/// How buffer indices map to addresses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Take the base from the PRG load-address header.
    Prg,
    /// Index 0 sits at this address.
    BaseOffset(Number),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrambleSpec {
    pub from: Number,
    /// Inclusive.
    pub to: Number,
    pub seed: ByteItem,
}

/// One patch as written in a catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchSpec {
    InsertFile {
        address: Number,
        file: String,
    },
    InsertBytes {
        address: Number,
        bytes: Vec<ByteItem>,
    },
    InsertFill {
        address: Number,
        count: Number,
        value: ByteItem,
    },
    InsertNops {
        address: Number,
        count: Number,
    },
    ShiftBlock {
        address: Number,
        length: Number,
        shift: Number,
    },
    AppendFile {
        file: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformTables {
    #[serde(default)]
    pub pal: Vec<PatchSpec>,
    #[serde(default)]
    pub ntsc: Vec<PatchSpec>,
}

impl PlatformTables {
    #[must_use]
    pub fn get(&self, platform: Platform) -> &[PatchSpec] {
        match platform {
            Platform::Pal => &self.pal,
            Platform::Ntsc => &self.ntsc,
        }
    }
}

/// One image to patch, as written in a catalogue.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    /// Input file, relative to the source directory.
    pub input: String,
    /// Stem of the output files. Defaults to the input file name.
    #[serde(default)]
    pub output: Option<String>,
    /// Artifact file name with a `{kind}` placeholder, e.g. `elite_{kind}.prg`.
    /// Defaults to `<stem>.<kind>`.
    #[serde(default)]
    pub artifacts: Option<String>,
    pub layout: Layout,
    /// Expected SHA-256 of the input, as hex.
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub scramble: Option<ScrambleSpec>,
    #[serde(default)]
    pub symbols: BTreeMap<String, Number>,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
    /// Extra patches applied after `patches` for the selected platform.
    #[serde(default)]
    pub platforms: Option<PlatformTables>,
}

impl JobSpec {
    /// Returns the stem used for output file names.
    #[must_use]
    pub fn output_stem(&self) -> &str {
        match &self.output {
            Some(output) => output,
            None => Path::new(&self.input)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&self.input),
        }
    }

    /// Returns the file name an artifact of this job is saved under.
    #[must_use]
    pub fn artifact_name(&self, kind: ArtifactKind) -> String {
        artifact_name(self.artifacts.as_deref(), self.output_stem(), kind)
    }

    /// Validates the job and fetches its payloads.
    pub fn resolve<S: PayloadSource + ?Sized>(
        &self,
        platform: Option<Platform>,
        source: &S,
    ) -> Result<Job> {
        let resolver = Resolver::new(&self.name, &self.symbols)?;

        if let Some(text) = &self.artifacts {
            ensure!(
                text.contains(KIND_PLACEHOLDER),
                InvalidArtifactNameSnafu {
                    job: &self.name,
                    text,
                }
            );
        }

        let layout = match &self.layout {
            Layout::Prg => ImageLayout::Prg,
            Layout::BaseOffset(base) => ImageLayout::BaseOffset(resolver.address(base)?),
        };

        let sha256 = self
            .sha256
            .as_deref()
            .map(|text| resolver.digest(text))
            .transpose()?;

        let scramble = self
            .scramble
            .as_ref()
            .map(|spec| resolver.scramble(spec))
            .transpose()?;

        let mut specs: Vec<&PatchSpec> = self.patches.iter().collect();

        if let Some(tables) = &self.platforms {
            let platform = platform.context(PlatformRequiredSnafu { job: &self.name })?;
            specs.extend(tables.get(platform));
        }

        let appends = specs
            .iter()
            .filter(|spec| matches!(spec, PatchSpec::AppendFile { .. }))
            .count();
        ensure!(appends <= 1, MultipleAppendsSnafu { job: &self.name });

        let patches = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| resolver.patch(index, spec, source))
            .collect::<Result<Vec<_>>>()?;

        Ok(Job {
            name: self.name.clone(),
            input: PathBuf::from(&self.input),
            output_stem: self.output_stem().to_owned(),
            artifacts: self.artifacts.clone(),
            layout,
            sha256,
            scramble,
            patches,
        })
    }
}

/// How a job's image is addressed once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Prg,
    BaseOffset(u32),
}

impl ImageLayout {
    /// Wraps loaded bytes in an [`ImageBuffer`].
    pub fn load(self, bytes: Vec<u8>) -> Result<ImageBuffer, ReadError> {
        match self {
            Self::Prg => ImageBuffer::from_prg(bytes),
            Self::BaseOffset(base) => Ok(ImageBuffer::new(bytes, base)),
        }
    }
}

/// A fully resolved job, ready to run.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub input: PathBuf,
    pub output_stem: String,
    /// Artifact name template, see [`JobSpec::artifacts`].
    pub artifacts: Option<String>,
    pub layout: ImageLayout,
    pub sha256: Option<[u8; 32]>,
    pub scramble: Option<ScrambleRange>,
    pub patches: Vec<Patch>,
}

impl Job {
    /// Returns the file name an artifact of this job is saved under.
    #[must_use]
    pub fn artifact_name(&self, kind: ArtifactKind) -> String {
        artifact_name(self.artifacts.as_deref(), &self.output_stem, kind)
    }
}

const KIND_PLACEHOLDER: &str = "{kind}";

fn artifact_name(template: Option<&str>, stem: &str, kind: ArtifactKind) -> String {
    match template {
        Some(template) => template.replace(KIND_PLACEHOLDER, kind.suffix()),
        None => format!("{}.{}", stem, kind.suffix()),
    }
}

/// Evaluates catalogue values in the context of one job.
struct Resolver<'a> {
    job: &'a str,
    symbols: Symbols,
}

impl<'a> Resolver<'a> {
    fn new(job: &'a str, raw: &BTreeMap<String, Number>) -> Result<Self> {
        let empty = Symbols::new();
        let mut symbols = Symbols::new();

        // Symbols are literals; they cannot refer to each other.
        for (name, value) in raw {
            let value = value
                .eval(&empty)
                .map_err(|e| eval_error(job, e, value.to_string()))?;
            symbols.insert(name.clone(), value);
        }

        Ok(Self { job, symbols })
    }

    fn number(&self, number: &Number) -> Result<i64> {
        number
            .eval(&self.symbols)
            .map_err(|e| eval_error(self.job, e, number.to_string()))
    }

    fn address(&self, number: &Number) -> Result<u32> {
        let value = self.number(number)?;
        u32::try_from(value).ok().context(AddressOutOfRangeSnafu {
            job: self.job,
            value,
        })
    }

    fn byte(&self, item: &ByteItem) -> Result<u8> {
        let value = item
            .eval(&self.symbols)
            .map_err(|e| eval_error(self.job, e, item.to_string()))?;
        u8::try_from(value).ok().context(ByteOutOfRangeSnafu {
            job: self.job,
            value,
        })
    }

    fn length(&self, index: usize, field: &'static str, number: &Number) -> Result<usize> {
        let value = self.number(number)?;
        usize::try_from(value).ok().context(NegativeLengthSnafu {
            job: self.job,
            index,
            field,
            value,
        })
    }

    fn digest(&self, text: &str) -> Result<[u8; 32]> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(text, &mut digest).context(InvalidDigestSnafu {
            job: self.job,
            text,
        })?;

        Ok(digest)
    }

    fn scramble(&self, spec: &ScrambleSpec) -> Result<ScrambleRange> {
        let from = self.address(&spec.from)?;
        let to = self.address(&spec.to)?;
        let seed = self.byte(&spec.seed)?;
        ScrambleRange::new(from, to, seed).context(InvalidScrambleRangeSnafu { job: self.job })
    }

    fn patch<S: PayloadSource + ?Sized>(
        &self,
        index: usize,
        spec: &PatchSpec,
        source: &S,
    ) -> Result<Patch> {
        let fetch = |file: &str| {
            source.fetch(file).context(PayloadUnavailableSnafu {
                job: self.job,
                index,
            })
        };

        let patch = match spec {
            PatchSpec::InsertFile { address, file } => Patch::InsertBlob {
                address: self.address(address)?,
                name: file.clone(),
                bytes: fetch(file)?,
            },
            PatchSpec::InsertBytes { address, bytes } => Patch::InsertBytes {
                address: self.address(address)?,
                bytes: bytes
                    .iter()
                    .map(|item| self.byte(item))
                    .collect::<Result<_>>()?,
            },
            PatchSpec::InsertFill {
                address,
                count,
                value,
            } => Patch::InsertFill {
                address: self.address(address)?,
                count: self.length(index, "count", count)?,
                value: self.byte(value)?,
            },
            PatchSpec::InsertNops { address, count } => {
                Patch::nops(self.address(address)?, self.length(index, "count", count)?)
            }
            PatchSpec::ShiftBlock {
                address,
                length,
                shift,
            } => Patch::ShiftBlock {
                address: self.address(address)?,
                length: self.length(index, "length", length)?,
                shift: self.number(shift)?,
            },
            PatchSpec::AppendFile { file } => Patch::AppendBlob {
                name: file.clone(),
                bytes: fetch(file)?,
            },
        };

        Ok(patch)
    }
}

fn eval_error(job: &str, error: EvalError, text: String) -> CatalogueError {
    match error {
        EvalError::Malformed => CatalogueError::InvalidNumber {
            job: job.to_owned(),
            text,
        },
        EvalError::UnknownSymbol(name) => CatalogueError::UnknownSymbol {
            job: job.to_owned(),
            name,
        },
    }
}
