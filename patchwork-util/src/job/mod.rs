mod error;

pub use self::error::JobError;

use self::error::*;
use crate::catalogue::Job;
use crate::progress::PatchProgress;
use patchwork_image::{ImageBuffer, PatchObserver, PatchRecord, Sequencer, decrypt, encrypt};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use sha2::{Digest, Sha256};
use snafu::{ResultExt, ensure};
use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The images a job hands to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Unscrambled, not yet patched.
    Decrypted,
    /// Patched, not rescrambled.
    Modified,
    /// Patched and rescrambled.
    Encrypted,
}

impl ArtifactKind {
    /// Returns the file name suffix for this artifact.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Decrypted => "decrypted",
            Self::Modified => "modified",
            Self::Encrypted => "encrypted",
        }
    }
}

/// An image produced by [`JobRunner::run_in_memory()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

/// Summary of a job written to disk.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub name: String,
    pub input_len: usize,
    pub output_len: usize,
    pub patches: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Runs resolved jobs: unscramble, patch, rescramble, save.
pub struct JobRunner<P: PatchProgress> {
    progress: P,
    overwrite: bool,
    debug_artifacts: bool,
}

impl<P: PatchProgress> JobRunner<P> {
    /// Creates a new runner.
    ///
    /// If `overwrite` is `true`, existing output files will be replaced.
    /// Otherwise, a job fails if one of its output files already exists.
    pub fn new(progress: P, overwrite: bool) -> Self {
        Self {
            progress,
            overwrite,
            debug_artifacts: true,
        }
    }

    /// Sets whether intermediate images are saved.
    ///
    /// For scrambled jobs these are the `.decrypted` and `.modified` images.
    /// A job without a scramble range always saves its `.modified` image, as
    /// that is its final output.
    pub fn debug_artifacts(mut self, enabled: bool) -> Self {
        self.debug_artifacts = enabled;
        self
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    /// Runs every job, writing outputs to `output`.
    ///
    /// Jobs patch independent images, so they run in parallel with rayon.
    pub fn run_all(
        &self,
        jobs: &[Job],
        source_dir: &Path,
        output: &Path,
    ) -> Result<Vec<JobReport>, JobError> {
        create_dir_all(output).context(CreateDirectoryFailedSnafu { path: output })?;

        self.progress.jobs_start(jobs.len());

        let reports = jobs
            .par_iter()
            .map(|job| self.run(job, source_dir, output))
            .collect::<Result<Vec<_>, _>>()?;

        self.progress.jobs_completed(reports.len());

        Ok(reports)
    }

    /// Runs a single job, reading its input from `source_dir`.
    pub fn run(&self, job: &Job, source_dir: &Path, output: &Path) -> Result<JobReport, JobError> {
        self.progress.job_start(&job.name, job.patches.len());

        let path = source_dir.join(&job.input);
        let bytes = std::fs::read(&path).context(ReadInputFailedSnafu {
            job: &job.name,
            path: &path,
        })?;

        self.progress.image_read(&job.name, &path, bytes.len());

        let input_len = bytes.len();
        let mut artifacts = Vec::new();

        let image = self.process(job, bytes, |kind, bytes| {
            let path = output.join(job.artifact_name(kind));
            self.save(&path, bytes)?;
            self.progress.artifact_saved(&job.name, &path);
            artifacts.push(path);
            Ok(())
        })?;

        Ok(JobReport {
            name: job.name.clone(),
            input_len,
            output_len: image.len(),
            patches: job.patches.len(),
            artifacts,
        })
    }

    /// Runs a job on `bytes` without touching the filesystem.
    pub fn run_in_memory(&self, job: &Job, bytes: Vec<u8>) -> Result<Vec<Artifact>, JobError> {
        self.progress.job_start(&job.name, job.patches.len());

        let mut artifacts = Vec::new();

        self.process(job, bytes, |kind, bytes| {
            artifacts.push(Artifact {
                kind,
                bytes: bytes.to_vec(),
            });
            Ok(())
        })?;

        Ok(artifacts)
    }

    fn process<F>(&self, job: &Job, bytes: Vec<u8>, mut sink: F) -> Result<ImageBuffer, JobError>
    where
        F: FnMut(ArtifactKind, &[u8]) -> Result<(), JobError>,
    {
        let name = job.name.as_str();

        if let Some(expected) = &job.sha256 {
            let actual: [u8; 32] = Sha256::digest(&bytes).into();
            ensure!(
                actual == *expected,
                DigestMismatchSnafu {
                    job: name,
                    expected: hex::encode(expected),
                    actual: hex::encode(actual),
                }
            );
        }

        let mut image = job
            .layout
            .load(bytes)
            .context(ParsePrgFailedSnafu { job: name })?;

        if let Some(range) = &job.scramble {
            decrypt(&mut image, range).context(DecryptFailedSnafu { job: name })?;
            self.progress.image_decrypted(name, range);

            if self.debug_artifacts {
                sink(ArtifactKind::Decrypted, image.as_bytes())?;
            }
        }

        let observer = JobObserver {
            job: name,
            progress: &self.progress,
        };

        Sequencer::new(&job.patches)
            .run(&mut image, &observer)
            .context(ApplyFailedSnafu { job: name })?;

        match &job.scramble {
            Some(range) => {
                if self.debug_artifacts {
                    sink(ArtifactKind::Modified, image.as_bytes())?;
                }

                encrypt(&mut image, range).context(EncryptFailedSnafu { job: name })?;
                self.progress.image_encrypted(name, range);
                sink(ArtifactKind::Encrypted, image.as_bytes())?;
            }
            None => sink(ArtifactKind::Modified, image.as_bytes())?,
        }

        self.progress.job_completed(name);

        Ok(image)
    }

    fn save(&self, path: &Path, bytes: &[u8]) -> Result<(), JobError> {
        let mut opts = OpenOptions::new();
        opts.write(true);

        if self.overwrite {
            opts.create(true).truncate(true);
        } else {
            opts.create_new(true);
        }

        let mut file = opts.open(path).context(CreateFileFailedSnafu { path })?;
        file.write_all(bytes).context(WriteFailedSnafu { path })?;

        Ok(())
    }
}

/// Forwards sequencer records to a [`PatchProgress`] under a job name.
struct JobObserver<'a, P: ?Sized> {
    job: &'a str,
    progress: &'a P,
}

impl<P: PatchProgress + ?Sized> PatchObserver for JobObserver<'_, P> {
    fn patch_applied(&self, index: usize, record: &PatchRecord<'_>) {
        self.progress.patch_applied(self.job, index, record);
    }

    fn backward_shift(&self, index: usize, address: u32, shift: i64) {
        self.progress.backward_shift(self.job, index, address, shift);
    }
}
