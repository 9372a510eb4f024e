use snafu::Snafu;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Errors when fetching a patch payload.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum PayloadError {
    #[snafu(display("payload '{name}' not found"))]
    NotFound { name: String },

    #[snafu(display("cannot read payload '{name}' from {}", path.display()))]
    ReadFailed {
        name: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Supplies the external blobs a catalogue refers to by name.
pub trait PayloadSource: Sync {
    /// Returns the full contents of the payload called `name`.
    fn fetch(&self, name: &str) -> Result<Vec<u8>, PayloadError>;
}

/// Reads payloads from files relative to a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the path a name resolves to.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PayloadSource for DirectorySource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, PayloadError> {
        let path = self.path(name);

        std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PayloadError::NotFound {
                name: name.to_owned(),
            },
            _ => PayloadError::ReadFailed {
                name: name.to_owned(),
                path,
                source: e,
            },
        })
    }
}

/// Serves payloads from memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    payloads: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload, replacing any previous one with the same name.
    pub fn with(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.payloads.insert(name.into(), bytes.into());
        self
    }
}

impl PayloadSource for MemorySource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, PayloadError> {
        self.payloads
            .get(name)
            .cloned()
            .ok_or_else(|| PayloadError::NotFound {
                name: name.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source() {
        let source = MemorySource::new().with("ll78.bin", [1u8, 2, 3]);

        assert_eq!(source.fetch("ll78.bin").unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            source.fetch("ll155.bin"),
            Err(PayloadError::NotFound { name }) if name == "ll155.bin"
        ));
    }

    #[test]
    fn directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bline.bin"), [0xEAu8; 4]).unwrap();
        let source = DirectorySource::new(dir.path());

        assert_eq!(source.fetch("bline.bin").unwrap(), vec![0xEA; 4]);
        assert!(matches!(
            source.fetch("missing.bin"),
            Err(PayloadError::NotFound { .. })
        ));
    }
}
