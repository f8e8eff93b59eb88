//! File-backed storage for Flexstore.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flexstore_core::{Backing, FlexStore, Registry, StoreError, StoreOptions};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file path is empty")]
    EmptyPath,
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A backing that keeps the whole document in one file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a failed save never leaves a truncated document.
#[derive(Debug, Clone)]
pub struct FileBacking {
    path: PathBuf,
}

impl FileBacking {
    /// Creates a backing for the file at `path`. The file need not exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(FileError::EmptyPath);
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> FileError {
        FileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Backing for FileBacking {
    type Error = FileError;

    fn read_text(&self) -> Result<Option<String>, Self::Error> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn write_text(&self, contents: &str) -> Result<(), Self::Error> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        file.write_all(contents.as_bytes()).map_err(|e| self.io_error(e))?;
        file.as_file().sync_all().map_err(|e| self.io_error(e))?;
        file.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        log::trace!("wrote {} bytes to {}", contents.len(), self.path.display());
        Ok(())
    }
}

/// A store persisted to a single file.
pub type FileStore = FlexStore<FileBacking>;

/// Opens the store at `path` and loads it.
///
/// A missing file is created holding an empty document.
pub fn open(
    path: impl Into<PathBuf>,
    registry: Arc<Registry>,
    options: StoreOptions,
) -> Result<FileStore, StoreError> {
    let backing = FileBacking::new(path).map_err(|e| StoreError::Backing(Box::new(e)))?;
    let mut store = FlexStore::new(backing, registry, options);
    store.load()?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::with_builtins())
    }

    #[test]
    fn read_missing() {
        let dir = TempDir::new().unwrap();
        let backing = FileBacking::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(backing.read_text().unwrap(), None);
    }

    #[test]
    fn write_read() {
        let dir = TempDir::new().unwrap();
        let backing = FileBacking::new(dir.path().join("settings.json")).unwrap();

        backing.write_text("{}").unwrap();
        backing.write_text("{\"a\": 1}").unwrap();

        assert_eq!(backing.read_text().unwrap().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(FileBacking::new(""), Err(FileError::EmptyPath)));
        assert!(matches!(
            open("", registry(), StoreOptions::default()),
            Err(StoreError::Backing(_))
        ));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let backing = FileBacking::new(dir.path().join("absent").join("settings.json")).unwrap();
        assert!(matches!(backing.write_text("{}"), Err(FileError::Io { .. })));
    }

    #[test]
    fn open_bootstraps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let store = open(&path, registry(), StoreOptions::default()).unwrap();

        assert!(store.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        {
            let mut store = open(&path, registry(), StoreOptions::default()).unwrap();
            store.set("name", "flex".to_string()).unwrap();
            store.set("retries", 3u8).unwrap();
        }

        {
            let store = open(&path, registry(), StoreOptions::default()).unwrap();
            assert_eq!(store.get_value::<String>("name").unwrap(), "flex");
            assert_eq!(store.get_value::<u8>("retries").unwrap(), 3);
        }
    }

    #[test]
    fn pretty_document_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");

        let mut store = open(&path, registry(), StoreOptions::default()).unwrap();
        store.set("good", true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"good\": {\n    \"Type\": \"bool\",\n    \"Value\": true\n  }\n}");
    }

    #[test]
    fn corrupt_file_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = open(&path, registry(), StoreOptions::default()).unwrap_err();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}
