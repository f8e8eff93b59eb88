use std::convert::Infallible;
use std::sync::{PoisonError, RwLock};

/// Where a store's text lives between runs.
///
/// Backings move whole documents and know nothing of types, boxes or the
/// codec; encoding is handled by the [`FlexStore`](crate::FlexStore).
/// Writes must be all-or-nothing: a failed write leaves the previous
/// document in place.
pub trait Backing {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads the persisted document, or `None` if nothing has been written yet.
    fn read_text(&self) -> Result<Option<String>, Self::Error>;

    /// Replaces the persisted document.
    fn write_text(&self, contents: &str) -> Result<(), Self::Error>;
}

/// An in-memory backing.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryBacking {
    text: RwLock<Option<String>>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backing that already holds a document.
    pub fn with_text(text: impl Into<String>) -> Self {
        MemoryBacking {
            text: RwLock::new(Some(text.into())),
        }
    }

    /// Returns the last document written, if any.
    pub fn text(&self) -> Option<String> {
        self.text.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Backing for MemoryBacking {
    type Error = Infallible;

    fn read_text(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.text())
    }

    fn write_text(&self, contents: &str) -> Result<(), Self::Error> {
        *self.text.write().unwrap_or_else(PoisonError::into_inner) = Some(contents.to_string());
        Ok(())
    }
}
