use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use crate::backing::Backing;
use crate::cell::{AnyCell, Cell, downcast_cell};
use crate::codec::{self, CodecError};
use crate::dynamic::Dynamic;
use crate::flex::Flex;
use crate::registry::Registry;
use crate::tag::TypeTag;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("invalid cast for key {key}: stored {found}, requested {expected}")]
    InvalidCast {
        key: String,
        expected: TypeTag,
        found: TypeTag,
    },
    #[error("type mismatch: key holds {expected}, got {found}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("backing error: {0}")]
    Backing(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Check if this error indicates a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::KeyNotFound(_))
    }

    /// Check if this error comes from accessing or assigning the wrong type
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidCast { .. } | StoreError::TypeMismatch { .. }
        )
    }
}

/// Construction options for a [`FlexStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Save after every successful `set`, `set_if_new` or `put_cell`.
    pub auto_save: bool,
    /// Pretty-print the persisted document.
    pub pretty: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            auto_save: true,
            pretty: true,
        }
    }
}

/// A keyed store of heterogeneous values persisted as type-tagged JSON.
///
/// Each key owns one [`Cell`]. Typed handles returned by [`FlexStore::get`]
/// share that cell, so in-place mutation through a handle is seen by the
/// store and by every other handle. Setting a key to a value of a different
/// type replaces the cell; existing handles keep the old one.
///
/// The store is not internally synchronized. Mutating methods take
/// `&mut self`; wrap the store in a `Mutex` or `RwLock` to share it.
pub struct FlexStore<B: Backing> {
    backing: B,
    registry: Arc<Registry>,
    options: StoreOptions,
    entries: IndexMap<String, Arc<dyn AnyCell>>,
}

impl<B: Backing> FlexStore<B> {
    /// Creates an empty store. Nothing is read until [`FlexStore::load`].
    pub fn new(backing: B, registry: Arc<Registry>, options: StoreOptions) -> Self {
        FlexStore {
            backing,
            registry,
            options,
            entries: IndexMap::new(),
        }
    }

    /// Gets the cell for `key` as a `Cell<T>`.
    ///
    /// Fails with `KeyNotFound` if absent and `InvalidCast` if the key holds
    /// another type.
    pub fn get<T: Flex>(&self, key: &str) -> Result<Arc<Cell<T>>, StoreError> {
        let cell = self
            .entries
            .get(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        downcast_cell::<T>(cell).ok_or_else(|| StoreError::InvalidCast {
            key: key.to_string(),
            expected: T::type_tag(),
            found: cell.type_tag(),
        })
    }

    /// Gets a copy of the value stored under `key`.
    pub fn get_value<T: Flex>(&self, key: &str) -> Result<T, StoreError> {
        self.get::<T>(key).map(|cell| cell.get())
    }

    /// Gets the cell for `key`, or a fresh cell holding `default`.
    ///
    /// The fresh cell is not inserted. A key holding another type is treated
    /// as absent.
    pub fn get_or<T: Flex>(&self, key: &str, default: T) -> Arc<Cell<T>> {
        self.get::<T>(key)
            .unwrap_or_else(move |_| Arc::new(Cell::new(default)))
    }

    /// Gets the value under `key` without its static type.
    pub fn get_dynamic(&self, key: &str) -> Result<Dynamic, StoreError> {
        self.entries
            .get(key)
            .map(|cell| cell.get_erased())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Gets the value under `key` without its static type, or `default`.
    pub fn get_dynamic_or(&self, key: &str, default: Dynamic) -> Dynamic {
        self.get_dynamic(key).unwrap_or(default)
    }

    /// Sets `key` to `value`.
    ///
    /// If the key already holds a `T`, the existing cell is updated in place
    /// and every handle sees the new value. Otherwise a new cell is stored.
    pub fn set<T: Flex>(&mut self, key: impl Into<String>, value: T) -> Result<(), StoreError> {
        let key = key.into();
        self.warn_if_unregistered::<T>(&key);

        match self.entries.get(&key).and_then(downcast_cell::<T>) {
            Some(cell) => {
                cell.replace(value);
            }
            None => {
                if let Some(previous) = self.entries.get(&key) {
                    log::debug!("key {:?} changes type from {} to {}", key, previous.type_tag(), T::type_tag());
                }
                self.entries.insert(key, Arc::new(Cell::new(value)));
            }
        }
        self.save_if_auto()
    }

    /// Sets `key` only if it is absent. Returns whether the key already existed.
    pub fn set_if_new<T: Flex>(&mut self, key: impl Into<String>, value: T) -> Result<bool, StoreError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Ok(true);
        }
        self.set(key, value)?;
        Ok(false)
    }

    /// Returns the erased cell stored under `key`.
    pub fn cell(&self, key: &str) -> Option<Arc<dyn AnyCell>> {
        self.entries.get(key).cloned()
    }

    /// Stores an erased cell under `key`.
    ///
    /// A new key takes the cell itself. An existing key keeps its cell and
    /// receives the value through [`AnyCell::set_erased`], which fails with
    /// `TypeMismatch` if the types differ.
    pub fn put_cell(&mut self, key: impl Into<String>, cell: Arc<dyn AnyCell>) -> Result<(), StoreError> {
        let key = key.into();
        match self.entries.get(&key) {
            Some(existing) if Arc::ptr_eq(existing, &cell) => {}
            Some(existing) => existing.set_erased(cell.get_erased()).map_err(|e| match e {
                CodecError::TypeMismatch { expected, found } => StoreError::TypeMismatch { expected, found },
                other => StoreError::Codec(other),
            })?,
            None => {
                self.entries.insert(key, cell);
            }
        }
        self.save_if_auto()
    }

    /// Checks whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Removes every key.
    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether mutations save immediately.
    pub fn auto_save(&self) -> bool {
        self.options.auto_save
    }

    /// Turns saving after every mutation on or off.
    pub fn set_auto_save(&mut self, auto_save: bool) {
        self.options.auto_save = auto_save;
    }

    /// Returns the current options.
    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Returns the registry used to resolve tags on load.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the backing the store saves to.
    pub fn backing(&self) -> &B {
        &self.backing
    }

    /// Serializes the whole store to text.
    pub fn to_text(&self) -> Result<String, StoreError> {
        let document = codec::encode_entries(
            self.entries
                .iter()
                .map(|(key, cell)| (key.as_str(), cell.as_ref())),
        )?;
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&document)
        } else {
            serde_json::to_string(&document)
        };
        Ok(text.map_err(CodecError::from)?)
    }

    /// Decodes text produced by [`FlexStore::to_text`] and replaces the store's
    /// contents. On error the current contents are kept.
    pub fn from_text(&mut self, text: &str) -> Result<(), StoreError> {
        let document: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(text).map_err(CodecError::from)?
        };
        self.entries = codec::decode_entries(&document, &self.registry)?;
        Ok(())
    }

    /// Writes the whole store to the backing.
    pub fn save(&self) -> Result<(), StoreError> {
        let text = self.to_text()?;
        self.backing
            .write_text(&text)
            .map_err(|e| StoreError::Backing(Box::new(e)))?;
        log::debug!("saved {} entries", self.entries.len());
        Ok(())
    }

    /// Replaces the store's contents with what the backing holds.
    ///
    /// If the backing has never been written, the store is emptied and saved
    /// immediately so that the document exists from then on.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let text = self
            .backing
            .read_text()
            .map_err(|e| StoreError::Backing(Box::new(e)))?;
        match text {
            Some(text) => {
                self.from_text(&text)?;
                log::debug!("loaded {} entries", self.entries.len());
            }
            None => {
                log::debug!("no persisted document, writing an empty one");
                self.entries.clear();
                self.save()?;
            }
        }
        Ok(())
    }

    fn save_if_auto(&self) -> Result<(), StoreError> {
        if self.options.auto_save {
            self.save()
        } else {
            Ok(())
        }
    }

    fn warn_if_unregistered<T: Flex>(&self, key: &str) {
        let tag = T::type_tag();
        if !self.registry.contains(&tag) {
            log::warn!("key {:?} holds unregistered type {}; it will be dropped on load", key, tag);
        }
    }
}

impl<B: Backing> std::fmt::Debug for FlexStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlexStore")
            .field("options", &self.options)
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
