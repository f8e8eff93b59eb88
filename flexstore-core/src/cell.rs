use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::codec::CodecError;
use crate::dynamic::Dynamic;
use crate::flex::Flex;
use crate::tag::TypeTag;

/// A cell holds exactly one value of type `T` and remembers its tag.
///
/// Cells are shared as `Arc<Cell<T>>`: the store keeps one handle and every
/// caller of [`FlexStore::get`](crate::FlexStore::get) receives another.
/// Mutation goes through an internal lock, so a change made through any
/// handle is seen by all of them.
pub struct Cell<T: Flex> {
    value: RwLock<T>,
}

impl<T: Flex> Cell<T> {
    /// Creates a new cell containing the given value.
    pub fn new(value: T) -> Self {
        Cell {
            value: RwLock::new(value),
        }
    }

    /// Returns the tag of the stored type.
    pub fn type_tag(&self) -> TypeTag {
        T::type_tag()
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.read().clone()
    }

    /// Borrows the current value for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrows the current value for in-place mutation.
    ///
    /// The write is visible to every handle once the guard is dropped.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a new value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.write(), value)
    }

    /// Runs `f` against the value under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.write())
    }

    /// Consumes the cell and returns the contained value.
    pub fn into_value(self) -> T {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Flex + Default> Default for Cell<T> {
    fn default() -> Self {
        Cell::new(T::default())
    }
}

impl<T: Flex> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("type", &T::type_tag())
            .field("value", &*self.read())
            .finish()
    }
}

/// Type-erased view of a [`Cell`], as held by the store.
pub trait AnyCell: fmt::Debug + Send + Sync {
    /// Returns the tag of the stored type.
    fn type_tag(&self) -> TypeTag;

    /// Returns a copy of the current value without its static type.
    fn get_erased(&self) -> Dynamic;

    /// Assigns a value of the stored type.
    ///
    /// Fails with `TypeMismatch` if `value` holds any other type; the cell's
    /// type never changes through this path. A `Cell<Dynamic>` accepts any value.
    fn set_erased(&self, value: Dynamic) -> Result<(), CodecError>;

    /// Encodes the current value's payload.
    fn encode(&self) -> Result<Value, CodecError>;

    /// Converts the handle for downcasting to a concrete `Cell<T>`.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Flex> AnyCell for Cell<T> {
    fn type_tag(&self) -> TypeTag {
        T::type_tag()
    }

    fn get_erased(&self) -> Dynamic {
        Dynamic::new(self.get())
    }

    fn set_erased(&self, value: Dynamic) -> Result<(), CodecError> {
        if let Some(slot) = (&mut *self.write() as &mut dyn Any).downcast_mut::<Dynamic>() {
            *slot = value;
            return Ok(());
        }
        if !value.is::<T>() {
            return Err(CodecError::TypeMismatch {
                expected: T::type_tag(),
                found: value.type_tag(),
            });
        }
        self.replace(value.cast::<T>()?);
        Ok(())
    }

    fn encode(&self) -> Result<Value, CodecError> {
        self.read().to_wire()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Downcasts an erased handle to its concrete cell type.
pub fn downcast_cell<T: Flex>(cell: &Arc<dyn AnyCell>) -> Option<Arc<Cell<T>>> {
    Arc::clone(cell).into_any().downcast::<Cell<T>>().ok()
}
