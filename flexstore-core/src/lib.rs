//! Flexstore is a keyed store of heterogeneous values persisted as
//! type-tagged JSON.
//!
//! Core concepts:
//! - **TypeTag**: A stable textual name for a type, recorded next to every value
//! - **Flex**: A value that can be encoded to and decoded from a JSON payload
//! - **Cell**: Shared, mutable storage for exactly one value of one type
//! - **Registry**: Resolves type tags read from the wire back to concrete types
//! - **FlexStore**: Maps string keys to cells and saves them through a backing
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use flexstore_core::{FlexStore, MemoryBacking, Registry, StoreOptions};
//!
//! let registry = Arc::new(Registry::with_builtins());
//! let mut store = FlexStore::new(MemoryBacking::new(), registry.clone(), StoreOptions::default());
//! store.load().unwrap();
//!
//! store.set("volume", 11u32).unwrap();
//! let volume = store.get::<u32>("volume").unwrap();
//! *volume.write() += 1;
//!
//! // Every save writes the whole document.
//! store.save().unwrap();
//! let mut reopened = FlexStore::new(
//!     MemoryBacking::with_text(store.backing().text().unwrap()),
//!     registry,
//!     StoreOptions::default(),
//! );
//! reopened.load().unwrap();
//! assert_eq!(reopened.get_value::<u32>("volume").unwrap(), 12);
//! ```
//!
//! # Wire format
//!
//! The document is one JSON object. Each key maps to a box record
//! `{ "Type": <tag>, "Value": <payload> }`. Object payloads carry their own
//! `"$type"` field; see [`codec`] for the other shapes.

extern crate self as flexstore_core;

mod backing;
mod cell;
pub mod codec;
mod dynamic;
mod flex;
mod registry;
mod store;
mod tag;

pub use backing::{Backing, MemoryBacking};
pub use cell::{AnyCell, Cell, downcast_cell};
pub use codec::CodecError;
pub use codec::object::{FlexObject, Member};
pub use dynamic::Dynamic;
pub use flex::{Flex, Json, WireKind};
pub use registry::{Registration, Registry};
pub use store::{FlexStore, StoreError, StoreOptions};
pub use tag::TypeTag;

#[doc(hidden)]
pub use serde_json;

#[cfg(feature = "derive")]
pub use flexstore_derive::{Flex, flexible};
