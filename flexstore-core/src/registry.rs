//! Process-wide table resolving type tags back to concrete types.
//!
//! Without runtime reflection, a tag read from the wire can only be turned
//! back into a value if its type was registered up front. Register every type
//! the program persists at top level or inside dynamic positions:
//!
//! ```
//! use flexstore_core::{Registry, Flex};
//!
//! let mut registry = Registry::with_builtins();
//! registry.register::<Vec<u32>>();
//! assert!(registry.contains(&Vec::<u32>::type_tag()));
//! ```

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::cell::{AnyCell, Cell};
use crate::codec::CodecError;
use crate::dynamic::Dynamic;
use crate::flex::{Flex, WireKind};
use crate::tag::TypeTag;

type DecodeValue = fn(&Value, &Registry) -> Result<Dynamic, CodecError>;
type DecodeCell = fn(&Value, &Registry) -> Result<Arc<dyn AnyCell>, CodecError>;

/// Everything the decoder needs to rebuild values of one registered type.
#[derive(Clone)]
pub struct Registration {
    tag: TypeTag,
    kind: WireKind,
    members: Vec<&'static str>,
    decode_value: DecodeValue,
    decode_cell: DecodeCell,
}

impl Registration {
    fn of<T: Flex>() -> Self {
        Registration {
            tag: T::type_tag(),
            kind: T::kind(),
            members: T::member_names(),
            decode_value: |wire, registry| T::from_wire(wire, registry).map(Dynamic::new),
            decode_cell: |wire, registry| {
                let cell: Arc<dyn AnyCell> = Arc::new(Cell::new(T::from_wire(wire, registry)?));
                Ok(cell)
            },
        }
    }

    pub fn tag(&self) -> &TypeTag {
        &self.tag
    }

    pub fn kind(&self) -> WireKind {
        self.kind
    }

    /// Member names of an object type; empty for everything else.
    pub fn members(&self) -> &[&'static str] {
        &self.members
    }

    /// Decodes a payload of this type into an erased value.
    pub fn decode_value(&self, wire: &Value, registry: &Registry) -> Result<Dynamic, CodecError> {
        (self.decode_value)(wire, registry)
    }

    /// Decodes a payload of this type into a fresh cell.
    pub fn decode_cell(&self, wire: &Value, registry: &Registry) -> Result<Arc<dyn AnyCell>, CodecError> {
        (self.decode_cell)(wire, registry)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("members", &self.members)
            .finish()
    }
}

/// Maps type tags to registrations.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: IndexMap<TypeTag, Registration>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every primitive, `Dynamic`, `Vec<Dynamic>` and
    /// `IndexMap<String, Dynamic>` registered.
    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        registry
            .register::<bool>()
            .register::<u8>()
            .register::<u16>()
            .register::<u32>()
            .register::<u64>()
            .register::<usize>()
            .register::<i8>()
            .register::<i16>()
            .register::<i32>()
            .register::<i64>()
            .register::<isize>()
            .register::<f32>()
            .register::<f64>()
            .register::<char>()
            .register::<String>()
            .register::<()>()
            .register::<Dynamic>()
            .register::<Vec<Dynamic>>()
            .register::<IndexMap<String, Dynamic>>();
        registry
    }

    /// Registers `T`, replacing any earlier registration with the same tag.
    pub fn register<T: Flex>(&mut self) -> &mut Self {
        let registration = Registration::of::<T>();
        if let Some(previous) = self.types.insert(registration.tag.clone(), registration) {
            log::debug!("type tag {} registered twice", previous.tag);
        }
        self
    }

    /// Builder-style variant of [`Registry::register`].
    pub fn with<T: Flex>(mut self) -> Self {
        self.register::<T>();
        self
    }

    /// Resolves a tag, failing with `UnresolvableType` if it is unknown.
    pub fn resolve(&self, tag: &str) -> Result<&Registration, CodecError> {
        self.types
            .get(tag)
            .ok_or_else(|| CodecError::UnresolvableType(TypeTag::owned(tag)))
    }

    /// Checks whether a tag is registered.
    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.types.contains_key(tag)
    }

    /// Returns the member names registered for a tag.
    pub fn members(&self, tag: &str) -> Option<&[&'static str]> {
        self.types.get(tag).map(Registration::members)
    }

    /// Iterates over registered tags in registration order.
    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.types.keys()
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtins_resolve() {
        let registry = Registry::with_builtins();
        for tag in ["bool", "u32", "i64", "f64", "String", "char", "()", "Dynamic", "Vec<Dynamic>"] {
            assert!(registry.resolve(tag).is_ok(), "{tag}");
        }
        assert!(registry.resolve("IndexMap<String, Dynamic>").is_ok());
    }

    #[test]
    fn unknown_tag() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        match registry.resolve("u8") {
            Err(CodecError::UnresolvableType(tag)) => assert_eq!(tag.as_str(), "u8"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn register_generic_instantiation() {
        let registry = Registry::new().with::<Vec<u32>>();
        let registration = registry.resolve("Vec<u32>").unwrap();
        assert_eq!(registration.kind(), WireKind::Untagged);
        let value = registration.decode_value(&json!([1, 2]), &registry).unwrap();
        assert_eq!(value.cast::<Vec<u32>>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = Registry::new();
        registry.register::<bool>().register::<bool>();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tags().count(), 1);
    }

    #[test]
    fn decode_cell_allocates_registered_type() {
        let registry = Registry::with_builtins();
        let cell = registry.resolve("u64").unwrap().decode_cell(&json!(9), &registry).unwrap();
        assert_eq!(cell.type_tag().as_str(), "u64");
        assert_eq!(cell.get_erased().cast::<u64>().unwrap(), 9);
    }

    #[test]
    fn primitives_have_no_members() {
        let registry = Registry::with_builtins();
        assert_eq!(registry.members("bool"), Some(&[][..]));
        assert_eq!(registry.members("nope"), None);
    }
}
