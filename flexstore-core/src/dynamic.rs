use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::cell::{AnyCell, Cell};
use crate::codec::sequence::{unwrap, wrap};
use crate::codec::{CodecError, TAG_FIELD, WRAPPED_FIELD, read_tagged};
use crate::flex::{Flex, WireKind};
use crate::registry::Registry;
use crate::tag::TypeTag;

/// Object-safe view of a [`Flex`] value.
trait ErasedValue: Any + fmt::Debug + Send + Sync {
    fn tag(&self) -> TypeTag;
    fn kind(&self) -> WireKind;
    fn encode(&self) -> Result<Value, CodecError>;
    fn clone_boxed(&self) -> Box<dyn ErasedValue>;
    fn eq_erased(&self, other: &dyn ErasedValue) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn into_cell(self: Box<Self>) -> Arc<dyn AnyCell>;
}

impl<T: Flex> ErasedValue for T {
    fn tag(&self) -> TypeTag {
        T::type_tag()
    }

    fn kind(&self) -> WireKind {
        T::kind()
    }

    fn encode(&self) -> Result<Value, CodecError> {
        self.to_wire()
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn eq_erased(&self, other: &dyn ErasedValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn into_cell(self: Box<Self>) -> Arc<dyn AnyCell> {
        Arc::new(Cell::new(*self))
    }
}

/// Tags of scalars that decode back to themselves when written bare.
const NATURAL_TAGS: [&str; 5] = ["bool", "String", "i64", "f64", "()"];

/// A value whose type is only known at runtime.
///
/// This is the erased view of a store entry and the element type of
/// heterogeneous containers (`Vec<Dynamic>`, `IndexMap<String, Dynamic>`).
///
/// On the wire, tagged payloads are written as they are, JSON-native scalars
/// (`bool`, `String`, `i64`, `f64`, `()`) bare, and everything else wrapped
/// with its tag. Decoding resolves embedded tags through the [`Registry`].
pub struct Dynamic(Box<dyn ErasedValue>);

impl Dynamic {
    /// Erases the static type of `value`. A `Dynamic` is not nested.
    pub fn new<T: Flex>(value: T) -> Self {
        value.into_dynamic()
    }

    pub(crate) fn from_boxed<T: Flex>(value: Box<T>) -> Self {
        Dynamic(value)
    }

    /// Returns the tag of the held value.
    pub fn type_tag(&self) -> TypeTag {
        self.0.tag()
    }

    /// Returns true if the held value is a `T`.
    pub fn is<T: Flex>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrows the held value as `T`, if it is one.
    pub fn downcast_ref<T: Flex>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Takes the held value out as `T`, failing with `InvalidCast` otherwise.
    pub fn cast<T: Flex>(self) -> Result<T, CodecError> {
        let found = self.type_tag();
        self.0
            .into_any()
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| CodecError::InvalidCast {
                expected: T::type_tag(),
                found,
            })
    }

    /// Moves the held value into a fresh cell of its own type.
    pub fn into_cell(self) -> Arc<dyn AnyCell> {
        self.0.into_cell()
    }

    /// Decodes a scalar written without a tag into its JSON-native type.
    fn from_bare(wire: &Value) -> Result<Self, CodecError> {
        match wire {
            Value::Null => Ok(Dynamic::new(())),
            Value::Bool(b) => Ok(Dynamic::new(*b)),
            Value::String(s) => Ok(Dynamic::new(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Dynamic::new(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Dynamic::new(u))
                } else {
                    n.as_f64()
                        .map(Dynamic::new)
                        .ok_or_else(|| CodecError::invalid_value("number", wire))
                }
            }
            Value::Array(_) | Value::Object(_) => Err(CodecError::MalformedRecord(format!(
                "dynamic value has no {} field",
                TAG_FIELD
            ))),
        }
    }
}

impl Clone for Dynamic {
    fn clone(&self) -> Self {
        Dynamic(self.0.clone_boxed())
    }
}

impl PartialEq for Dynamic {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_erased(other.0.as_ref())
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dynamic<{}>({:?})", self.type_tag(), self.0)
    }
}

impl Flex for Dynamic {
    fn type_tag() -> TypeTag {
        TypeTag::new("Dynamic")
    }

    /// Dynamic values tag themselves; containers must not wrap them again.
    fn kind() -> WireKind {
        WireKind::Tagged
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        let payload = self.0.encode()?;
        let tag = self.type_tag();
        Ok(match self.0.kind() {
            WireKind::Tagged => payload,
            WireKind::Primitive if NATURAL_TAGS.contains(&tag.as_str()) => payload,
            WireKind::Primitive | WireKind::Untagged => wrap(&tag, payload),
        })
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        match wire {
            Value::Object(object) if object.contains_key(TAG_FIELD) => {}
            Value::Array(_) => return Vec::<Dynamic>::from_wire(wire, registry).map(Dynamic::new),
            _ => return Dynamic::from_bare(wire),
        }

        let (_, tag) = read_tagged(wire, "dynamic value")?;
        let registration = registry.resolve(tag)?;
        if registration.kind() == WireKind::Tagged {
            return registration.decode_value(wire, registry);
        }
        match unwrap(wire)? {
            Some((_, payload)) => registration.decode_value(payload, registry),
            None => Err(CodecError::MalformedRecord(format!(
                "wrapped {} value has no {} field",
                tag, WRAPPED_FIELD
            ))),
        }
    }

    fn into_dynamic(self) -> Dynamic {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_dynamic_is_flattened() {
        let inner = Dynamic::new(5u8);
        let outer = Dynamic::new(inner.clone());
        assert_eq!(outer.type_tag().as_str(), "u8");
        assert_eq!(outer, inner);
    }

    #[test]
    fn cast_and_downcast() {
        let value = Dynamic::new("text".to_string());
        assert!(value.is::<String>());
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("text"));
        assert!(value.downcast_ref::<u32>().is_none());
        assert!(matches!(
            value.clone().cast::<u32>(),
            Err(CodecError::InvalidCast { .. })
        ));
        assert_eq!(value.cast::<String>().unwrap(), "text");
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Dynamic::new(1u32), Dynamic::new(1u32));
        assert_ne!(Dynamic::new(1u32), Dynamic::new(1u64));
        assert_ne!(Dynamic::new(1u32), Dynamic::new(2u32));
    }

    #[test]
    fn natural_scalars_are_bare() {
        assert_eq!(Dynamic::new(true).to_wire().unwrap(), json!(true));
        assert_eq!(Dynamic::new(-3i64).to_wire().unwrap(), json!(-3));
        assert_eq!(Dynamic::new("s".to_string()).to_wire().unwrap(), json!("s"));
        assert_eq!(Dynamic::new(()).to_wire().unwrap(), Value::Null);
    }

    #[test]
    fn other_scalars_are_wrapped() {
        assert_eq!(
            Dynamic::new(10u32).to_wire().unwrap(),
            json!({"$type": "u32", "$value": 10})
        );
    }

    #[test]
    fn roundtrip_keeps_exact_type() {
        let registry = Registry::with_builtins();
        for value in [
            Dynamic::new(true),
            Dynamic::new(10u32),
            Dynamic::new(-7i64),
            Dynamic::new(2.5f64),
            Dynamic::new(1.5f32),
            Dynamic::new('c'),
            Dynamic::new("x".to_string()),
            Dynamic::new(()),
        ] {
            let wire = value.to_wire().unwrap();
            assert_eq!(Dynamic::from_wire(&wire, &registry).unwrap(), value, "{wire}");
        }
    }

    #[test]
    fn bare_array_becomes_dynamic_sequence() {
        let registry = Registry::with_builtins();
        let value = Dynamic::from_wire(&json!([1, "a"]), &registry).unwrap();
        assert_eq!(
            value.cast::<Vec<Dynamic>>().unwrap(),
            vec![Dynamic::new(1i64), Dynamic::new("a".to_string())]
        );
    }

    #[test]
    fn unknown_tag_is_unresolvable() {
        let registry = Registry::with_builtins();
        let err = Dynamic::from_wire(&json!({"$type": "gone::Thing", "a": 1}), &registry).unwrap_err();
        assert!(err.is_unresolvable());
    }

    #[test]
    fn untagged_object_is_malformed() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            Dynamic::from_wire(&json!({"a": 1}), &registry),
            Err(CodecError::MalformedRecord(_))
        ));
        assert!(matches!(
            Dynamic::from_wire(&json!({"$type": "u32"}), &registry),
            Err(CodecError::MalformedRecord(_))
        ));
    }

    #[test]
    fn into_cell_keeps_type() {
        let cell = Dynamic::new(4u16).into_cell();
        assert_eq!(cell.type_tag().as_str(), "u16");
    }
}
