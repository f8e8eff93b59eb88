//! Object-graph codec for user-defined types.
//!
//! Rust has no runtime field discovery, so object types describe themselves:
//! [`FlexObject::members`] lists `(name, encode, decode)` triples, normally
//! generated by `#[derive(Flex)]`. The codec walks that table.

use serde_json::{Map, Value};

use super::{CodecError, TAG_FIELD, check_tag, read_tagged};
use crate::flex::Flex;
use crate::registry::Registry;

/// One introspectable member of an object type.
pub struct Member<T> {
    /// Name used on the wire.
    pub name: &'static str,
    /// Encodes this member of the given object.
    pub encode: fn(&T) -> Result<Value, CodecError>,
    /// Decodes a payload and assigns it to this member of the given object.
    pub decode: fn(&mut T, &Value, &Registry) -> Result<(), CodecError>,
}

impl<T> Clone for Member<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Member<T> {}

impl<T> std::fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member").field("name", &self.name).finish()
    }
}

/// A type encoded member by member, tagged with its own [`TypeTag`](crate::TypeTag).
///
/// Decoding starts from `Default::default()`, so members absent from the
/// payload keep their default value.
pub trait FlexObject: Flex + Default {
    /// Returns the member table, in encoding order.
    fn members() -> Vec<Member<Self>>;
}

/// Encodes an object as `{ "$type": <tag>, <member>: <payload>, ... }`.
pub fn encode_object<T: FlexObject>(value: &T) -> Result<Value, CodecError> {
    let mut object = Map::new();
    object.insert(TAG_FIELD.to_string(), Value::String(T::type_tag().to_string()));
    for member in T::members() {
        let wire = (member.encode)(value).map_err(|e| e.in_member(member.name))?;
        object.insert(member.name.to_string(), wire);
    }
    Ok(Value::Object(object))
}

/// Decodes an object written by [`encode_object`].
///
/// The `$type` field must name `T`. Encoded members without a counterpart in
/// `T` are ignored, so readers skip fields added by newer writers.
pub fn decode_object<T: FlexObject>(wire: &Value, registry: &Registry) -> Result<T, CodecError> {
    let (object, tag) = read_tagged(wire, "object")?;
    check_tag(&T::type_tag(), tag, registry)?;

    let mut value = T::default();
    let members = T::members();
    for member in &members {
        if let Some(payload) = object.get(member.name) {
            (member.decode)(&mut value, payload, registry).map_err(|e| e.in_member(member.name))?;
        }
    }

    if log::log_enabled!(log::Level::Trace) {
        for name in object.keys() {
            if name != TAG_FIELD && !members.iter().any(|m| m.name == name) {
                log::trace!("ignoring unknown member {:?} of {}", name, tag);
            }
        }
    }
    Ok(value)
}

/// Lists member names, for registry introspection.
pub fn member_names<T: FlexObject>() -> Vec<&'static str> {
    T::members().iter().map(|m| m.name).collect()
}
