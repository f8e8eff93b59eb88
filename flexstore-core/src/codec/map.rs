//! Map codec: dictionary-shaped containers.
//!
//! A map is written as an object carrying the container's own `$type` plus one
//! property per entry. String keys are used verbatim. Any other key is encoded
//! and the JSON text of that encoding becomes the property name; on the way
//! back the name is parsed as JSON (falling back to a plain string) and decoded
//! against the key type. Key encodings that do not survive this trip are a
//! known limitation, as is a string key literally named `$type`.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use super::{CodecError, TAG_FIELD, check_tag, read_tagged};
use crate::flex::{Flex, WireKind};
use crate::registry::Registry;
use crate::tag::TypeTag;

/// Encodes map entries under the given container tag.
pub fn encode_map<'a, K, V, I>(tag: &TypeTag, entries: I) -> Result<Value, CodecError>
where
    K: Flex,
    V: Flex,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let mut object = Map::new();
    object.insert(TAG_FIELD.to_string(), Value::String(tag.to_string()));
    for (key, value) in entries {
        let name = key_to_name(key)?;
        let wire = value.to_wire().map_err(|e| e.in_member(name.as_str()))?;
        object.insert(name, wire);
    }
    Ok(Value::Object(object))
}

/// Decodes a map written by [`encode_map`] into any extendable container.
pub fn decode_map<K, V, M>(tag: &TypeTag, wire: &Value, registry: &Registry) -> Result<M, CodecError>
where
    K: Flex,
    V: Flex,
    M: Default + Extend<(K, V)>,
{
    let (object, found) = read_tagged(wire, "map")?;
    check_tag(tag, found, registry)?;

    let mut map = M::default();
    for (name, payload) in object {
        if name == TAG_FIELD {
            continue;
        }
        let key = key_from_name::<K>(name, registry).map_err(|e| e.in_member(name.as_str()))?;
        let value = V::from_wire(payload, registry).map_err(|e| e.in_member(name.as_str()))?;
        map.extend(std::iter::once((key, value)));
    }
    Ok(map)
}

fn key_to_name<K: Flex>(key: &K) -> Result<String, CodecError> {
    if let Some(name) = (key as &dyn Any).downcast_ref::<String>() {
        return Ok(name.clone());
    }
    Ok(serde_json::to_string(&key.to_wire()?)?)
}

fn key_from_name<K: Flex>(name: &str, registry: &Registry) -> Result<K, CodecError> {
    if TypeId::of::<K>() == TypeId::of::<String>() {
        return K::from_wire(&Value::String(name.to_string()), registry);
    }
    let wire = serde_json::from_str(name).unwrap_or_else(|_| Value::String(name.to_string()));
    K::from_wire(&wire, registry)
}

impl<K, V> Flex for HashMap<K, V>
where
    K: Flex + Eq + Hash,
    V: Flex,
{
    fn type_tag() -> TypeTag {
        TypeTag::generic("HashMap", &[K::type_tag(), V::type_tag()])
    }

    fn kind() -> WireKind {
        WireKind::Tagged
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        encode_map(&Self::type_tag(), self)
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        decode_map::<K, V, _>(&Self::type_tag(), wire, registry)
    }
}

impl<K, V> Flex for BTreeMap<K, V>
where
    K: Flex + Ord,
    V: Flex,
{
    fn type_tag() -> TypeTag {
        TypeTag::generic("BTreeMap", &[K::type_tag(), V::type_tag()])
    }

    fn kind() -> WireKind {
        WireKind::Tagged
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        encode_map(&Self::type_tag(), self)
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        decode_map::<K, V, _>(&Self::type_tag(), wire, registry)
    }
}

impl<K, V> Flex for IndexMap<K, V>
where
    K: Flex + Eq + Hash,
    V: Flex,
{
    fn type_tag() -> TypeTag {
        TypeTag::generic("IndexMap", &[K::type_tag(), V::type_tag()])
    }

    fn kind() -> WireKind {
        WireKind::Tagged
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        encode_map(&Self::type_tag(), self)
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        decode_map::<K, V, _>(&Self::type_tag(), wire, registry)
    }
}
