//! Sequence codec: plain JSON arrays.
//!
//! Primitive elements are written bare and tagged payloads (objects, maps) as
//! they are. Everything else is wrapped as `{ "$type": <tag>, "$value": <payload> }`
//! so that each element can be rebuilt from its own tag, which is what lets a
//! `Vec<Dynamic>` hold values of different types.

use serde_json::{Map, Value};

use super::{CodecError, TAG_FIELD, WRAPPED_FIELD, check_tag};
use crate::flex::{Flex, WireKind};
use crate::registry::Registry;
use crate::tag::TypeTag;

/// Encodes a sequence as an array, element by element.
pub fn encode_sequence<'a, T, I>(elements: I) -> Result<Value, CodecError>
where
    T: Flex,
    I: IntoIterator<Item = &'a T>,
{
    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| encode_element(element).map_err(|e| e.in_member(index.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Decodes an array, preserving element order.
pub fn decode_sequence<T: Flex>(wire: &Value, registry: &Registry) -> Result<Vec<T>, CodecError> {
    let elements = wire
        .as_array()
        .ok_or_else(|| CodecError::invalid_value(T::type_tag().as_str(), wire))?;
    elements
        .iter()
        .enumerate()
        .map(|(index, element)| decode_element(element, registry).map_err(|e| e.in_member(index.to_string())))
        .collect()
}

/// Encodes one element so it can be rebuilt from its own tag.
pub fn encode_element<T: Flex>(element: &T) -> Result<Value, CodecError> {
    let payload = element.to_wire()?;
    Ok(match T::kind() {
        WireKind::Primitive | WireKind::Tagged => payload,
        WireKind::Untagged => wrap(&T::type_tag(), payload),
    })
}

/// Decodes one element, unwrapping it first if it was wrapped on the way out.
///
/// An element without a wrapper is decoded directly as `T`.
pub fn decode_element<T: Flex>(wire: &Value, registry: &Registry) -> Result<T, CodecError> {
    if T::kind() == WireKind::Untagged {
        if let Some((tag, payload)) = unwrap(wire)? {
            check_tag(&T::type_tag(), tag, registry)?;
            return T::from_wire(payload, registry);
        }
    }
    T::from_wire(wire, registry)
}

/// Builds `{ "$type": <tag>, "$value": <payload> }`.
pub(crate) fn wrap(tag: &TypeTag, payload: Value) -> Value {
    let mut object = Map::new();
    object.insert(TAG_FIELD.to_string(), Value::String(tag.to_string()));
    object.insert(WRAPPED_FIELD.to_string(), payload);
    Value::Object(object)
}

/// Splits a wrapper into its tag and payload, or returns `None` for anything
/// that is not a wrapper.
pub(crate) fn unwrap(wire: &Value) -> Result<Option<(&str, &Value)>, CodecError> {
    let Some(object) = wire.as_object() else {
        return Ok(None);
    };
    let (Some(tag), Some(payload)) = (object.get(TAG_FIELD), object.get(WRAPPED_FIELD)) else {
        return Ok(None);
    };
    let tag = tag
        .as_str()
        .ok_or_else(|| CodecError::MalformedRecord(format!("{} of wrapped value is not a string", TAG_FIELD)))?;
    Ok(Some((tag, payload)))
}

impl<T: Flex> Flex for Vec<T> {
    fn type_tag() -> TypeTag {
        TypeTag::generic("Vec", &[T::type_tag()])
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        encode_sequence(self)
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        decode_sequence(wire, registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn primitives_are_bare() {
        assert_eq!(vec![1u8, 2, 3].to_wire().unwrap(), json!([1, 2, 3]));
        assert_eq!(vec!["a".to_string()].to_wire().unwrap(), json!(["a"]));
    }

    #[test]
    fn untagged_elements_are_wrapped() {
        let nested = vec![vec![1u8], vec![]];
        let wire = nested.to_wire().unwrap();
        assert_eq!(
            wire,
            json!([
                {"$type": "Vec<u8>", "$value": [1]},
                {"$type": "Vec<u8>", "$value": []},
            ])
        );
        assert_eq!(Vec::<Vec<u8>>::from_wire(&wire, &Registry::new()).unwrap(), nested);
    }

    #[test]
    fn options_keep_none_distinct() {
        let values = vec![Some(1u32), None, Some(3)];
        let wire = values.to_wire().unwrap();
        assert_eq!(Vec::<Option<u32>>::from_wire(&wire, &Registry::new()).unwrap(), values);
    }

    #[test]
    fn unwrapped_element_decodes_as_declared_type() {
        let wire = json!([[1, 2], [3]]);
        let decoded = Vec::<Vec<u16>>::from_wire(&wire, &Registry::new()).unwrap();
        assert_eq!(decoded, vec![vec![1, 2], vec![3]]);
    }

    #[test]
    fn wrapper_tag_must_match() {
        let wire = json!([{"$type": "Vec<i8>", "$value": [1]}]);
        let err = Vec::<Vec<u8>>::from_wire(&wire, &Registry::new().with::<Vec<i8>>()).unwrap_err();
        match err {
            CodecError::Member { member, source } => {
                assert_eq!(member, "0");
                assert!(matches!(*source, CodecError::TypeMismatch { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_wrapper_tag_is_unresolvable() {
        let wire = json!([{"$type": "Gone<u8>", "$value": [1]}]);
        let err = Vec::<Vec<u8>>::from_wire(&wire, &Registry::new()).unwrap_err();
        assert!(err.is_unresolvable());
    }

    #[test]
    fn not_an_array() {
        assert!(matches!(
            Vec::<u8>::from_wire(&json!({"a": 1}), &Registry::new()),
            Err(CodecError::InvalidValue { .. })
        ));
    }
}
