//! Box records: the type tag and the payload side by side.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::{CodecError, TYPE_FIELD, VALUE_FIELD};
use crate::cell::AnyCell;
use crate::registry::Registry;

/// Encodes a cell as `{ "Type": <tag>, "Value": <payload> }`.
pub fn encode_box(cell: &dyn AnyCell) -> Result<Value, CodecError> {
    let mut record = Map::new();
    record.insert(TYPE_FIELD.to_string(), Value::String(cell.type_tag().to_string()));
    record.insert(VALUE_FIELD.to_string(), cell.encode()?);
    Ok(Value::Object(record))
}

/// Decodes a box record into a freshly allocated cell of the recorded type.
///
/// Fails with `MalformedRecord` when either field is missing and with
/// `UnresolvableType` when the tag is not registered.
pub fn decode_box(wire: &Value, registry: &Registry) -> Result<Arc<dyn AnyCell>, CodecError> {
    let record = wire
        .as_object()
        .ok_or_else(|| CodecError::MalformedRecord("box record is not an object".to_string()))?;
    let tag = record
        .get(TYPE_FIELD)
        .ok_or_else(|| CodecError::MalformedRecord(format!("box record has no {} field", TYPE_FIELD)))?
        .as_str()
        .ok_or_else(|| CodecError::MalformedRecord(format!("{} field is not a string", TYPE_FIELD)))?;
    let payload = record
        .get(VALUE_FIELD)
        .ok_or_else(|| CodecError::MalformedRecord(format!("box record has no {} field", VALUE_FIELD)))?;

    registry.resolve(tag)?.decode_cell(payload, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use serde_json::json;

    #[test]
    fn encodes_tag_and_value() {
        let cell = Cell::new(10u32);
        assert_eq!(encode_box(&cell).unwrap(), json!({"Type": "u32", "Value": 10}));
    }

    #[test]
    fn decode_restores_type() {
        let registry = Registry::with_builtins();
        let cell = decode_box(&json!({"Type": "String", "Value": "hi"}), &registry).unwrap();
        assert_eq!(cell.type_tag().as_str(), "String");
        assert_eq!(cell.get_erased().cast::<String>().unwrap(), "hi");
    }

    #[test]
    fn missing_fields_are_malformed() {
        let registry = Registry::with_builtins();
        for wire in [json!({"Value": 1}), json!({"Type": "u8"}), json!({"Type": 3, "Value": 1}), json!(1)] {
            assert!(
                matches!(decode_box(&wire, &registry), Err(CodecError::MalformedRecord(_))),
                "{wire}"
            );
        }
    }

    #[test]
    fn unknown_tag_is_unresolvable() {
        let registry = Registry::with_builtins();
        let err = decode_box(&json!({"Type": "nope::Gone", "Value": {}}), &registry).unwrap_err();
        assert!(err.is_unresolvable());
    }

    #[test]
    fn payload_must_match_type() {
        let registry = Registry::with_builtins();
        assert!(matches!(
            decode_box(&json!({"Type": "bool", "Value": "yes"}), &registry),
            Err(CodecError::InvalidValue { .. })
        ));
    }
}
