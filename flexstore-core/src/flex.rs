use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt::Debug;

use crate::codec::CodecError;
use crate::codec::sequence::{unwrap, wrap};
use crate::dynamic::Dynamic;
use crate::registry::Registry;
use crate::tag::TypeTag;

/// How a type's payload identifies itself on the wire.
///
/// Sequence elements and dynamic values must be decodable without a declared
/// type, so anything that does not carry its own `$type` gets wrapped there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// A bare JSON scalar (`true`, `42`, `"text"`, `null`), including unit-only
    /// enums written as their variant name.
    Primitive,
    /// An object carrying its own `$type` field (objects and maps).
    Tagged,
    /// Anything else (sequences, options, opaque serde values).
    Untagged,
}

/// A value that can live in a [`FlexStore`](crate::FlexStore).
///
/// To be flex, a value must:
/// - Name its own type with a [`TypeTag`] that the [`Registry`] can resolve
/// - Encode itself to a JSON payload
/// - Decode itself from that payload, given the registry for nested dynamic values
///
/// User-defined structs get an implementation from `#[derive(Flex)]`, which
/// walks their members through the object codec.
pub trait Flex: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Returns the identifier recorded next to values of this type.
    fn type_tag() -> TypeTag;

    /// Returns how the payload identifies itself.
    fn kind() -> WireKind {
        WireKind::Untagged
    }

    /// Names of the introspectable members, for object types.
    fn member_names() -> Vec<&'static str> {
        Vec::new()
    }

    /// Encodes the value's payload.
    fn to_wire(&self) -> Result<Value, CodecError>;

    /// Decodes a payload produced by [`Flex::to_wire`].
    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError>;

    /// Erases the static type.
    #[doc(hidden)]
    fn into_dynamic(self) -> Dynamic {
        Dynamic::from_boxed(Box::new(self))
    }
}

impl Flex for bool {
    fn type_tag() -> TypeTag {
        TypeTag::new("bool")
    }

    fn kind() -> WireKind {
        WireKind::Primitive
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }

    fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
        wire.as_bool()
            .ok_or_else(|| CodecError::invalid_value("bool", wire))
    }
}

impl Flex for String {
    fn type_tag() -> TypeTag {
        TypeTag::new("String")
    }

    fn kind() -> WireKind {
        WireKind::Primitive
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }

    fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
        wire.as_str()
            .map(str::to_owned)
            .ok_or_else(|| CodecError::invalid_value("String", wire))
    }
}

impl Flex for char {
    fn type_tag() -> TypeTag {
        TypeTag::new("char")
    }

    fn kind() -> WireKind {
        WireKind::Primitive
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.to_string()))
    }

    fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
        let mut chars = wire.as_str().unwrap_or_default().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(CodecError::invalid_value("char", wire)),
        }
    }
}

impl Flex for () {
    fn type_tag() -> TypeTag {
        TypeTag::new("()")
    }

    fn kind() -> WireKind {
        WireKind::Primitive
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        Ok(Value::Null)
    }

    fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
        if wire.is_null() {
            Ok(())
        } else {
            Err(CodecError::invalid_value("()", wire))
        }
    }
}

macro_rules! impl_flex_int {
    ($t:ty, $name:literal) => {
        impl Flex for $t {
            fn type_tag() -> TypeTag {
                TypeTag::new($name)
            }

            fn kind() -> WireKind {
                WireKind::Primitive
            }

            fn to_wire(&self) -> Result<Value, CodecError> {
                Ok(Value::from(*self))
            }

            fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
                let converted = if let Some(n) = wire.as_i64() {
                    <$t>::try_from(n).ok()
                } else if let Some(n) = wire.as_u64() {
                    <$t>::try_from(n).ok()
                } else {
                    None
                };
                converted.ok_or_else(|| CodecError::invalid_value($name, wire))
            }
        }
    };
}

impl_flex_int!(u8, "u8");
impl_flex_int!(u16, "u16");
impl_flex_int!(u32, "u32");
impl_flex_int!(u64, "u64");
impl_flex_int!(usize, "usize");
impl_flex_int!(i8, "i8");
impl_flex_int!(i16, "i16");
impl_flex_int!(i32, "i32");
impl_flex_int!(i64, "i64");
impl_flex_int!(isize, "isize");

macro_rules! impl_flex_float {
    ($t:ty, $name:literal) => {
        impl Flex for $t {
            fn type_tag() -> TypeTag {
                TypeTag::new($name)
            }

            fn kind() -> WireKind {
                WireKind::Primitive
            }

            fn to_wire(&self) -> Result<Value, CodecError> {
                Number::from_f64(f64::from(*self))
                    .map(Value::Number)
                    .ok_or_else(|| CodecError::InvalidValue {
                        expected: $name.to_string(),
                        found: self.to_string(),
                    })
            }

            fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
                wire.as_f64()
                    .map(|n| n as $t)
                    .ok_or_else(|| CodecError::invalid_value($name, wire))
            }
        }
    };
}

impl_flex_float!(f32, "f32");
impl_flex_float!(f64, "f64");

/// `None` is `null` and `Some` is the inner payload. An inner payload that is
/// itself `null` (`Some(())`, `Some(None)`) is wrapped with the inner tag so it
/// stays distinct from `None`.
impl<T: Flex> Flex for Option<T> {
    fn type_tag() -> TypeTag {
        TypeTag::generic("Option", &[T::type_tag()])
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        match self {
            Some(value) => {
                let payload = value.to_wire()?;
                if payload.is_null() {
                    Ok(wrap(&T::type_tag(), payload))
                } else {
                    Ok(payload)
                }
            }
            None => Ok(Value::Null),
        }
    }

    fn from_wire(wire: &Value, registry: &Registry) -> Result<Self, CodecError> {
        if wire.is_null() {
            return Ok(None);
        }
        if let Ok(Some((tag, payload))) = unwrap(wire) {
            if payload.is_null() && T::type_tag() == tag {
                return T::from_wire(payload, registry).map(Some);
            }
        }
        T::from_wire(wire, registry).map(Some)
    }
}

/// Adapter storing any serde type without deriving `Flex`.
///
/// The payload is whatever `serde_json` produces for the inner value. The tag
/// comes from [`std::any::type_name`], which is only stable within one build
/// of the program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwraps the adapted value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Flex for Json<T>
where
    T: Serialize + DeserializeOwned + Debug + Clone + PartialEq + Send + Sync + 'static,
{
    fn type_tag() -> TypeTag {
        TypeTag::generic("Json", &[TypeTag::new(std::any::type_name::<T>())])
    }

    fn to_wire(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(&self.0)?)
    }

    fn from_wire(wire: &Value, _registry: &Registry) -> Result<Self, CodecError> {
        Ok(Json(T::deserialize(wire)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::new()
    }

    #[test]
    fn integers_range_checked() {
        let r = registry();
        assert_eq!(u8::from_wire(&json!(255), &r).unwrap(), 255);
        assert!(u8::from_wire(&json!(256), &r).is_err());
        assert!(u32::from_wire(&json!(-1), &r).is_err());
        assert_eq!(i64::from_wire(&json!(-5), &r).unwrap(), -5);
        assert_eq!(u64::from_wire(&json!(u64::MAX), &r).unwrap(), u64::MAX);
        assert!(i32::from_wire(&json!("12"), &r).is_err());
    }

    #[test]
    fn floats() {
        let r = registry();
        assert_eq!(f64::from_wire(&2.5f64.to_wire().unwrap(), &r).unwrap(), 2.5);
        assert_eq!(f32::from_wire(&0.1f32.to_wire().unwrap(), &r).unwrap(), 0.1f32);
        assert!(f64::NAN.to_wire().is_err());
        // integers are accepted where a float is declared
        assert_eq!(f64::from_wire(&json!(3), &r).unwrap(), 3.0);
    }

    #[test]
    fn char_requires_single_character() {
        let r = registry();
        assert_eq!(char::from_wire(&json!("x"), &r).unwrap(), 'x');
        assert!(char::from_wire(&json!("xy"), &r).is_err());
        assert!(char::from_wire(&json!(""), &r).is_err());
    }

    #[test]
    fn option_uses_null() {
        let r = registry();
        assert_eq!(None::<u32>.to_wire().unwrap(), Value::Null);
        assert_eq!(Option::<u32>::from_wire(&json!(7), &r).unwrap(), Some(7));
        assert_eq!(Option::<u32>::from_wire(&Value::Null, &r).unwrap(), None);
        assert_eq!(Option::<u32>::type_tag().as_str(), "Option<u32>");
    }

    #[test]
    fn option_keeps_some_around_null_payloads() {
        let r = registry();
        assert_eq!(Some(3u8).to_wire().unwrap(), json!(3));
        assert_eq!(None::<u8>.to_wire().unwrap(), Value::Null);

        let unit = Some(());
        let wire = unit.to_wire().unwrap();
        assert_eq!(wire, json!({"$type": "()", "$value": null}));
        assert_eq!(Option::<()>::from_wire(&wire, &r).unwrap(), unit);

        for value in [None, Some(None), Some(Some(7u8))] {
            let wire = value.to_wire().unwrap();
            assert_eq!(Option::<Option<u8>>::from_wire(&wire, &r).unwrap(), value, "{wire}");
        }
    }

    #[test]
    fn json_adapter() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Window {
            width: u32,
            title: String,
        }

        let value = Json(Window {
            width: 640,
            title: "main".to_string(),
        });
        let wire = value.to_wire().unwrap();
        assert_eq!(wire, json!({"width": 640, "title": "main"}));
        assert_eq!(Json::<Window>::from_wire(&wire, &registry()).unwrap(), value);
        assert!(Json::<Window>::type_tag().as_str().starts_with("Json<"));
    }
}
