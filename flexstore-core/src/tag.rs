use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::{Borrow, Cow};
use std::fmt;

/// A process-unique name for a runtime type.
///
/// Tags are what the wire format records next to every value so the
/// [`Registry`](crate::Registry) can resolve them back to a concrete type.
/// Derived types use `module_path!()` plus the type name; generic
/// instantiations render their arguments, e.g. `Vec<u32>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag(Cow<'static, str>);

impl TypeTag {
    /// Creates a tag from a static name.
    pub const fn new(name: &'static str) -> Self {
        TypeTag(Cow::Borrowed(name))
    }

    /// Creates a tag from an owned name (e.g. one read back from the wire).
    pub fn owned(name: impl Into<String>) -> Self {
        TypeTag(Cow::Owned(name.into()))
    }

    /// Creates the tag of a generic instantiation: `base<arg, arg>`.
    pub fn generic(base: &str, args: &[TypeTag]) -> Self {
        let args: Vec<&str> = args.iter().map(TypeTag::as_str).collect();
        TypeTag(Cow::Owned(format!("{}<{}>", base, args.join(", "))))
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TypeTag {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TypeTag {
    fn from(name: &'static str) -> Self {
        TypeTag::new(name)
    }
}

impl From<String> for TypeTag {
    fn from(name: String) -> Self {
        TypeTag::owned(name)
    }
}

impl PartialEq<str> for TypeTag {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TypeTag {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for TypeTag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TypeTag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(TypeTag::owned)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({})", self)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn borrowed_and_owned_are_equal() {
        assert_eq!(TypeTag::new("bool"), TypeTag::owned("bool".to_string()));
    }

    #[test]
    fn generic_rendering() {
        let tag = TypeTag::generic("HashMap", &[TypeTag::new("String"), TypeTag::new("u32")]);
        assert_eq!(tag.as_str(), "HashMap<String, u32>");
        assert_eq!(format!("{}", TypeTag::generic("Vec", &[tag])), "Vec<HashMap<String, u32>>");
    }

    #[test]
    fn lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(TypeTag::new("u8"), 1);
        assert_eq!(map.get("u8"), Some(&1));
    }

    #[test]
    fn serializes_as_plain_string() {
        let tag = TypeTag::new("app::Person");
        let json = serde_json::to_string(&tag).unwrap();
        assert_eq!(json, "\"app::Person\"");
        let back: TypeTag = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tag);
    }
}
