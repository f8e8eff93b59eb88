//! Encode/decode engine for the textual wire format.
//!
//! Four cooperating codecs:
//! - [`boxed`]: `{ "Type": tag, "Value": payload }` records for store entries
//! - [`object`]: user-defined types, walked member by member
//! - [`map`]: dictionary-shaped containers, keys stringified when not strings
//! - [`sequence`]: arrays whose elements carry their own tag when needed
//!
//! The engine is stateless; every function is parameterized only by the value
//! being walked and, for decoding, the [`Registry`] used to resolve tags.

pub mod boxed;
pub mod map;
pub mod object;
pub mod sequence;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cell::AnyCell;
use crate::registry::Registry;
use crate::tag::TypeTag;

/// Field holding the type tag of a box record.
pub const TYPE_FIELD: &str = "Type";
/// Field holding the payload of a box record.
pub const VALUE_FIELD: &str = "Value";
/// Reserved member name carrying the tag of objects, maps and wrapped values.
pub const TAG_FIELD: &str = "$type";
/// Payload field of a wrapped value in a dynamic position.
pub const WRAPPED_FIELD: &str = "$value";

/// Longest excerpt of offending input quoted in error messages.
const EXCERPT_LEN: usize = 64;

/// Error type for encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    MalformedRecord(String),
    #[error("unresolvable type: {0}")]
    UnresolvableType(TypeTag),
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },
    #[error("invalid cast: {found} requested as {expected}")]
    InvalidCast { expected: TypeTag, found: TypeTag },
    #[error("invalid value for {expected}: {found}")]
    InvalidValue { expected: String, found: String },
    #[error("member `{member}`: {source}")]
    Member {
        member: String,
        #[source]
        source: Box<CodecError>,
    },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Builds an `InvalidValue` error quoting an excerpt of the offending payload.
    pub fn invalid_value(expected: impl Into<String>, found: &Value) -> Self {
        let mut found = found.to_string();
        if found.len() > EXCERPT_LEN {
            let cut = (0..=EXCERPT_LEN)
                .rev()
                .find(|i| found.is_char_boundary(*i))
                .unwrap_or(0);
            found.truncate(cut);
            found.push_str("...");
        }
        CodecError::InvalidValue {
            expected: expected.into(),
            found,
        }
    }

    /// Wraps the error with the name of the member being processed.
    pub fn in_member(self, member: impl Into<String>) -> Self {
        CodecError::Member {
            member: member.into(),
            source: Box::new(self),
        }
    }

    /// True if a type tag somewhere inside failed to resolve.
    pub fn is_unresolvable(&self) -> bool {
        match self {
            CodecError::UnresolvableType(_) => true,
            CodecError::Member { source, .. } => source.is_unresolvable(),
            _ => false,
        }
    }
}

/// Reads an object carrying a `$type` field, returning the object and its tag.
pub(crate) fn read_tagged<'a>(
    wire: &'a Value,
    what: &str,
) -> Result<(&'a Map<String, Value>, &'a str), CodecError> {
    let object = wire
        .as_object()
        .ok_or_else(|| CodecError::MalformedRecord(format!("{} is not an object", what)))?;
    let tag = object
        .get(TAG_FIELD)
        .ok_or_else(|| CodecError::MalformedRecord(format!("{} has no {} field", what, TAG_FIELD)))?
        .as_str()
        .ok_or_else(|| CodecError::MalformedRecord(format!("{} of {} is not a string", TAG_FIELD, what)))?;
    Ok((object, tag))
}

/// Checks that `found` names the expected type.
///
/// A tag this process cannot resolve (a renamed or removed type) fails with
/// `UnresolvableType`, so the enclosing entry is dropped on load. A tag that
/// resolves to some other type fails with `TypeMismatch`.
pub(crate) fn check_tag(expected: &TypeTag, found: &str, registry: &Registry) -> Result<(), CodecError> {
    if expected == found {
        return Ok(());
    }
    registry.resolve(found)?;
    Err(CodecError::TypeMismatch {
        expected: expected.clone(),
        found: TypeTag::owned(found),
    })
}

/// Encodes store entries into the persisted document, preserving order.
pub fn encode_entries<'a, I>(entries: I) -> Result<Value, CodecError>
where
    I: IntoIterator<Item = (&'a str, &'a dyn AnyCell)>,
{
    let mut document = Map::new();
    for (key, cell) in entries {
        let record = boxed::encode_box(cell).map_err(|e| e.in_member(key))?;
        document.insert(key.to_string(), record);
    }
    Ok(Value::Object(document))
}

/// Decodes a persisted document into store entries.
///
/// Entries whose type (or any type nested inside them) does not resolve are
/// dropped with a warning; every other error aborts the whole decode.
pub fn decode_entries(
    wire: &Value,
    registry: &Registry,
) -> Result<IndexMap<String, Arc<dyn AnyCell>>, CodecError> {
    let mut entries = IndexMap::new();
    let document = match wire {
        Value::Null => return Ok(entries),
        Value::Object(document) => document,
        _ => {
            return Err(CodecError::MalformedRecord(
                "store document is not an object".to_string(),
            ));
        }
    };

    for (key, record) in document {
        match boxed::decode_box(record, registry) {
            Ok(cell) => {
                entries.insert(key.clone(), cell);
            }
            Err(err) if err.is_unresolvable() => {
                log::warn!("dropping entry {:?}: {}", key, err);
            }
            Err(err) => return Err(err.in_member(key.as_str())),
        }
    }
    Ok(entries)
}
