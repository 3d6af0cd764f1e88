//! The generic decoded form.
//!
//! [`Value`] is what an item decodes to when the destination imposes no
//! type: integers ride the wide [`Integer`] carrier, maps preserve
//! insertion order, and tags stay structural (`Value::Tag`) so a decoded
//! value re-encodes to the canonical form of the original bytes. Semantic
//! tag interpretation lives in [`crate::tags`] and on [`Tag::decode`].

use std::collections::HashSet;

use crate::decode::{self, Error, FromCbor};
use crate::encode::{self, Encoder, ToCbor, emit_sorted_map};
use crate::head;
use crate::integer::Integer;
use crate::{MAX_DEPTH, wellformed};

/// A simple value (major type 7) other than the named ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Simple(pub u8);

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(Integer),
    Float(f64),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Tag(u64, Box<Value>),
    Simple(Simple),
    Bool(bool),
    Null,
    Undefined,
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bytes(_) => "byte string",
            Value::Text(_) => "text string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Tag(..) => "tag",
            Value::Simple(_) => "simple value",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Undefined => "undefined",
        }
    }
}

/// Decoding choices for destinations that impose no type.
///
/// The defaults mirror the conservative profile: map keys must be text and
/// integers must fit a signed 64-bit value. Decoding through `Value`'s own
/// [`FromCbor`] impl uses the permissive profile instead, since the host
/// model carries any-keyed maps and wide integers natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Accept any well-formed map key, not just text strings.
    pub use_any_key: bool,
    /// Accept integers outside the `i64` range.
    pub use_integer: bool,
}

impl DecodeOptions {
    pub(crate) const PERMISSIVE: DecodeOptions = DecodeOptions {
        use_any_key: true,
        use_integer: true,
    };
}

/// Strict whole-input decode into a [`Value`] under `options`.
///
/// Type mismatches against the options are deferred: decoding continues so
/// the whole input is checked, and the first mismatch is returned once the
/// top-level item completes.
pub fn from_slice_with(data: &[u8], options: DecodeOptions) -> Result<Value, Error> {
    wellformed::validate(data)?;
    let mut deferred = None;
    let (v, _, _) = decode_value(data, options, MAX_DEPTH, false, &mut deferred)?;
    match deferred {
        Some(e) => Err(e),
        None => Ok(v),
    }
}

pub(crate) fn decode_value(
    data: &[u8],
    options: DecodeOptions,
    depth: usize,
    as_key: bool,
    deferred: &mut Option<Error>,
) -> Result<(Value, bool, usize), Error> {
    if depth == 0 {
        return Err(Error::MaxRecursion);
    }
    decode::parse_value(data, |item, shortest, item_tags| {
        use decode::Item as I;

        if as_key && matches!(item, I::Map(_)) {
            return Err(Error::UnexpectedMapKey(0));
        }
        if as_key && !options.use_any_key && !matches!(item, I::Text { .. }) {
            defer(
                deferred,
                Error::type_mismatch(item.kind(), "text string key", 0),
            );
        }

        let mut v = match item {
            I::Integer(i) => {
                if !options.use_integer && i.int64().is_err() {
                    defer(
                        deferred,
                        Error::type_mismatch(
                            if i.sign { "negative integer" } else { "unsigned integer" },
                            "i64",
                            0,
                        ),
                    );
                }
                Value::Integer(i)
            }
            I::Bytes { data: b, .. } => Value::Bytes(b.to_vec()),
            I::Text { data: s, .. } => Value::Text(s.to_string()),
            I::Array(a) => {
                let mut items = Vec::with_capacity(a.len().unwrap_or(0).min(1024));
                while let Some(bytes) = a.element_bytes()? {
                    let (item, _, _) = decode_value(bytes, options, depth - 1, false, deferred)?;
                    items.push(item);
                }
                Value::Array(items)
            }
            I::Map(m) => {
                let mut pairs = Vec::with_capacity(m.len().unwrap_or(0).min(1024));
                let mut seen = HashSet::new();
                while let Some(key_bytes) = m.element_bytes()? {
                    let (key, _, _) = decode_value(key_bytes, options, depth - 1, true, deferred)?;
                    let value_bytes = m
                        .element_bytes()?
                        .ok_or(Error::UnexpectedEnd(data.len()))?;
                    let (value, _, _) =
                        decode_value(value_bytes, options, depth - 1, false, deferred)?;
                    // Two encodings of the same key are still the same key:
                    // compare canonical re-encodings, not raw bytes.
                    let canonical = encode::emit(&key).map_err(|e| Error::semantic(e.to_string()))?;
                    if !seen.insert(canonical) {
                        defer(deferred, Error::semantic("duplicate map key"));
                    }
                    pairs.push((key, value));
                }
                Value::Map(pairs)
            }
            I::Bool(b) => Value::Bool(b),
            I::Null => Value::Null,
            I::Undefined => Value::Undefined,
            I::Simple(n) => Value::Simple(Simple(n)),
            I::Float(f) => Value::Float(f),
        };
        for tag in item_tags.iter().rev() {
            v = Value::Tag(*tag, Box::new(v));
        }
        Ok((v, shortest))
    })
    .map(|((v, s), len)| (v, s, len))
}

fn defer(slot: &mut Option<Error>, err: Error) {
    if slot.is_none() {
        *slot = Some(err);
    }
}

impl FromCbor for Value {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let mut deferred = None;
        let r = decode_value(data, DecodeOptions::PERMISSIVE, MAX_DEPTH, false, &mut deferred)?;
        match deferred {
            Some(e) => Err(e),
            None => Ok(r),
        }
    }
}

impl ToCbor for Value {
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Value::Integer(i) => i.to_cbor(encoder),
            Value::Float(f) => encoder.push_float(*f),
            Value::Bytes(b) => {
                encoder.emit_uint_minor(2, b.len() as u64);
                encoder.emit_raw(b);
            }
            Value::Text(s) => s.as_str().to_cbor(encoder),
            Value::Array(items) => encoder.emit_array(Some(items.len()), |a| {
                for item in items {
                    a.emit(item);
                }
            }),
            Value::Map(pairs) => {
                emit_sorted_map(encoder, pairs.iter().map(|(k, v)| (k, v)));
            }
            Value::Tag(n, content) => {
                encoder.emit_uint_minor(6, *n);
                encoder.emit(content.as_ref());
            }
            Value::Simple(s) => encoder.emit_simple(s.0),
            Value::Bool(b) => b.to_cbor(encoder),
            Value::Null => encoder.emit_raw(&[0xF6]),
            Value::Undefined => encoder.emit_raw(&[0xF7]),
        }
    }

    fn is_empty_value(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }
}

impl FromCbor for Simple {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        decode::parse_value(data, |item, shortest, tags| {
            if !tags.is_empty() {
                return Err(Error::type_mismatch("tag", "Simple", 0));
            }
            match item {
                decode::Item::Simple(n) => Ok((Simple(n), shortest)),
                item => Err(Error::type_mismatch(item.kind(), "Simple", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for Simple {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_simple(self.0);
    }
}

/// A raw encoded data item. Decoding borrows nothing: the item's bytes are
/// copied out, so the message can outlive its source buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage(pub Vec<u8>);

impl FromCbor for RawMessage {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let b = decode::item_bytes(data)?;
        Ok((RawMessage(b.to_vec()), true, b.len()))
    }
}

impl ToCbor for RawMessage {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_raw(&self.0);
    }

    fn is_empty_value(&self) -> bool {
        self.0.is_empty()
    }
}

/// A tag number applied to its decoded content.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub number: u64,
    pub content: Value,
}

impl FromCbor for Tag {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let (v, s, len) = Value::from_cbor(data)?;
        match v {
            Value::Tag(number, content) => Ok((
                Tag {
                    number,
                    content: *content,
                },
                s,
                len,
            )),
            other => Err(Error::type_mismatch(other.kind(), "Tag", 0)),
        }
    }
}

impl ToCbor for Tag {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, self.number);
        encoder.emit(&self.content);
    }
}

/// A tag number applied to its still-encoded content, for callers that want
/// to defer or skip interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag {
    pub number: u64,
    pub content: RawMessage,
}

impl FromCbor for RawTag {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let ib = *data.first().ok_or(Error::UnexpectedEnd(0))?;
        if ib >> 5 != 6 {
            return Err(Error::type_mismatch("non-tag value", "RawTag", 0));
        }
        let mut off = 1;
        let (number, s) = head::uint_argument(ib & 0x1F, data, &mut off)?;
        let content = decode::item_bytes(&data[off..])?;
        let len = off + content.len();
        Ok((
            RawTag {
                number,
                content: RawMessage(content.to_vec()),
            },
            s,
            len,
        ))
    }
}

impl ToCbor for RawTag {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, self.number);
        encoder.emit_raw(&self.content.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::from_slice;
    use hex_literal::hex;

    #[test]
    fn maps_preserve_insertion_order() {
        let v: Value = from_slice(&hex!("a2616201616101")).unwrap();
        let Value::Map(pairs) = v else { panic!("not a map") };
        assert_eq!(pairs[0].0, Value::Text("b".into()));
        assert_eq!(pairs[1].0, Value::Text("a".into()));
    }

    #[test]
    fn duplicate_keys_are_rejected_across_encodings() {
        // {1: 2, 1: 3} with the second key in a non-preferred width.
        assert!(matches!(
            from_slice::<Value>(&hex!("a20102180103")),
            Err(Error::Semantic(_))
        ));
    }

    #[test]
    fn map_keys_may_not_be_maps() {
        assert!(matches!(
            from_slice::<Value>(&hex!("a1a1010202")),
            Err(Error::UnexpectedMapKey(_))
        ));
    }

    #[test]
    fn conservative_options_constrain_keys_and_integers() {
        let opts = DecodeOptions::default();
        assert!(from_slice_with(&hex!("a1616101"), opts).is_ok());
        assert!(from_slice_with(&hex!("a10102"), opts).unwrap_err().is_type_mismatch());
        assert!(from_slice_with(&hex!("1bffffffffffffffff"), opts)
            .unwrap_err()
            .is_type_mismatch());

        let any = DecodeOptions { use_any_key: true, use_integer: true };
        assert!(from_slice_with(&hex!("a10102"), any).is_ok());
        assert!(from_slice_with(&hex!("1bffffffffffffffff"), any).is_ok());
    }

    #[test]
    fn deferred_mismatch_still_checks_the_rest() {
        // First entry has an integer key (mismatch under the defaults), the
        // second entry holds malformed nested bytes. The syntax error must
        // win over the deferred mismatch.
        assert!(matches!(
            from_slice_with(&hex!("a201026161ff"), DecodeOptions::default()),
            Err(e) if !e.is_type_mismatch()
        ));
    }

    #[test]
    fn tags_stay_structural() {
        let v: Value = from_slice(&hex!("c11a514b67b0")).unwrap();
        assert_eq!(
            v,
            Value::Tag(1, Box::new(Value::Integer(Integer::from(1363896240u64))))
        );
    }

    #[test]
    fn raw_tag_splits_number_and_content() {
        let v: RawTag = from_slice(&hex!("d818456449455446")).unwrap();
        assert_eq!(v.number, 24);
        assert_eq!(v.content.0, hex!("456449455446"));
    }
}
