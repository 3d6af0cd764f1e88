//! Parsing CBOR data items from byte slices.
//!
//! [`parse_value`] consumes exactly one data item, collects the tags that
//! prefix it and hands the decoded head to a closure together with a flag
//! reporting whether the item used preferred (shortest) serialization.
//! Arrays and maps are surfaced as [`Series`] cursors that the closure
//! drives; the item is only complete once the cursor has been drained.
//!
//! [`FromCbor`] builds typed values on top of that surface, and
//! [`from_slice`] is the strict entry point: it verifies well-formedness of
//! the whole input before any destination value is built, and rejects
//! trailing bytes after the top-level item.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use thiserror::Error;

use crate::encode::Bytes;
use crate::head;
use crate::integer::Integer;
use crate::{float, tags, wellformed};

/// A value/destination mismatch, reported with the byte offset of the item
/// and, when it happened inside a struct field, the field path.
#[derive(Debug, Clone)]
pub struct TypeError {
    pub value: &'static str,
    pub target: &'static str,
    pub offset: usize,
    pub struct_name: String,
    pub field_path: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.struct_name.is_empty() && self.field_path.is_empty() {
            write!(
                f,
                "cbor: cannot unmarshal {} into value of type {}",
                self.value, self.target
            )
        } else {
            write!(
                f,
                "cbor: cannot unmarshal {} into struct field {}.{} of type {}",
                self.value, self.struct_name, self.field_path, self.target
            )
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("cbor: unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    #[error("cbor: reserved additional-information code {0} at offset {1}")]
    ReservedAi(u8, usize),

    #[error("cbor: invalid simple value {0} at offset {1}")]
    InvalidSimple(u8, usize),

    #[error("cbor: invalid indefinite-length chunk at offset {0}")]
    InvalidChunk(usize),

    #[error("cbor: unexpected break code at offset {0}")]
    UnexpectedBreak(usize),

    #[error("cbor: map has a key but no value at offset {0}")]
    PartialMap(usize),

    #[error("cbor: invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    #[error("cbor: tags with no following value at offset {0}")]
    JustTags(usize),

    #[error("cbor: unexpected data after top-level value at offset {0}")]
    TrailingData(usize),

    #[error("cbor: map used as a map key at offset {0}")]
    UnexpectedMapKey(usize),

    #[error("cbor: container not fully consumed")]
    MoreItems,

    #[error("cbor: maximum recursion depth reached")]
    MaxRecursion,

    #[error("cbor: {0}")]
    Semantic(String),

    #[error("{0}")]
    TypeMismatch(TypeError),
}

impl Error {
    pub fn type_mismatch(value: &'static str, target: &'static str, offset: usize) -> Error {
        Error::TypeMismatch(TypeError {
            value,
            target,
            offset,
            struct_name: String::new(),
            field_path: String::new(),
        })
    }

    pub fn semantic(msg: impl Into<String>) -> Error {
        Error::Semantic(msg.into())
    }

    /// Whether this is a deferrable value/destination mismatch as opposed to
    /// malformed bytes.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Error::TypeMismatch(_))
    }

    /// Attaches struct/field context to a type mismatch as it propagates out
    /// of a field decode. The innermost struct name wins; outer calls only
    /// prepend their field to the path.
    pub fn with_field(mut self, struct_name: &str, field: &str) -> Error {
        if let Error::TypeMismatch(e) = &mut self {
            if e.struct_name.is_empty() {
                e.struct_name = struct_name.to_string();
            }
            if e.field_path.is_empty() {
                e.field_path = field.to_string();
            } else {
                e.field_path = format!("{}.{}", field, e.field_path);
            }
        }
        self
    }
}

/// One decoded data item, shaped after the host value model rather than the
/// raw major types: both integer majors ride the wide [`Integer`] carrier,
/// and the two boolean simples collapse into one variant.
///
/// Strings record whether they arrived as indefinite-length chunk
/// sequences; the chunk bodies have already been concatenated (and, for
/// text, UTF-8 validated across chunk boundaries).
pub enum Item<'a, 'b: 'a> {
    Integer(Integer),
    Bytes { data: &'b [u8], chunked: bool },
    Text { data: &'b str, chunked: bool },
    Array(&'a mut Array<'b>),
    Map(&'a mut Map<'b>),
    Float(f64),
    Simple(u8),
    Bool(bool),
    Null,
    Undefined,
}

impl<'a, 'b: 'a> Item<'a, 'b> {
    pub fn kind(&self) -> &'static str {
        match self {
            Item::Integer(i) if i.sign => "negative integer",
            Item::Integer(_) => "unsigned integer",
            Item::Bytes { .. } => "byte string",
            Item::Text { .. } => "text string",
            Item::Array(_) => "array",
            Item::Map(_) => "map",
            Item::Float(_) => "float",
            Item::Simple(_) => "simple value",
            Item::Bool(_) => "boolean",
            Item::Null => "null",
            Item::Undefined => "undefined",
        }
    }

    /// Consumes any unread elements of this item without building values.
    ///
    /// The well-formedness checker does the walking, so nesting depth is
    /// bounded by its budget; no caller-supplied limit is needed.
    pub fn skip(&mut self) -> Result<(), Error> {
        match self {
            Item::Array(a) => a.skip_to_end(),
            Item::Map(m) => m.skip_to_end(),
            _ => Ok(()),
        }
    }
}

/// A cursor over the elements of an array (`D == 1`) or the keys and values
/// of a map (`D == 2`).
///
/// A definite-length container carries its declared item count and ends
/// when that many items have been read; an indefinite-length one ends at
/// its break code, which may not split a map entry in half. Maps count
/// keys and values as separate entries, so `declared` items mean
/// `declared * D` entries on the wire.
pub struct Series<'a, const D: usize> {
    data: &'a [u8],
    /// Declared item count; `None` for indefinite length. Never changes.
    declared: Option<usize>,
    offset: &'a mut usize,
    /// Entries consumed so far; a map entry is one key or one value.
    entries: usize,
    /// Whether an indefinite container's break code has been consumed.
    closed: bool,
}

pub type Array<'a> = Series<'a, 1>;
pub type Map<'a> = Series<'a, 2>;

impl<'a, const D: usize> Series<'a, D> {
    fn new(data: &'a [u8], declared: Option<usize>, offset: &'a mut usize) -> Self {
        Self {
            data,
            declared,
            offset,
            entries: 0,
            closed: false,
        }
    }

    /// Declared item count (pairs for a map); `None` for indefinite length.
    pub fn len(&self) -> Option<usize> {
        self.declared
    }

    /// Items fully consumed so far (pairs for a map).
    pub fn consumed(&self) -> usize {
        self.entries / D
    }

    pub fn is_definite(&self) -> bool {
        self.declared.is_some()
    }

    pub fn offset(&self) -> usize {
        *self.offset
    }

    fn advance(&mut self, len: usize) {
        self.entries += 1;
        *self.offset += len;
    }

    fn at_end(&mut self) -> Result<bool, Error> {
        match self.declared {
            Some(d) => Ok(self.entries == d.saturating_mul(D)),
            None if self.closed => Ok(true),
            None => match self.data.get(*self.offset) {
                Some(&0xFF) => {
                    if self.entries % D != 0 {
                        return Err(Error::PartialMap(*self.offset));
                    }
                    *self.offset += 1;
                    self.closed = true;
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Err(Error::UnexpectedEnd(self.data.len())),
            },
        }
    }

    /// Position just past the container once its end has been reached.
    pub fn end(&mut self) -> Result<Option<usize>, Error> {
        Ok(if self.at_end()? { Some(*self.offset) } else { None })
    }

    fn complete(mut self) -> Result<(), Error> {
        match self.at_end()? {
            true => Ok(()),
            false => Err(Error::MoreItems),
        }
    }

    /// Skips one element, returning its encoded length.
    pub fn skip_value(&mut self) -> Result<Option<usize>, Error> {
        Ok(self.element_bytes()?.map(|b| b.len()))
    }

    pub fn skip_to_end(&mut self) -> Result<(), Error> {
        while self.skip_value()?.is_some() {}
        Ok(())
    }

    pub fn try_parse_value<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(Item, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        if self.at_end()? {
            return Ok(None);
        }
        let start = *self.offset;
        let r = try_parse_value(&self.data[start..], f);
        if let Ok(Some((_, len))) = r {
            self.advance(len);
        }
        r
    }

    #[inline]
    pub fn parse_value<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(Item, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(f)?
            .ok_or(Error::UnexpectedEnd(self.data.len()).into())
    }

    /// Raw bytes of the next element, verified well-formed but not decoded.
    pub fn element_bytes(&mut self) -> Result<Option<&'a [u8]>, Error> {
        if self.at_end()? {
            return Ok(None);
        }
        let start = *self.offset;
        let n = wellformed::item(&self.data[start..])?;
        self.advance(n);
        Ok(Some(&self.data[start..start + n]))
    }

    pub fn try_parse<T>(&mut self) -> Result<Option<T>, T::Error>
    where
        T: FromCbor,
        T::Error: From<Error>,
    {
        if self.at_end()? {
            return Ok(None);
        }
        let (value, _, len) = T::from_cbor(&self.data[*self.offset..])?;
        self.advance(len);
        Ok(Some(value))
    }

    pub fn parse<T>(&mut self) -> Result<T, T::Error>
    where
        T: FromCbor,
        T::Error: From<Error>,
    {
        self.try_parse::<T>()?
            .ok_or(Error::UnexpectedEnd(self.data.len()).into())
    }

    pub fn try_parse_array<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(&mut Array, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|item, shortest, tags| match item {
            Item::Array(a) => f(a, shortest, tags),
            item => Err(Error::type_mismatch(item.kind(), "array", 0).into()),
        })
    }

    pub fn parse_array<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(&mut Array, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_array(f)?
            .ok_or(Error::UnexpectedEnd(self.data.len()).into())
    }

    pub fn try_parse_map<T, F, E>(&mut self, f: F) -> Result<Option<(T, usize)>, E>
    where
        F: FnOnce(&mut Map, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_value(|item, shortest, tags| match item {
            Item::Map(m) => f(m, shortest, tags),
            item => Err(Error::type_mismatch(item.kind(), "map", 0).into()),
        })
    }

    pub fn parse_map<T, F, E>(&mut self, f: F) -> Result<(T, usize), E>
    where
        F: FnOnce(&mut Map, bool, Vec<u64>) -> Result<T, E>,
        E: From<Error>,
    {
        self.try_parse_map(f)?
            .ok_or(Error::UnexpectedEnd(self.data.len()).into())
    }
}

fn parse_tags(data: &[u8]) -> Result<(Vec<u64>, usize, bool), Error> {
    let mut tags = Vec::new();
    let mut offset = 0;
    let mut shortest = true;
    while offset < data.len() && data[offset] >> 5 == 6 {
        let minor = data[offset] & 0x1F;
        offset += 1;
        let (tag, s) = head::uint_argument(minor, data, &mut offset)?;
        tags.push(tag);
        shortest = shortest && s;
    }
    Ok((tags, offset, shortest))
}

fn take<'b>(data: &'b [u8], offset: &mut usize, n: u64) -> Result<&'b [u8], Error> {
    let n = usize::try_from(n).map_err(|_| Error::UnexpectedEnd(data.len()))?;
    let end = offset
        .checked_add(n)
        .filter(|e| *e <= data.len())
        .ok_or(Error::UnexpectedEnd(data.len()))?;
    let s = &data[*offset..end];
    *offset = end;
    Ok(s)
}

fn parse_data_chunked(major: u8, data: &[u8], mut offset: usize) -> Result<(Vec<&[u8]>, usize), Error> {
    let mut chunks = Vec::new();
    loop {
        let ib = *data.get(offset).ok_or(Error::UnexpectedEnd(data.len()))?;
        if ib == 0xFF {
            return Ok((chunks, offset + 1));
        }
        // Chunks must share the outer major type and be definite-length.
        if ib >> 5 != major || ib & 0x1F == 31 {
            return Err(Error::InvalidChunk(offset));
        }
        offset += 1;
        let (n, _) = head::uint_argument(ib & 0x1F, data, &mut offset)?;
        chunks.push(take(data, &mut offset, n)?);
    }
}

/// Parses one data item, returning `None` for empty input.
///
/// The closure receives the decoded head, a flag reporting whether the item
/// (head widths, float width, definiteness) used preferred serialization,
/// and the tag numbers that prefixed it, outermost first.
pub fn try_parse_value<T, F, E>(data: &[u8], f: F) -> Result<Option<(T, usize)>, E>
where
    F: FnOnce(Item, bool, Vec<u64>) -> Result<T, E>,
    E: From<Error>,
{
    let (tags, mut offset, tags_shortest) = parse_tags(data)?;
    if offset >= data.len() {
        if !tags.is_empty() {
            return Err(Error::JustTags(offset).into());
        }
        return Ok(None);
    }

    let ib = data[offset];
    offset += 1;
    match (ib >> 5, ib & 0x1F) {
        (0, minor) => {
            let (v, s) = head::uint_argument(minor, data, &mut offset)?;
            let i = Integer {
                sign: false,
                magnitude: v,
            };
            f(Item::Integer(i), s && tags_shortest, tags)
        }
        (1, minor) => {
            let (v, s) = head::uint_argument(minor, data, &mut offset)?;
            let i = Integer {
                sign: true,
                magnitude: v,
            };
            f(Item::Integer(i), s && tags_shortest, tags)
        }
        (2, 31) => {
            let (chunks, end) = parse_data_chunked(2, data, offset)?;
            offset = end;
            let mut v = Vec::new();
            for c in chunks {
                v.extend_from_slice(c);
            }
            f(
                Item::Bytes {
                    data: &v,
                    chunked: true,
                },
                false,
                tags,
            )
        }
        (2, minor) => {
            let (n, s) = head::uint_argument(minor, data, &mut offset)?;
            let t = take(data, &mut offset, n)?;
            f(
                Item::Bytes {
                    data: t,
                    chunked: false,
                },
                s && tags_shortest,
                tags,
            )
        }
        (3, 31) => {
            let (chunks, end) = parse_data_chunked(3, data, offset)?;
            let mut v = Vec::new();
            for c in chunks {
                v.extend_from_slice(c);
            }
            // UTF-8 is validated over the concatenation: multi-byte
            // sequences may span chunk boundaries.
            let s = String::from_utf8(v).map_err(|_| Error::InvalidUtf8(offset))?;
            offset = end;
            f(
                Item::Text {
                    data: &s,
                    chunked: true,
                },
                false,
                tags,
            )
        }
        (3, minor) => {
            let (n, s) = head::uint_argument(minor, data, &mut offset)?;
            let start = offset;
            let t = take(data, &mut offset, n)?;
            let t = std::str::from_utf8(t).map_err(|_| Error::InvalidUtf8(start))?;
            f(
                Item::Text {
                    data: t,
                    chunked: false,
                },
                s && tags_shortest,
                tags,
            )
        }
        (4, 31) => {
            let mut a = Array::new(data, None, &mut offset);
            let r = f(Item::Array(&mut a), false, tags)?;
            a.complete().map(|_| r).map_err(E::from)
        }
        (4, minor) => {
            let (count, s) = head::uint_argument(minor, data, &mut offset)?;
            if count > usize::MAX as u64 {
                return Err(Error::UnexpectedEnd(data.len()).into());
            }
            let mut a = Array::new(data, Some(count as usize), &mut offset);
            let r = f(Item::Array(&mut a), s && tags_shortest, tags)?;
            a.complete().map(|_| r).map_err(E::from)
        }
        (5, 31) => {
            let mut m = Map::new(data, None, &mut offset);
            let r = f(Item::Map(&mut m), false, tags)?;
            m.complete().map(|_| r).map_err(E::from)
        }
        (5, minor) => {
            let (count, s) = head::uint_argument(minor, data, &mut offset)?;
            if count > usize::MAX as u64 {
                return Err(Error::UnexpectedEnd(data.len()).into());
            }
            let mut m = Map::new(data, Some(count as usize), &mut offset);
            let r = f(Item::Map(&mut m), s && tags_shortest, tags)?;
            m.complete().map(|_| r).map_err(E::from)
        }
        (6, _) => unreachable!("consumed by parse_tags"),
        (7, minor @ 0..=19) => f(Item::Simple(minor), tags_shortest, tags),
        (7, 20) => f(Item::Bool(false), tags_shortest, tags),
        (7, 21) => f(Item::Bool(true), tags_shortest, tags),
        (7, 22) => f(Item::Null, tags_shortest, tags),
        (7, 23) => f(Item::Undefined, tags_shortest, tags),
        (7, 24) => {
            let v = *data.get(offset).ok_or(Error::UnexpectedEnd(data.len()))?;
            if v < 32 {
                return Err(Error::InvalidSimple(v, offset).into());
            }
            offset += 1;
            f(Item::Simple(v), tags_shortest, tags)
        }
        (7, 25) => {
            let v = float::f16_to_f64(u16::from_be_bytes(head::to_array(data, offset)?));
            offset += 2;
            f(Item::Float(v), tags_shortest, tags)
        }
        (7, 26) => {
            let v = f32::from_be_bytes(head::to_array(data, offset)?) as f64;
            offset += 4;
            f(Item::Float(v), float::width(v) >= 4 && tags_shortest, tags)
        }
        (7, 27) => {
            let v = f64::from_be_bytes(head::to_array(data, offset)?);
            offset += 8;
            f(Item::Float(v), float::width(v) >= 8 && tags_shortest, tags)
        }
        (7, 31) => return Err(Error::UnexpectedBreak(offset - 1).into()),
        (7, minor) => return Err(Error::ReservedAi(minor, offset - 1).into()),
        (8.., _) => unreachable!(),
    }
    .map(|r| Some((r, offset)))
}

#[inline]
pub fn parse_value<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(Item, bool, Vec<u64>) -> Result<T, E>,
    E: From<Error>,
{
    try_parse_value(data, f)?.ok_or(Error::UnexpectedEnd(data.len()).into())
}

pub fn parse_array<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Array, bool, Vec<u64>) -> Result<T, E>,
    E: From<Error>,
{
    parse_value(data, |item, shortest, tags| match item {
        Item::Array(a) => f(a, shortest, tags),
        item => Err(Error::type_mismatch(item.kind(), "array", 0).into()),
    })
}

pub fn parse_map<T, F, E>(data: &[u8], f: F) -> Result<(T, usize), E>
where
    F: FnOnce(&mut Map, bool, Vec<u64>) -> Result<T, E>,
    E: From<Error>,
{
    parse_value(data, |item, shortest, tags| match item {
        Item::Map(m) => f(m, shortest, tags),
        item => Err(Error::type_mismatch(item.kind(), "map", 0).into()),
    })
}

/// The destination capability: a type that can build itself from the bytes
/// of one data item.
///
/// `from_cbor` receives the item from its initial byte (or first tag head)
/// onwards and returns the value, whether the encoding was preferred
/// serialization, and the number of bytes consumed. A type that owns its own
/// wire format reads `data` directly; [`item_bytes`] yields the exact span
/// of the item for that purpose.
pub trait FromCbor: Sized {
    type Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error>;
}

/// Parses one data item from the front of `data`.
pub fn parse<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
    T::Error: From<Error>,
{
    T::from_cbor(data).map(|(v, _, _)| v)
}

/// Like [`parse`] but maps empty input to `None`.
pub fn try_parse<T>(data: &[u8]) -> Result<Option<T>, T::Error>
where
    T: FromCbor,
    T::Error: From<Error>,
{
    if data.is_empty() {
        return Ok(None);
    }
    parse(data).map(Some)
}

/// Strict whole-input decode: verifies well-formedness before building
/// anything, then decodes exactly one item covering all of `data`.
pub fn from_slice<T>(data: &[u8]) -> Result<T, T::Error>
where
    T: FromCbor,
    T::Error: From<Error>,
{
    wellformed::validate(data)?;
    parse(data)
}

/// The full byte span of the item at the front of `data`, verified
/// well-formed but not decoded.
pub fn item_bytes(data: &[u8]) -> Result<&[u8], Error> {
    let n = wellformed::item(data)?;
    Ok(&data[..n])
}

/// Strips the self-describe tag (55799), which is semantically transparent.
pub(crate) fn effective_tags(tags: Vec<u64>) -> Vec<u64> {
    if tags.iter().any(|&t| t == tags::SELF_DESCRIBE) {
        tags.into_iter().filter(|&t| t != tags::SELF_DESCRIBE).collect()
    } else {
        tags
    }
}

impl FromCbor for u64 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "u64", 0));
            }
            match item {
                Item::Integer(i) if !i.sign => Ok((i.magnitude, shortest)),
                item => Err(Error::type_mismatch(item.kind(), "u64", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl FromCbor for i64 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "i64", 0));
            }
            match item {
                Item::Integer(i) => match i.int64() {
                    Ok(v) => Ok((v, shortest)),
                    Err(_) => Err(Error::type_mismatch(
                        if i.sign { "negative integer" } else { "unsigned integer" },
                        "i64",
                        0,
                    )),
                },
                item => Err(Error::type_mismatch(item.kind(), "i64", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

macro_rules! from_cbor_via {
    ( $via:ty => $( $t:ty ),* ) => {
        $(
            impl FromCbor for $t {
                type Error = Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v, s, len) = <$via>::from_cbor(data)?;
                    let v = <$t>::try_from(v)
                        .map_err(|_| Error::type_mismatch("integer", stringify!($t), 0))?;
                    Ok((v, s, len))
                }
            }
        )*
    };
}

from_cbor_via!(u64 => u8, u16, u32, usize);
from_cbor_via!(i64 => i8, i16, i32, isize);

impl FromCbor for f64 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "f64", 0));
            }
            match item {
                Item::Float(v) => Ok((v, shortest)),
                item => Err(Error::type_mismatch(item.kind(), "f64", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl FromCbor for f32 {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let (v, s, len) = f64::from_cbor(data)?;
        // Precision loss is allowed, range overflow is not.
        if v.is_finite() && v.abs() > f32::MAX as f64 {
            return Err(Error::type_mismatch("float", "f32", 0));
        }
        Ok((v as f32, s, len))
    }
}

impl FromCbor for bool {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "bool", 0));
            }
            match item {
                Item::Bool(b) => Ok((b, shortest)),
                item => Err(Error::type_mismatch(item.kind(), "bool", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl FromCbor for String {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "String", 0));
            }
            match item {
                Item::Text { data, .. } => Ok((data.to_string(), shortest)),
                item => Err(Error::type_mismatch(item.kind(), "String", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl FromCbor for Bytes<Vec<u8>> {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "bytes", 0));
            }
            match item {
                Item::Bytes { data, .. } => Ok((Bytes(data.to_vec()), shortest)),
                item => Err(Error::type_mismatch(item.kind(), "bytes", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl<T> FromCbor for Option<T>
where
    T: FromCbor,
    T::Error: From<Error>,
{
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        // Null and undefined both clear the destination.
        match data.first() {
            Some(&0xF6) | Some(&0xF7) => Ok((None, true, 1)),
            _ => T::from_cbor(data).map(|(v, s, len)| (Some(v), s, len)),
        }
    }
}

impl<T> FromCbor for Vec<T>
where
    T: FromCbor,
    T::Error: From<Error>,
{
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        // Null and undefined clear a sequence destination.
        if let Some(&(0xF6 | 0xF7)) = data.first() {
            return Ok((Vec::new(), true, 1));
        }
        parse_array(data, |a, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "array", 0).into());
            }
            let mut v = Vec::with_capacity(a.len().unwrap_or(0).min(1024));
            while let Some(item) = a.try_parse::<T>()? {
                v.push(item);
            }
            Ok((v, shortest))
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl<K, V> FromCbor for HashMap<K, V>
where
    K: FromCbor<Error = Error> + Eq + Hash,
    V: FromCbor<Error = Error>,
{
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        // Null and undefined clear a mapping destination.
        if let Some(&(0xF6 | 0xF7)) = data.first() {
            return Ok((HashMap::new(), true, 1));
        }
        parse_map(data, |m, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "map", 0));
            }
            let mut map = HashMap::with_capacity(m.len().unwrap_or(0).min(1024));
            while let Some(key) = m.try_parse::<K>()? {
                let value = m.parse::<V>()?;
                if map.insert(key, value).is_some() {
                    return Err(Error::semantic("duplicate map key"));
                }
            }
            Ok((map, shortest))
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl<K, V> FromCbor for BTreeMap<K, V>
where
    K: FromCbor<Error = Error> + Ord,
    V: FromCbor<Error = Error>,
{
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        // Null and undefined clear a mapping destination.
        if let Some(&(0xF6 | 0xF7)) = data.first() {
            return Ok((BTreeMap::new(), true, 1));
        }
        parse_map(data, |m, shortest, tags| {
            if !effective_tags(tags).is_empty() {
                return Err(Error::type_mismatch("tag", "map", 0));
            }
            let mut map = BTreeMap::new();
            while let Some(key) = m.try_parse::<K>()? {
                let value = m.parse::<V>()?;
                if map.insert(key, value).is_some() {
                    return Err(Error::semantic("duplicate map key"));
                }
            }
            Ok((map, shortest))
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl<T: FromCbor> FromCbor for (T, bool) {
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        T::from_cbor(data).map(|(v, s, len)| ((v, s), s, len))
    }
}

impl<T: FromCbor> FromCbor for (T, usize) {
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        T::from_cbor(data).map(|(v, s, len)| ((v, len), s, len))
    }
}

impl<T: FromCbor> FromCbor for (T, bool, usize) {
    type Error = T::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        T::from_cbor(data).map(|(v, s, len)| ((v, s, len), s, len))
    }
}
