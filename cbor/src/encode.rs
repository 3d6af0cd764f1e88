//! Encoding host values into canonical CBOR.
//!
//! Output always uses preferred serialization: the shortest head for every
//! argument, the shortest exact float width, and map entries sorted by
//! bytewise comparison of their encoded keys. The [`Encoder`] carries a
//! sticky error and a depth counter; programmer misuse of definite-length
//! containers (wrong item count) panics, data-dependent failures surface
//! from [`Encoder::finish`].

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::MAX_DEPTH;
use crate::float;
use crate::head;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("cbor: recursion limit exceeded while encoding")]
    MaxRecursion,

    #[error("cbor: unsupported value: {0}")]
    UnsupportedValue(String),
}

/// The source capability: a value that can write itself to an [`Encoder`].
pub trait ToCbor {
    fn to_cbor(&self, encoder: &mut Encoder);

    /// Whether `omitempty` struct fields should treat this value as absent.
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl<T: ToCbor + ?Sized> ToCbor for &T {
    fn to_cbor(&self, encoder: &mut Encoder) {
        (**self).to_cbor(encoder)
    }

    fn is_empty_value(&self) -> bool {
        (**self).is_empty_value()
    }
}

#[derive(Default)]
pub struct Encoder {
    data: Vec<u8>,
    depth: usize,
    err: Option<Error>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh buffer that inherits the current nesting depth, for encoding
    /// map keys and values to their own buffers before sorting.
    fn subencoder(&self) -> Encoder {
        Encoder {
            data: Vec::new(),
            depth: self.depth,
            err: None,
        }
    }

    pub fn fail(&mut self, err: Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub(crate) fn emit_uint_minor(&mut self, major: u8, val: u64) {
        head::emit_uint(&mut self.data, major, val);
    }

    pub(crate) fn push_float(&mut self, v: f64) {
        float::encode(&mut self.data, v);
    }

    /// Writes pre-encoded bytes verbatim.
    pub fn emit_raw(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn emit<T: ToCbor + ?Sized>(&mut self, value: &T) {
        if self.err.is_some() {
            return;
        }
        if self.depth >= MAX_DEPTH {
            self.fail(Error::MaxRecursion);
            return;
        }
        self.depth += 1;
        value.to_cbor(self);
        self.depth -= 1;
    }

    pub fn emit_tagged<T, I, U>(&mut self, value: &T, tags: I)
    where
        T: ToCbor + ?Sized,
        I: IntoIterator<Item = U>,
        U: num_traits::ToPrimitive,
    {
        for tag in tags {
            match tag.to_u64() {
                Some(tag) => self.emit_uint_minor(6, tag),
                None => {
                    self.fail(Error::UnsupportedValue(
                        "tag numbers must be unsigned integers".into(),
                    ));
                    return;
                }
            }
        }
        self.emit(value);
    }

    /// Emits a simple value. 20..=23 use their one-byte named forms;
    /// 24..=31 are reserved and fail the encoder.
    pub fn emit_simple(&mut self, value: u8) {
        match value {
            24..=31 => self.fail(Error::UnsupportedValue(format!(
                "reserved simple value {value}"
            ))),
            v if v < 24 => self.data.push(0xE0 | v),
            v => {
                self.data.push(0xF8);
                self.data.push(v);
            }
        }
    }

    pub fn emit_byte_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut ByteStream),
    {
        self.data.push((2 << 5) | 31);
        let mut s = ByteStream { encoder: self };
        f(&mut s);
        self.data.push(0xFF);
    }

    pub fn emit_text_stream<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextStream),
    {
        self.data.push((3 << 5) | 31);
        let mut s = TextStream { encoder: self };
        f(&mut s);
        self.data.push(0xFF);
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        if self.err.is_some() {
            return;
        }
        let mut a = Sequence::<1>::new(self, count);
        f(&mut a);
        a.end();
    }

    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Map),
    {
        if self.err.is_some() {
            return;
        }
        let mut m = Sequence::<2>::new(self, count);
        f(&mut m);
        m.end();
    }

    pub fn finish(self) -> Result<Vec<u8>, Error> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

pub struct ByteStream<'a> {
    encoder: &'a mut Encoder,
}

impl ByteStream<'_> {
    pub fn emit<V: AsRef<[u8]>>(&mut self, chunk: V) {
        let chunk = chunk.as_ref();
        self.encoder.emit_uint_minor(2, chunk.len() as u64);
        self.encoder.data.extend_from_slice(chunk);
    }
}

pub struct TextStream<'a> {
    encoder: &'a mut Encoder,
}

impl TextStream<'_> {
    pub fn emit<V: AsRef<str>>(&mut self, chunk: V) {
        let chunk = chunk.as_ref();
        self.encoder.emit_uint_minor(3, chunk.len() as u64);
        self.encoder.data.extend_from_slice(chunk.as_bytes());
    }
}

pub struct Sequence<'a, const D: usize> {
    encoder: &'a mut Encoder,
    count: Option<usize>,
    idx: usize,
}

pub type Array<'a> = Sequence<'a, 1>;
pub type Map<'a> = Sequence<'a, 2>;

impl<'a, const D: usize> Sequence<'a, D> {
    fn new(encoder: &'a mut Encoder, count: Option<usize>) -> Self {
        let major = if D == 1 { 4 } else { 5 };
        match count {
            Some(count) => encoder.emit_uint_minor(major, count as u64),
            None => encoder.data.push((major << 5) | 31),
        }
        Self {
            encoder,
            count: count.map(|c| c * D),
            idx: 0,
        }
    }

    fn check_bounds(&mut self) {
        self.idx += 1;
        if let Some(count) = self.count
            && self.idx > count
        {
            panic!("too many items added to definite-length sequence");
        }
    }

    fn end(self) {
        match self.count {
            Some(count) => {
                if self.idx != count {
                    panic!(
                        "definite-length sequence is short of items: {}, expected {}",
                        self.idx, count
                    );
                }
            }
            None => self.encoder.data.push(0xFF),
        }
    }

    pub fn emit<T: ToCbor + ?Sized>(&mut self, value: &T) {
        self.check_bounds();
        self.encoder.emit(value);
    }

    pub fn emit_raw(&mut self, data: &[u8]) {
        self.check_bounds();
        self.encoder.emit_raw(data);
    }

    pub fn emit_tagged<T, I, U>(&mut self, value: &T, tags: I)
    where
        T: ToCbor + ?Sized,
        I: IntoIterator<Item = U>,
        U: num_traits::ToPrimitive,
    {
        self.check_bounds();
        self.encoder.emit_tagged(value, tags);
    }

    pub fn emit_array<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Array),
    {
        self.check_bounds();
        self.encoder.emit_array(count, f);
    }

    pub fn emit_map<F>(&mut self, count: Option<usize>, f: F)
    where
        F: FnOnce(&mut Map),
    {
        self.check_bounds();
        self.encoder.emit_map(count, f);
    }
}

/// Encodes one value to a fresh buffer.
pub fn emit<T: ToCbor + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
    let mut e = Encoder::new();
    e.emit(value);
    e.finish()
}

pub fn emit_tagged<T, I, U>(value: &T, tags: I) -> Result<Vec<u8>, Error>
where
    T: ToCbor + ?Sized,
    I: IntoIterator<Item = U>,
    U: num_traits::ToPrimitive,
{
    let mut e = Encoder::new();
    e.emit_tagged(value, tags);
    e.finish()
}

/// A byte string (major type 2). `Vec<u8>` on its own encodes as an array
/// of integers; this wrapper selects the string form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes<B>(pub B);

impl<B: AsRef<[u8]>> ToCbor for Bytes<B> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        let b = self.0.as_ref();
        encoder.emit_uint_minor(2, b.len() as u64);
        encoder.emit_raw(b);
    }

    fn is_empty_value(&self) -> bool {
        self.0.as_ref().is_empty()
    }
}

/// A pre-encoded data item written verbatim, the escape hatch for values
/// that produce their own CBOR.
pub struct Raw<'a>(pub &'a [u8]);

impl ToCbor for Raw<'_> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_raw(self.0);
    }
}

/// A tagged value with a runtime tag number.
pub struct Tagged<T>(pub u64, pub T);

impl<T: ToCbor> ToCbor for Tagged<T> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, self.0);
        self.1.to_cbor(encoder);
    }
}

/// Arbitrary bytes emitted as a text string, with invalid UTF-8 sequences
/// replaced by U+FFFD.
pub struct LossyText<'a>(pub &'a [u8]);

impl ToCbor for LossyText<'_> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        let s = String::from_utf8_lossy(self.0);
        encoder.emit_uint_minor(3, s.len() as u64);
        encoder.emit_raw(s.as_bytes());
    }
}

macro_rules! to_cbor_uint {
    ( $( $t:ty ),* ) => {
        $(
            impl ToCbor for $t {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(0, *self as u64);
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

macro_rules! to_cbor_int {
    ( $( $t:ty ),* ) => {
        $(
            impl ToCbor for $t {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    let v = *self as i64;
                    if v >= 0 {
                        encoder.emit_uint_minor(0, v as u64);
                    } else {
                        encoder.emit_uint_minor(1, !v as u64);
                    }
                }

                fn is_empty_value(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

to_cbor_uint!(u8, u16, u32, u64, usize);
to_cbor_int!(i8, i16, i32, i64, isize);

impl ToCbor for f64 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.push_float(*self);
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl ToCbor for f32 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.push_float(*self as f64);
    }

    fn is_empty_value(&self) -> bool {
        *self == 0.0
    }
}

impl ToCbor for half::f16 {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.push_float(f64::from(*self));
    }
}

impl ToCbor for bool {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_raw(&[if *self { 0xF5 } else { 0xF4 }]);
    }

    fn is_empty_value(&self) -> bool {
        !*self
    }
}

impl ToCbor for str {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(3, self.len() as u64);
        encoder.emit_raw(self.as_bytes());
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl ToCbor for String {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_str().to_cbor(encoder)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: ToCbor> ToCbor for [T] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_array(Some(self.len()), |a| {
            for item in self {
                a.emit(item);
            }
        });
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: ToCbor, const N: usize> ToCbor for [T; N] {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_slice().to_cbor(encoder)
    }

    fn is_empty_value(&self) -> bool {
        N == 0
    }
}

impl<T: ToCbor> ToCbor for Vec<T> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        self.as_slice().to_cbor(encoder)
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<T: ToCbor> ToCbor for Option<T> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Some(value) => encoder.emit(value),
            None => encoder.emit_raw(&[0xF6]),
        }
    }

    fn is_empty_value(&self) -> bool {
        self.is_none()
    }
}

/// Encodes every pair to its own buffers, sorts by encoded key bytes and
/// writes the pairs in order (RFC 8949 §4.2.1).
pub(crate) fn emit_sorted_map<'x, K, V, I>(encoder: &mut Encoder, entries: I)
where
    K: ToCbor + 'x,
    V: ToCbor + 'x,
    I: Iterator<Item = (&'x K, &'x V)>,
{
    let mut pairs = Vec::new();
    for (k, v) in entries {
        let mut ke = encoder.subencoder();
        ke.emit(k);
        let mut ve = encoder.subencoder();
        ve.emit(v);
        match (ke.finish(), ve.finish()) {
            (Ok(kb), Ok(vb)) => pairs.push((kb, vb)),
            (Err(e), _) | (_, Err(e)) => {
                encoder.fail(e);
                return;
            }
        }
    }
    pairs.sort();
    encoder.emit_map(Some(pairs.len()), |m| {
        for (kb, vb) in &pairs {
            m.emit_raw(kb);
            m.emit_raw(vb);
        }
    });
}

impl<K: ToCbor, V: ToCbor> ToCbor for HashMap<K, V> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        emit_sorted_map(encoder, self.iter());
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl<K: ToCbor, V: ToCbor> ToCbor for BTreeMap<K, V> {
    fn to_cbor(&self, encoder: &mut Encoder) {
        // Key order in the tree is by `Ord`, which need not match the
        // bytewise order of the encoded keys.
        emit_sorted_map(encoder, self.iter());
    }

    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}
