//! An RFC 8949 CBOR codec.
//!
//! The [`decode`] module parses single data items from byte slices, either
//! through the closure-driven [`decode::parse_value`] family or through the
//! [`decode::FromCbor`] trait. The [`encode`] module is the reverse
//! direction and always produces canonical output: preferred-serialization
//! heads, bytewise-sorted map keys, and shortest-exact floats.
//!
//! [`wellformed`] verifies structure without building values, [`tags`]
//! implements the standard tag registry, [`value::Value`] is the generic
//! decoded form, and [`stream`] wraps the codec around `io::Read`/`io::Write`.

mod float;
mod head;

pub mod decode;
pub mod encode;
pub mod integer;
pub mod stream;
pub mod tags;
pub mod value;
pub mod wellformed;

#[cfg(test)]
mod decode_tests;

#[cfg(test)]
mod encode_tests;

pub use integer::Integer;
pub use value::{RawMessage, RawTag, Simple, Tag, Value};

/// Nesting limit applied while checking, skipping, decoding and encoding.
pub const MAX_DEPTH: usize = 1000;
