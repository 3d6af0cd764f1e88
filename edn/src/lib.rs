//! Extended Diagnostic Notation for CBOR.
//!
//! [`parse`] turns EDN text into encoded CBOR bytes; [`format`] walks CBOR
//! bytes and renders EDN text. Indefinite-length containers survive the
//! round trip through the `_` marker, and the `_0`..`_3` indicators force
//! non-preferred head widths, so non-canonical encodings can be written
//! down and reproduced exactly.

mod ast;
mod parser;
mod writer;

pub use ast::{EdnValue, Indicator};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("edn: {0}")]
    Parse(String),

    #[error("edn: {0} at offset {1}")]
    Syntax(String, usize),

    #[error("edn: unexpected end of input")]
    UnexpectedEnd,

    #[error(transparent)]
    Encode(#[from] tern_cbor::encode::Error),
}

/// Parses EDN text into the CBOR encoding it denotes.
pub fn parse(input: &str) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    parser::parse(input)?.encode_into(&mut out)?;
    Ok(out)
}

/// Parses EDN text into its abstract form without encoding it.
pub fn parse_ast(input: &str) -> Result<EdnValue, Error> {
    parser::parse(input)
}

/// Renders one encoded CBOR item as EDN text.
pub fn format(data: &[u8]) -> Result<String, Error> {
    writer::format(data)
}
