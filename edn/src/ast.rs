use num_bigint::BigInt;
use tern_cbor::encode;

use super::Error;

/// How a length prefix should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Shortest head that holds the value (preferred serialization).
    Preferred,
    /// Forced argument width: 0..=3 select AI 24/25/26/27. Never narrows
    /// below what the value requires.
    Forced(u8),
    /// Indefinite length, terminated by a break code.
    Indefinite,
}

/// One parsed EDN value, preserving the encoding choices the text spelled
/// out.
#[derive(Debug, Clone, PartialEq)]
pub enum EdnValue {
    Unsigned(u64),
    /// The wire form: encodes `-1 - n`.
    Negative(u64),
    /// An integer outside the 64-bit range, encoded as a bignum tag.
    BigNum(BigInt),
    Float(f64),
    ByteString(Vec<u8>),
    TextString(String),
    /// `(_ h'..', h'..')`, one element per chunk.
    ByteStream(Vec<Vec<u8>>),
    /// `(_ "strea", "ming")`, one element per chunk.
    TextStream(Vec<String>),
    Array(Indicator, Vec<EdnValue>),
    Map(Indicator, Vec<(EdnValue, EdnValue)>),
    Tagged(u64, Box<EdnValue>),
    Simple(u8),
    Bool(bool),
    Null,
    Undefined,
}

fn natural_width(val: u64) -> u8 {
    if val <= u8::MAX as u64 {
        0
    } else if val <= u16::MAX as u64 {
        1
    } else if val <= u32::MAX as u64 {
        2
    } else {
        3
    }
}

fn emit_head(out: &mut Vec<u8>, major: u8, ind: Indicator, val: u64) {
    let bits = major << 5;
    let width = match ind {
        Indicator::Indefinite => {
            out.push(bits | 31);
            return;
        }
        Indicator::Preferred => {
            if val < 24 {
                out.push(bits | val as u8);
                return;
            }
            natural_width(val)
        }
        Indicator::Forced(w) => w.max(natural_width(val)),
    };
    match width {
        0 => {
            out.push(bits | 24);
            out.push(val as u8);
        }
        1 => {
            out.push(bits | 25);
            out.extend((val as u16).to_be_bytes());
        }
        2 => {
            out.push(bits | 26);
            out.extend((val as u32).to_be_bytes());
        }
        _ => {
            out.push(bits | 27);
            out.extend(val.to_be_bytes());
        }
    }
}

impl EdnValue {
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            EdnValue::Unsigned(n) => emit_head(out, 0, Indicator::Preferred, *n),
            EdnValue::Negative(n) => emit_head(out, 1, Indicator::Preferred, *n),
            EdnValue::BigNum(i) => out.extend(encode::emit(i)?),
            EdnValue::Float(f) => out.extend(encode::emit(f)?),
            EdnValue::ByteString(b) => {
                emit_head(out, 2, Indicator::Preferred, b.len() as u64);
                out.extend_from_slice(b);
            }
            EdnValue::TextString(s) => {
                emit_head(out, 3, Indicator::Preferred, s.len() as u64);
                out.extend_from_slice(s.as_bytes());
            }
            EdnValue::ByteStream(chunks) => {
                out.push((2 << 5) | 31);
                for c in chunks {
                    emit_head(out, 2, Indicator::Preferred, c.len() as u64);
                    out.extend_from_slice(c);
                }
                out.push(0xFF);
            }
            EdnValue::TextStream(chunks) => {
                out.push((3 << 5) | 31);
                for c in chunks {
                    emit_head(out, 3, Indicator::Preferred, c.len() as u64);
                    out.extend_from_slice(c.as_bytes());
                }
                out.push(0xFF);
            }
            EdnValue::Array(ind, items) => {
                emit_head(out, 4, *ind, items.len() as u64);
                for item in items {
                    item.encode_into(out)?;
                }
                if *ind == Indicator::Indefinite {
                    out.push(0xFF);
                }
            }
            EdnValue::Map(ind, pairs) => {
                emit_head(out, 5, *ind, pairs.len() as u64);
                for (k, v) in pairs {
                    k.encode_into(out)?;
                    v.encode_into(out)?;
                }
                if *ind == Indicator::Indefinite {
                    out.push(0xFF);
                }
            }
            EdnValue::Tagged(tag, content) => {
                emit_head(out, 6, Indicator::Preferred, *tag);
                content.encode_into(out)?;
            }
            EdnValue::Simple(n) => match *n {
                24..=31 => {
                    return Err(Error::Parse(format!("reserved simple value {n}")));
                }
                v if v < 24 => out.push(0xE0 | v),
                v => out.extend([0xF8, v]),
            },
            EdnValue::Bool(b) => out.push(if *b { 0xF5 } else { 0xF4 }),
            EdnValue::Null => out.push(0xF6),
            EdnValue::Undefined => out.push(0xF7),
        }
        Ok(())
    }
}
