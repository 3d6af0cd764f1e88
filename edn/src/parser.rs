//! EDN text to AST, built from chumsky combinators.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use chumsky::prelude::*;
use num_bigint::BigInt;
use num_traits::{Num, ToPrimitive, Zero};

use super::ast::{EdnValue, Indicator};

pub(crate) fn parse(input: &str) -> Result<EdnValue, super::Error> {
    edn_parser().parse(input).map_err(|errs| {
        super::Error::Parse(
            errs.into_iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        )
    })
}

fn edn_parser() -> impl Parser<char, EdnValue, Error = Simple<char>> {
    value_parser().padded_by(junk()).then_ignore(end())
}

/// Whitespace and `/…/` comments, permitted anywhere tokens can be
/// separated.
fn junk() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    choice((
        filter(|c: &char| c.is_whitespace()).ignored(),
        just('/').then(none_of("/").repeated()).then(just('/')).ignored(),
    ))
    .repeated()
    .ignored()
}

#[derive(Clone)]
enum Fragment {
    Text(String),
    Bytes(Vec<u8>),
}

/// Drops whitespace and `/…/` comments that appeared inside quotes.
fn strip_embedded_junk(chars: Vec<char>) -> String {
    let mut out = String::new();
    let mut it = chars.into_iter();
    while let Some(c) = it.next() {
        if c == '/' {
            for d in it.by_ref() {
                if d == '/' {
                    break;
                }
            }
        } else if !c.is_whitespace() {
            out.push(c);
        }
    }
    out
}

fn fragment() -> impl Parser<char, Fragment, Error = Simple<char>> + Clone {
    let escape = just('\\').then(any()).map(|(_, c)| vec!['\\', c]);

    let text = just('"')
        .ignore_then(
            escape
                .clone()
                .or(none_of("\"\\").map(|c| vec![c]))
                .repeated()
                .map(|vecs: Vec<Vec<char>>| vecs.into_iter().flatten().collect::<String>()),
        )
        .then_ignore(just('"'))
        .map(|s| Fragment::Text(unescape_string(&s)))
        .labelled("text string");

    let raw_bytes = just('\'')
        .ignore_then(
            escape
                .or(none_of("'\\").map(|c| vec![c]))
                .repeated()
                .map(|vecs: Vec<Vec<char>>| vecs.into_iter().flatten().collect::<String>()),
        )
        .then_ignore(just('\''))
        .map(|s| Fragment::Bytes(unescape_string(&s).into_bytes()))
        .labelled("byte string");

    let hex_bytes = just("h'")
        .ignore_then(none_of("'").repeated())
        .then_ignore(just('\''))
        .try_map(|chars, span| {
            hex::decode(strip_embedded_junk(chars))
                .map(Fragment::Bytes)
                .map_err(|e| Simple::custom(span, format!("invalid hex string: {e}")))
        })
        .labelled("hex byte string");

    let b64_bytes = just("b64'")
        .ignore_then(none_of("'").repeated())
        .then_ignore(just('\''))
        .try_map(|chars, span| {
            let s = strip_embedded_junk(chars);
            BASE64_STANDARD
                .decode(&s)
                .or_else(|_| URL_SAFE_NO_PAD.decode(&s))
                .map(Fragment::Bytes)
                .map_err(|e| Simple::custom(span, format!("invalid base64 string: {e}")))
        })
        .labelled("base64 byte string");

    let b32_bytes = just("b32'")
        .ignore_then(none_of("'").repeated())
        .then_ignore(just('\''))
        .try_map(|chars, span| {
            data_encoding::BASE32
                .decode(strip_embedded_junk(chars).as_bytes())
                .map(Fragment::Bytes)
                .map_err(|e| Simple::custom(span, format!("invalid base32 string: {e}")))
        })
        .labelled("base32 byte string");

    choice((hex_bytes, b64_bytes, b32_bytes, text, raw_bytes))
}

/// Juxtaposed fragments concatenate; any byte fragment makes the whole
/// string a byte string.
fn combine_fragments(frags: Vec<Fragment>) -> EdnValue {
    if frags.iter().all(|f| matches!(f, Fragment::Text(_))) {
        let mut s = String::new();
        for f in frags {
            if let Fragment::Text(t) = f {
                s.push_str(&t);
            }
        }
        EdnValue::TextString(s)
    } else {
        let mut b = Vec::new();
        for f in frags {
            match f {
                Fragment::Text(t) => b.extend_from_slice(t.as_bytes()),
                Fragment::Bytes(v) => b.extend_from_slice(&v),
            }
        }
        EdnValue::ByteString(b)
    }
}

fn fragments() -> impl Parser<char, Vec<Fragment>, Error = Simple<char>> + Clone {
    fragment()
        .then(junk().ignore_then(fragment()).repeated())
        .map(|(first, rest)| {
            let mut frags = vec![first];
            frags.extend(rest);
            frags
        })
}

fn value_parser() -> impl Parser<char, EdnValue, Error = Simple<char>> {
    recursive(|value| {
        // One token of digits, signs, base prefixes, hex digits and
        // exponents; disambiguated in parse_number.
        let number = filter(|c: &char| c.is_ascii_digit() || matches!(c, '+' | '-'))
            .chain::<char, _, _>(
                filter(|c: &char| {
                    c.is_ascii_hexdigit()
                        || matches!(c, '.' | '+' | '-' | 'x' | 'X' | 'o' | 'O' | 'p' | 'P')
                })
                .repeated(),
            )
            .collect::<String>()
            .try_map(|s, span| {
                parse_number(&s).ok_or_else(|| Simple::custom(span, format!("invalid number: {s}")))
            })
            .labelled("number");

        let nan = text::keyword("NaN").to(EdnValue::Float(f64::NAN));
        let infinity = text::keyword("Infinity").to(EdnValue::Float(f64::INFINITY));
        let pos_infinity = just('+')
            .ignore_then(text::keyword("Infinity"))
            .to(EdnValue::Float(f64::INFINITY));
        let neg_infinity = just('-')
            .ignore_then(text::keyword("Infinity"))
            .to(EdnValue::Float(f64::NEG_INFINITY));

        let bool_true = text::keyword("true").to(EdnValue::Bool(true));
        let bool_false = text::keyword("false").to(EdnValue::Bool(false));
        let null = text::keyword("null").to(EdnValue::Null);
        let undefined = text::keyword("undefined").to(EdnValue::Undefined);

        let simple = text::keyword("simple")
            .ignore_then(just('(').padded_by(junk()))
            .ignore_then(text::int(10))
            .then_ignore(junk().ignore_then(just(')')))
            .try_map(|s: String, span| {
                s.parse::<u8>()
                    .map(EdnValue::Simple)
                    .map_err(|e| Simple::custom(span, format!("invalid simple value: {e}")))
            })
            .labelled("simple value");

        // Strings: juxtaposed fragments, or an empty form followed by `_`
        // spelling the empty indefinite-length string.
        let string_item = fragments()
            .then(just('_').or_not())
            .try_map(|(frags, underscore), span| {
                if underscore.is_some() {
                    return match frags.as_slice() {
                        [Fragment::Bytes(b)] if b.is_empty() => {
                            Ok(EdnValue::ByteStream(Vec::new()))
                        }
                        [Fragment::Text(s)] if s.is_empty() => {
                            Ok(EdnValue::TextStream(Vec::new()))
                        }
                        _ => Err(Simple::custom(span, "misplaced encoding indicator")),
                    };
                }
                Ok(combine_fragments(frags))
            });

        // Chunked strings: (_ "strea", "ming")
        let stream = just('(')
            .ignore_then(junk())
            .ignore_then(just('_'))
            .ignore_then(
                fragments()
                    .map(combine_fragments)
                    .separated_by(just(',').padded_by(junk()))
                    .allow_trailing()
                    .padded_by(junk()),
            )
            .then_ignore(just(')'))
            .try_map(|chunks, span| {
                if chunks.iter().all(|c| matches!(c, EdnValue::TextString(_))) {
                    Ok(EdnValue::TextStream(
                        chunks
                            .into_iter()
                            .map(|c| match c {
                                EdnValue::TextString(s) => s,
                                _ => unreachable!(),
                            })
                            .collect(),
                    ))
                } else if chunks.iter().all(|c| matches!(c, EdnValue::ByteString(_))) {
                    Ok(EdnValue::ByteStream(
                        chunks
                            .into_iter()
                            .map(|c| match c {
                                EdnValue::ByteString(b) => b,
                                _ => unreachable!(),
                            })
                            .collect(),
                    ))
                } else {
                    Err(Simple::custom(
                        span,
                        "chunks of an indefinite-length string must share one type",
                    ))
                }
            })
            .labelled("chunked string");

        // `_` forces indefinite length; `_0`..`_3` force the head width.
        let indicator = just('_')
            .ignore_then(one_of("0123").or_not())
            .map(|d| match d {
                Some(c) => Indicator::Forced(c as u8 - b'0'),
                None => Indicator::Indefinite,
            })
            .or_not()
            .map(|o| o.unwrap_or(Indicator::Preferred));

        let array = just('[')
            .ignore_then(junk())
            .ignore_then(indicator.clone())
            .then(
                value
                    .clone()
                    .separated_by(just(',').padded_by(junk()))
                    .allow_trailing()
                    .padded_by(junk()),
            )
            .then_ignore(just(']'))
            .map(|(ind, items)| EdnValue::Array(ind, items))
            .labelled("array");

        let entry = value
            .clone()
            .then_ignore(just(':').padded_by(junk()))
            .then(value.clone());
        let map = just('{')
            .ignore_then(junk())
            .ignore_then(indicator)
            .then(
                entry
                    .separated_by(just(',').padded_by(junk()))
                    .allow_trailing()
                    .padded_by(junk()),
            )
            .then_ignore(just('}'))
            .map(|(ind, pairs)| EdnValue::Map(ind, pairs))
            .labelled("map");

        let tagged = text::int(10)
            .try_map(|s: String, span| {
                s.parse::<u64>()
                    .map_err(|e| Simple::custom(span, format!("invalid tag number: {e}")))
            })
            .then_ignore(just('(').padded_by(junk()))
            .then(value)
            .then_ignore(junk().ignore_then(just(')')))
            .map(|(tag, content)| EdnValue::Tagged(tag, Box::new(content)))
            .labelled("tagged value");

        choice((
            tagged,
            simple,
            bool_true,
            bool_false,
            null,
            undefined,
            nan,
            infinity,
            pos_infinity,
            neg_infinity,
            number,
            string_item,
            stream,
            array,
            map,
        ))
    })
}

fn parse_number(s: &str) -> Option<EdnValue> {
    if let Some(v) = parse_integer(s) {
        return Some(v);
    }
    if let Some(f) = parse_hex_float(s) {
        return Some(EdnValue::Float(f));
    }
    s.parse::<f64>().ok().map(EdnValue::Float)
}

/// Arbitrary-precision first, honouring `0x`/`0o`/`0b` prefixes (and a bare
/// leading zero as octal). Values past the 64-bit range become bignums.
fn parse_integer(s: &str) -> Option<EdnValue> {
    let (neg, mag) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let i = if let Some(h) = mag.strip_prefix("0x").or_else(|| mag.strip_prefix("0X")) {
        BigInt::from_str_radix(h, 16).ok()?
    } else if let Some(o) = mag.strip_prefix("0o").or_else(|| mag.strip_prefix("0O")) {
        BigInt::from_str_radix(o, 8).ok()?
    } else if let Some(b) = mag.strip_prefix("0b").or_else(|| mag.strip_prefix("0B")) {
        BigInt::from_str_radix(b, 2).ok()?
    } else if mag.len() > 1 && mag.starts_with('0') {
        BigInt::from_str_radix(&mag[1..], 8).ok()?
    } else {
        BigInt::from_str_radix(mag, 10).ok()?
    };
    if neg && !i.is_zero() {
        match (i.clone() - BigInt::from(1)).to_u64() {
            Some(n) => Some(EdnValue::Negative(n)),
            None => Some(EdnValue::BigNum(-i)),
        }
    } else {
        match i.to_u64() {
            Some(u) => Some(EdnValue::Unsigned(u)),
            None => Some(EdnValue::BigNum(i)),
        }
    }
}

/// Hex floats of the form `0x1.8p3`.
fn parse_hex_float(s: &str) -> Option<f64> {
    let (neg, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let rest = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))?;
    let (mantissa, exp) = rest.split_once(['p', 'P'])?;
    let exp: i32 = exp.parse().ok()?;
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1f64 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    let v = value * 2f64.powi(exp);
    Some(if neg { -v } else { v })
}

/// JSON-compatible escapes: `\" \\ \/ \b \f \n \r \t \uXXXX`.
fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                Some('\\') => result.push('\\'),
                Some('/') => result.push('/'),
                Some('b') => result.push('\x08'),
                Some('f') => result.push('\x0C'),
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('u') => {
                    let hex: String = chars.by_ref().take(4).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16)
                        && let Some(ch) = char::from_u32(code)
                    {
                        result.push(ch);
                    }
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }

    result
}
