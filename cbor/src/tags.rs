//! The standard tag registry (RFC 8949 §3.4, RFC 9164).
//!
//! Each semantic type implements [`FromCbor`]/[`ToCbor`] directly, so a
//! destination that wants a timestamp or a bignum gets tag validation for
//! free. [`Tag::decode`] applies the registry to an already-decoded
//! [`Tag`], producing a [`Semantic`] value; unknown tag numbers pass
//! through untouched.

use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STANDARD, URL_SAFE_NO_PAD};
use ipnet::{Ipv4Net, Ipv6Net};
use num_bigint::{BigInt, Sign};
use num_traits::ToPrimitive;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::decode::{self, Error, FromCbor, parse_value};
use crate::encode::{Bytes, Encoder, ToCbor};
use crate::value::{Tag, Value};
use crate::wellformed;

pub const DATETIME_STRING: u64 = 0;
pub const EPOCH_DATETIME: u64 = 1;
pub const POSITIVE_BIGNUM: u64 = 2;
pub const NEGATIVE_BIGNUM: u64 = 3;
pub const DECIMAL_FRACTION: u64 = 4;
pub const BIGFLOAT: u64 = 5;
pub const EXPECTED_BASE64URL: u64 = 21;
pub const EXPECTED_BASE64: u64 = 22;
pub const EXPECTED_BASE16: u64 = 23;
pub const ENCODED_DATA: u64 = 24;
pub const URI: u64 = 32;
pub const BASE64URL: u64 = 33;
pub const BASE64: u64 = 34;
pub const IPV4: u64 = 52;
pub const IPV6: u64 = 54;
pub const SELF_DESCRIBE: u64 = 55799;

/// Valid epoch window: year 1 inclusive to year 10000 exclusive.
pub const MIN_EPOCH: i64 = -62135596800;
pub const MAX_EPOCH: i64 = 253402300800;

fn check_epoch(secs: i64) -> Result<i64, Error> {
    if secs < MIN_EPOCH || secs >= MAX_EPOCH {
        Err(Error::semantic("datetime out of range"))
    } else {
        Ok(secs)
    }
}

fn epoch_from_float(f: f64) -> Result<OffsetDateTime, Error> {
    if !(MIN_EPOCH as f64..MAX_EPOCH as f64).contains(&f) {
        return Err(Error::semantic("datetime out of range"));
    }
    let secs = f.trunc();
    let nanos = ((f - secs) * 1e9).round_ties_even();
    OffsetDateTime::from_unix_timestamp_nanos(secs as i128 * 1_000_000_000 + nanos as i128)
        .map_err(|e| Error::semantic(format!("invalid datetime: {e}")))
}

fn datetime_from_text(s: &str) -> Result<OffsetDateTime, Error> {
    let t = OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| Error::semantic(format!("invalid datetime string: {e}")))?;
    check_epoch(t.unix_timestamp())?;
    Ok(t)
}

impl FromCbor for OffsetDateTime {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            use decode::Item as I;
            match decode::effective_tags(tags).as_slice() {
                [DATETIME_STRING] => match item {
                    I::Text { data, .. } => Ok((datetime_from_text(data)?, shortest)),
                    _ => Err(Error::semantic("invalid datetime string")),
                },
                [EPOCH_DATETIME] => {
                    let t = match item {
                        I::Integer(i) => {
                            let secs = i
                                .int64()
                                .map_err(|_| Error::semantic("datetime out of range"))?;
                            OffsetDateTime::from_unix_timestamp(check_epoch(secs)?)
                                .map_err(|e| Error::semantic(format!("invalid datetime: {e}")))?
                        }
                        // NaN carries no instant; decode to the zero timestamp.
                        I::Float(f) if f.is_nan() => OffsetDateTime::UNIX_EPOCH,
                        I::Float(f) => epoch_from_float(f)?,
                        _ => return Err(Error::semantic("invalid epoch-based datetime")),
                    };
                    Ok((t, shortest))
                }
                _ => Err(Error::type_mismatch(item.kind(), "OffsetDateTime", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for OffsetDateTime {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, EPOCH_DATETIME);
        let nanos = self.unix_timestamp_nanos();
        if nanos % 1_000_000_000 == 0 {
            let secs = self.unix_timestamp();
            if secs >= 0 {
                encoder.emit_uint_minor(0, secs as u64);
            } else {
                encoder.emit_uint_minor(1, !secs as u64);
            }
        } else {
            encoder.push_float(nanos as f64 / 1e9);
        }
    }
}

fn negative_bignum(b: &[u8]) -> BigInt {
    -BigInt::from_bytes_be(Sign::Plus, b) - 1
}

impl FromCbor for BigInt {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            use decode::Item as I;
            match decode::effective_tags(tags).as_slice() {
                [POSITIVE_BIGNUM] => match item {
                    I::Bytes { data, .. } => {
                        Ok((BigInt::from_bytes_be(Sign::Plus, data), shortest))
                    }
                    _ => Err(Error::semantic("invalid positive bignum")),
                },
                [NEGATIVE_BIGNUM] => match item {
                    I::Bytes { data, .. } => Ok((negative_bignum(data), shortest)),
                    _ => Err(Error::semantic("invalid negative bignum")),
                },
                [] => match item {
                    I::Integer(i) => Ok((BigInt::from(i.as_i128()), shortest)),
                    item => Err(Error::type_mismatch(item.kind(), "BigInt", 0)),
                },
                _ => Err(Error::type_mismatch("tag", "BigInt", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for BigInt {
    fn to_cbor(&self, encoder: &mut Encoder) {
        // Majors 0/1 cover -2^64 ..= 2^64-1; only values beyond that use
        // the bignum tags.
        if let Some(u) = self.to_u64() {
            encoder.emit_uint_minor(0, u);
            return;
        }
        if self.sign() == Sign::Minus {
            let n = -(self.clone() + 1u8);
            if let Some(nu) = n.to_u64() {
                encoder.emit_uint_minor(1, nu);
            } else {
                encoder.emit_uint_minor(6, NEGATIVE_BIGNUM);
                let (_, bytes) = n.to_bytes_be();
                encoder.emit_uint_minor(2, bytes.len() as u64);
                encoder.emit_raw(&bytes);
            }
        } else {
            encoder.emit_uint_minor(6, POSITIVE_BIGNUM);
            let (_, bytes) = self.to_bytes_be();
            encoder.emit_uint_minor(2, bytes.len() as u64);
            encoder.emit_raw(&bytes);
        }
    }
}

/// Tag 5: `mantissa * 2^exponent` with arbitrary-precision mantissa.
#[derive(Debug, Clone, PartialEq)]
pub struct Bigfloat {
    pub mantissa: BigInt,
    pub exponent: i64,
}

impl Bigfloat {
    fn from_content(content: &Value) -> Result<Bigfloat, Error> {
        let Value::Array(items) = content else {
            return Err(Error::semantic("invalid bigfloat"));
        };
        if items.len() != 2 {
            return Err(Error::semantic("invalid bigfloat"));
        }
        let exponent = match &items[0] {
            Value::Integer(i) => i.int64().map_err(|_| Error::semantic("invalid bigfloat"))?,
            _ => return Err(Error::semantic("invalid bigfloat")),
        };
        let mantissa = match &items[1] {
            Value::Integer(i) => i.to_bigint(),
            Value::Tag(POSITIVE_BIGNUM, c) => match c.as_ref() {
                Value::Bytes(b) => BigInt::from_bytes_be(Sign::Plus, b),
                _ => return Err(Error::semantic("invalid bigfloat")),
            },
            Value::Tag(NEGATIVE_BIGNUM, c) => match c.as_ref() {
                Value::Bytes(b) => negative_bignum(b),
                _ => return Err(Error::semantic("invalid bigfloat")),
            },
            _ => return Err(Error::semantic("invalid bigfloat")),
        };
        Ok(Bigfloat { mantissa, exponent })
    }

    /// Nearest double, failing when the magnitude leaves the double range.
    pub fn to_f64(&self) -> Result<f64, Error> {
        let m = self
            .mantissa
            .to_f64()
            .ok_or_else(|| Error::semantic("bigfloat mantissa out of range"))?;
        let f = m * 2f64.powf(self.exponent as f64);
        if f.is_finite() || m == 0.0 {
            Ok(f)
        } else {
            Err(Error::semantic("bigfloat out of range"))
        }
    }
}

impl FromCbor for Bigfloat {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        let (v, s, len) = Value::from_cbor(data)?;
        match v {
            Value::Tag(BIGFLOAT, content) => Ok((Bigfloat::from_content(&content)?, s, len)),
            other => Err(Error::type_mismatch(other.kind(), "Bigfloat", 0)),
        }
    }
}

impl ToCbor for Bigfloat {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, BIGFLOAT);
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.exponent);
            a.emit(&self.mantissa);
        });
    }
}

/// Tag 24: an embedded encoded CBOR item, kept as bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedData(pub Vec<u8>);

impl FromCbor for EncodedData {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            use decode::Item as I;
            match decode::effective_tags(tags).as_slice() {
                [ENCODED_DATA] => match item {
                    I::Bytes { data, .. } => {
                        wellformed::validate(data)
                            .map_err(|e| Error::semantic(format!("invalid encoded data: {e}")))?;
                        Ok((EncodedData(data.to_vec()), shortest))
                    }
                    _ => Err(Error::semantic("invalid encoded data")),
                },
                _ => Err(Error::type_mismatch(item.kind(), "EncodedData", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for EncodedData {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, ENCODED_DATA);
        encoder.emit_uint_minor(2, self.0.len() as u64);
        encoder.emit_raw(&self.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncodeMode {
    Base64,
    Base64Url,
    Base16,
}

impl EncodeMode {
    fn encode(self, data: &[u8]) -> String {
        match self {
            EncodeMode::Base64 => BASE64_STANDARD.encode(data),
            EncodeMode::Base64Url => URL_SAFE_NO_PAD.encode(data),
            EncodeMode::Base16 => {
                let mut s = String::with_capacity(data.len() * 2);
                for b in data {
                    s.push_str(&format!("{b:02x}"));
                }
                s
            }
        }
    }
}

/// Renders a decoded value as JSON, with byte strings written in `mode`
/// unless a nested expected-encoding tag overrides it.
fn convert_json(value: &Value, mode: EncodeMode) -> serde_json::Value {
    use serde_json::Value as J;
    match value {
        Value::Bytes(b) => J::String(mode.encode(b)),
        Value::Text(s) => J::String(s.clone()),
        Value::Array(items) => J::Array(items.iter().map(|v| convert_json(v, mode)).collect()),
        Value::Map(pairs) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in pairs {
                let key = match k {
                    Value::Text(s) => s.clone(),
                    other => convert_json(other, mode).to_string(),
                };
                obj.insert(key, convert_json(v, mode));
            }
            J::Object(obj)
        }
        Value::Tag(EXPECTED_BASE64URL, c) => convert_json(c, EncodeMode::Base64Url),
        Value::Tag(EXPECTED_BASE64, c) => convert_json(c, EncodeMode::Base64),
        Value::Tag(EXPECTED_BASE16, c) => convert_json(c, EncodeMode::Base16),
        Value::Tag(_, c) => convert_json(c, mode),
        Value::Integer(i) => {
            let v = i.as_i128();
            if let Ok(v) = i64::try_from(v) {
                J::Number(v.into())
            } else if let Ok(v) = u64::try_from(v) {
                J::Number(v.into())
            } else {
                J::String(i.to_string())
            }
        }
        Value::Float(f) => serde_json::Number::from_f64(*f).map(J::Number).unwrap_or(J::Null),
        Value::Simple(s) => J::Number(s.0.into()),
        Value::Bool(b) => J::Bool(*b),
        Value::Null | Value::Undefined => J::Null,
    }
}

macro_rules! expected_wrapper {
    ( $( $name:ident, $tag:path, $mode:expr ; )* ) => {
        $(
            /// Content whose byte strings are expected to convert to the
            /// named base encoding when re-encoded as JSON.
            #[derive(Debug, Clone, PartialEq)]
            pub struct $name(pub Value);

            impl $name {
                pub fn to_json(&self) -> serde_json::Value {
                    convert_json(&self.0, $mode)
                }
            }

            impl FromCbor for $name {
                type Error = Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v, s, len) = Value::from_cbor(data)?;
                    match v {
                        Value::Tag($tag, c) => Ok(($name(*c), s, len)),
                        other => Err(Error::type_mismatch(other.kind(), stringify!($name), 0)),
                    }
                }
            }

            impl ToCbor for $name {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(6, $tag);
                    encoder.emit(&self.0);
                }
            }
        )*
    };
}

expected_wrapper! {
    ExpectedBase64Url, EXPECTED_BASE64URL, EncodeMode::Base64Url;
    ExpectedBase64, EXPECTED_BASE64, EncodeMode::Base64;
    ExpectedBase16, EXPECTED_BASE16, EncodeMode::Base16;
}

/// Tag 32: a URI, checked against the RFC 3986 scheme grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri(pub String);

fn valid_uri(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let head = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());
    head && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !s.contains(|c: char| c.is_whitespace() || c.is_control())
}

impl FromCbor for Uri {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            use decode::Item as I;
            match (decode::effective_tags(tags).as_slice(), item) {
                ([URI], I::Text { data, .. }) => {
                    if !valid_uri(data) {
                        return Err(Error::semantic("invalid URI"));
                    }
                    Ok((Uri(data.to_string()), shortest))
                }
                ([URI], _) => Err(Error::semantic("invalid URI")),
                (_, item) => Err(Error::type_mismatch(item.kind(), "Uri", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for Uri {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(6, URI);
        encoder.emit(self.0.as_str());
    }
}

macro_rules! base_string {
    ( $( $name:ident, $tag:path, $check:expr, $what:literal ; )* ) => {
        $(
            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct $name(pub String);

            impl FromCbor for $name {
                type Error = Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    parse_value(data, |item, shortest, tags| {
                        use decode::Item as I;
                        match (decode::effective_tags(tags).as_slice(), item) {
                            ([$tag], I::Text { data, .. }) => {
                                if ($check)(data).is_err() {
                                    return Err(Error::semantic(concat!("invalid ", $what)));
                                }
                                Ok(($name(data.to_string()), shortest))
                            }
                            ([$tag], _) => Err(Error::semantic(concat!("invalid ", $what))),
                            (_, item) => Err(Error::type_mismatch(item.kind(), stringify!($name), 0)),
                        }
                    })
                    .map(|((v, s), len)| (v, s, len))
                }
            }

            impl ToCbor for $name {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(6, $tag);
                    encoder.emit(self.0.as_str());
                }
            }
        )*
    };
}

base_string! {
    Base64UrlString, BASE64URL, |s: &str| URL_SAFE_NO_PAD.decode(s), "base64url";
    Base64String, BASE64, |s: &str| BASE64_STANDARD.decode(s), "base64";
}

fn ip_bytes<const N: usize>(b: &[u8]) -> Result<[u8; N], Error> {
    // Prefix forms may truncate trailing zero bytes.
    if b.len() > N {
        return Err(Error::semantic("invalid IP address length"));
    }
    let mut out = [0u8; N];
    out[..b.len()].copy_from_slice(b);
    Ok(out)
}

macro_rules! ip_addr {
    ( $( $addr:ty, $net:ty, $tag:path, $n:expr ; )* ) => {
        $(
            impl FromCbor for $addr {
                type Error = Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    parse_value(data, |item, shortest, tags| {
                        use decode::Item as I;
                        match (decode::effective_tags(tags).as_slice(), item) {
                            ([$tag], I::Bytes { data, .. }) => {
                                if data.len() != $n {
                                    return Err(Error::semantic("invalid IP address length"));
                                }
                                Ok((<$addr>::from(ip_bytes::<{ $n }>(data)?), shortest))
                            }
                            ([$tag], item) => Err(Error::semantic(
                                format!("invalid IP address content: {}", item.kind()),
                            )),
                            (_, item) => Err(Error::type_mismatch(item.kind(), stringify!($addr), 0)),
                        }
                    })
                    .map(|((v, s), len)| (v, s, len))
                }
            }

            impl ToCbor for $addr {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(6, $tag);
                    let octets = self.octets();
                    encoder.emit_uint_minor(2, octets.len() as u64);
                    encoder.emit_raw(&octets);
                }
            }

            impl FromCbor for $net {
                type Error = Error;

                fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
                    let (v, s, len) = Value::from_cbor(data)?;
                    let kind = v.kind();
                    let Value::Tag($tag, content) = v else {
                        return Err(Error::type_mismatch(kind, stringify!($net), 0));
                    };
                    let Value::Array(items) = content.as_ref() else {
                        return Err(Error::semantic("invalid IP prefix"));
                    };
                    let (prefix_len, b) = ip_prefix_parts(items)?;
                    let addr = <$addr>::from(ip_bytes::<{ $n }>(b)?);
                    let net = <$net>::new(addr, prefix_len)
                        .map_err(|_| Error::semantic("invalid IP prefix length"))?;
                    Ok((net, s, len))
                }
            }

            impl ToCbor for $net {
                fn to_cbor(&self, encoder: &mut Encoder) {
                    encoder.emit_uint_minor(6, $tag);
                    encoder.emit_array(Some(2), |a| {
                        a.emit(&(self.prefix_len() as u64));
                        // Trailing zero bytes of the address are trimmed.
                        let octets = self.network().octets();
                        let keep = octets.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                        a.emit(&Bytes(&octets[..keep]));
                    });
                }
            }
        )*
    };
}

ip_addr! {
    Ipv4Addr, Ipv4Net, IPV4, 4;
    Ipv6Addr, Ipv6Net, IPV6, 16;
}

/// The decoded meaning of a standard tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Semantic {
    DateTime(OffsetDateTime),
    /// Tag 1 with a NaN epoch: no instant at all.
    Undefined,
    Int(i64),
    BigInt(BigInt),
    Bigfloat(Bigfloat),
    ExpectedBase64Url(ExpectedBase64Url),
    ExpectedBase64(ExpectedBase64),
    ExpectedBase16(ExpectedBase16),
    EncodedData(EncodedData),
    Uri(Uri),
    Base64Url(Base64UrlString),
    Base64(Base64String),
    Ipv4Addr(Ipv4Addr),
    Ipv4Prefix(Ipv4Net),
    Ipv6Addr(Ipv6Addr),
    Ipv6Prefix(Ipv6Net),
    /// Self-described content, reserved tags, and unknown tag numbers.
    Value(Value),
}

impl Tag {
    /// Applies the standard registry to this tag.
    pub fn decode(&self) -> Result<Semantic, Error> {
        let content = &self.content;
        match self.number {
            DATETIME_STRING => match content {
                Value::Text(s) => Ok(Semantic::DateTime(datetime_from_text(s)?)),
                _ => Err(Error::semantic("invalid datetime string")),
            },
            EPOCH_DATETIME => match content {
                Value::Integer(i) => {
                    let secs = i
                        .int64()
                        .map_err(|_| Error::semantic("datetime out of range"))?;
                    let t = OffsetDateTime::from_unix_timestamp(check_epoch(secs)?)
                        .map_err(|e| Error::semantic(format!("invalid datetime: {e}")))?;
                    Ok(Semantic::DateTime(t))
                }
                Value::Float(f) if f.is_nan() => Ok(Semantic::Undefined),
                Value::Float(f) => Ok(Semantic::DateTime(epoch_from_float(*f)?)),
                _ => Err(Error::semantic("invalid epoch-based datetime")),
            },
            POSITIVE_BIGNUM => match content {
                Value::Bytes(b) => Ok(int_semantic(BigInt::from_bytes_be(Sign::Plus, b))),
                _ => Err(Error::semantic("invalid positive bignum")),
            },
            NEGATIVE_BIGNUM => match content {
                Value::Bytes(b) => Ok(int_semantic(negative_bignum(b))),
                _ => Err(Error::semantic("invalid negative bignum")),
            },
            BIGFLOAT => Ok(Semantic::Bigfloat(Bigfloat::from_content(content)?)),
            EXPECTED_BASE64URL => Ok(Semantic::ExpectedBase64Url(ExpectedBase64Url(
                content.clone(),
            ))),
            EXPECTED_BASE64 => Ok(Semantic::ExpectedBase64(ExpectedBase64(content.clone()))),
            EXPECTED_BASE16 => Ok(Semantic::ExpectedBase16(ExpectedBase16(content.clone()))),
            ENCODED_DATA => match content {
                Value::Bytes(b) => {
                    wellformed::validate(b)
                        .map_err(|e| Error::semantic(format!("invalid encoded data: {e}")))?;
                    Ok(Semantic::EncodedData(EncodedData(b.clone())))
                }
                _ => Err(Error::semantic("invalid encoded data")),
            },
            URI => match content {
                Value::Text(s) if valid_uri(s) => Ok(Semantic::Uri(Uri(s.clone()))),
                _ => Err(Error::semantic("invalid URI")),
            },
            BASE64URL => match content {
                Value::Text(s) if URL_SAFE_NO_PAD.decode(s).is_ok() => {
                    Ok(Semantic::Base64Url(Base64UrlString(s.clone())))
                }
                _ => Err(Error::semantic("invalid base64url")),
            },
            BASE64 => match content {
                Value::Text(s) if BASE64_STANDARD.decode(s).is_ok() => {
                    Ok(Semantic::Base64(Base64String(s.clone())))
                }
                _ => Err(Error::semantic("invalid base64")),
            },
            IPV4 => ipv4_semantic(content),
            IPV6 => ipv6_semantic(content),
            SELF_DESCRIBE => Ok(Semantic::Value(content.clone())),
            number => Ok(Semantic::Value(Value::Tag(number, Box::new(content.clone())))),
        }
    }
}

fn int_semantic(i: BigInt) -> Semantic {
    match i.to_i64() {
        Some(v) => Semantic::Int(v),
        None => Semantic::BigInt(i),
    }
}

fn ip_prefix_parts(items: &[Value]) -> Result<(u8, &Vec<u8>), Error> {
    let [Value::Integer(prefix_len), Value::Bytes(b)] = items else {
        return Err(Error::semantic("invalid IP prefix"));
    };
    let prefix_len = prefix_len
        .uint64()
        .ok()
        .and_then(|v| u8::try_from(v).ok())
        .ok_or_else(|| Error::semantic("invalid IP prefix length"))?;
    Ok((prefix_len, b))
}

fn ipv4_semantic(content: &Value) -> Result<Semantic, Error> {
    match content {
        Value::Bytes(b) if b.len() == 4 => Ok(Semantic::Ipv4Addr(Ipv4Addr::from(ip_bytes::<4>(b)?))),
        Value::Array(items) => {
            let (prefix_len, b) = ip_prefix_parts(items)?;
            let net = Ipv4Net::new(Ipv4Addr::from(ip_bytes::<4>(b)?), prefix_len)
                .map_err(|_| Error::semantic("invalid IP prefix length"))?;
            Ok(Semantic::Ipv4Prefix(net))
        }
        _ => Err(Error::semantic("invalid IPv4 content")),
    }
}

fn ipv6_semantic(content: &Value) -> Result<Semantic, Error> {
    match content {
        Value::Bytes(b) if b.len() == 16 => {
            Ok(Semantic::Ipv6Addr(Ipv6Addr::from(ip_bytes::<16>(b)?)))
        }
        Value::Array(items) => {
            let (prefix_len, b) = ip_prefix_parts(items)?;
            let net = Ipv6Net::new(Ipv6Addr::from(ip_bytes::<16>(b)?), prefix_len)
                .map_err(|_| Error::semantic("invalid IP prefix length"))?;
            Ok(Semantic::Ipv6Prefix(net))
        }
        _ => Err(Error::semantic("invalid IPv6 content")),
    }
}

impl ToCbor for Semantic {
    fn to_cbor(&self, encoder: &mut Encoder) {
        match self {
            Semantic::DateTime(t) => t.to_cbor(encoder),
            Semantic::Undefined => encoder.emit_raw(&[0xF7]),
            Semantic::Int(i) => i.to_cbor(encoder),
            Semantic::BigInt(i) => i.to_cbor(encoder),
            Semantic::Bigfloat(b) => b.to_cbor(encoder),
            Semantic::ExpectedBase64Url(w) => w.to_cbor(encoder),
            Semantic::ExpectedBase64(w) => w.to_cbor(encoder),
            Semantic::ExpectedBase16(w) => w.to_cbor(encoder),
            Semantic::EncodedData(d) => d.to_cbor(encoder),
            Semantic::Uri(u) => u.to_cbor(encoder),
            Semantic::Base64Url(s) => s.to_cbor(encoder),
            Semantic::Base64(s) => s.to_cbor(encoder),
            Semantic::Ipv4Addr(a) => a.to_cbor(encoder),
            Semantic::Ipv4Prefix(n) => n.to_cbor(encoder),
            Semantic::Ipv6Addr(a) => a.to_cbor(encoder),
            Semantic::Ipv6Prefix(n) => n.to_cbor(encoder),
            Semantic::Value(v) => v.to_cbor(encoder),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::from_slice;
    use crate::encode::emit;
    use hex_literal::hex;

    #[test]
    fn datetime_string() {
        let t: OffsetDateTime =
            from_slice(&hex!("c074323031332d30332d32315432303a30343a30305a")).unwrap();
        assert_eq!(t.unix_timestamp(), 1363896240);
    }

    #[test]
    fn epoch_datetime() {
        let t: OffsetDateTime = from_slice(&hex!("c11a514b67b0")).unwrap();
        assert_eq!(t.unix_timestamp(), 1363896240);
        assert_eq!(emit(&t).unwrap(), hex!("c11a514b67b0"));

        let t: OffsetDateTime = from_slice(&hex!("c1fb41d452d9ec200000")).unwrap();
        assert_eq!(t.unix_timestamp_nanos(), 1363896240_500_000_000);
    }

    #[test]
    fn epoch_range_is_enforced() {
        // 253402300800 is year 10000, one second past the window.
        assert!(from_slice::<OffsetDateTime>(&hex!("c11b0000003afff44180")).is_err());
        // 253402300799 is the last second of year 9999.
        assert!(from_slice::<OffsetDateTime>(&hex!("c11b0000003afff4417f")).is_ok());
        // -62135596800 is the first second of year 1.
        assert!(from_slice::<OffsetDateTime>(&hex!("c13b0000000e7791f6ff")).is_ok());
        assert!(from_slice::<OffsetDateTime>(&hex!("c13b0000000e7791f700")).is_err());
    }

    #[test]
    fn nan_epoch_has_no_instant() {
        let t: OffsetDateTime = from_slice(&hex!("c1f97e00")).unwrap();
        assert_eq!(t, OffsetDateTime::UNIX_EPOCH);

        let tag: Tag = from_slice(&hex!("c1f97e00")).unwrap();
        let sem = tag.decode().unwrap();
        assert_eq!(sem, Semantic::Undefined);
        assert_eq!(emit(&sem).unwrap(), hex!("f7"));
    }

    #[test]
    fn bignum_round_trip() {
        let v: BigInt = from_slice(&hex!("c249010000000000000000")).unwrap();
        assert_eq!(v, BigInt::from(u64::MAX) + 1);
        assert_eq!(emit(&v).unwrap(), hex!("c249010000000000000000"));

        let v: BigInt = from_slice(&hex!("c349010000000000000000")).unwrap();
        assert_eq!(v, -(BigInt::from(u64::MAX) + 2u8));
        assert_eq!(emit(&v).unwrap(), hex!("c349010000000000000000"));
    }

    #[test]
    fn small_bignums_compact_to_plain_integers() {
        assert_eq!(emit(&BigInt::from(42)).unwrap(), hex!("182a"));
        assert_eq!(emit(&BigInt::from(-42)).unwrap(), hex!("3829"));
        // -2^64 is still a plain negative integer.
        let v: BigInt = -(BigInt::from(u64::MAX) + 1u8);
        assert_eq!(emit(&v).unwrap(), hex!("3bffffffffffffffff"));
    }

    #[test]
    fn bigfloat() {
        // 5([-1, 3]) = 1.5
        let v: Bigfloat = from_slice(&hex!("c5822003")).unwrap();
        assert_eq!(v.exponent, -1);
        assert_eq!(v.mantissa, BigInt::from(3));
        assert_eq!(v.to_f64().unwrap(), 1.5);
        assert_eq!(emit(&v).unwrap(), hex!("c5822003"));

        // content must be a two-element array
        assert!(from_slice::<Bigfloat>(&hex!("c58101")).is_err());
        assert!(from_slice::<Bigfloat>(&hex!("c583200103")).is_err());
    }

    #[test]
    fn bigfloat_with_bignum_mantissa() {
        let v: Bigfloat = from_slice(&hex!("c58202c249010000000000000000")).unwrap();
        assert_eq!(v.mantissa, BigInt::from(u64::MAX) + 1);
        assert_eq!(v.exponent, 2);
        assert_eq!(emit(&v).unwrap(), hex!("c58202c249010000000000000000"));
    }

    #[test]
    fn encoded_data() {
        let v: EncodedData = from_slice(&hex!("d818456449455446")).unwrap();
        assert_eq!(v.0, hex!("6449455446"));
        assert_eq!(emit(&v).unwrap(), hex!("d818456449455446"));
        // content must itself be well-formed CBOR
        assert!(from_slice::<EncodedData>(&hex!("d81843ffffff")).is_err());
    }

    #[test]
    fn uri() {
        let v: Uri =
            from_slice(&hex!("d82076687474703a2f2f7777772e6578616d706c652e636f6d")).unwrap();
        assert_eq!(v.0, "http://www.example.com");
        assert_eq!(
            emit(&v).unwrap(),
            hex!("d82076687474703a2f2f7777772e6578616d706c652e636f6d")
        );
        // no scheme
        assert!(from_slice::<Uri>(&hex!("d820656162636465")).is_err());
    }

    #[test]
    fn base64_validation() {
        // 33("SGVsbG8")
        let v: Base64UrlString = from_slice(&hex!("d8216753475673624738")).unwrap();
        assert_eq!(v.0, "SGVsbG8");
        // padding is not allowed in base64url
        assert!(from_slice::<Base64UrlString>(&hex!("d82168534756736247383d")).is_err());
        // 34("SGVsbG8=")
        let v: Base64String = from_slice(&hex!("d82268534756736247383d")).unwrap();
        assert_eq!(v.0, "SGVsbG8=");
        assert!(from_slice::<Base64String>(&hex!("d8226753475673624738")).is_err());
    }

    #[test]
    fn ip_addresses() {
        // 52(h'c0000201')
        let v: Ipv4Addr = from_slice(&hex!("d83444c0000201")).unwrap();
        assert_eq!(v, Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(emit(&v).unwrap(), hex!("d83444c0000201"));

        // 52([24, h'c00002'])
        let v: Ipv4Net = from_slice(&hex!("d834821818 43c00002")).unwrap();
        assert_eq!(v, Ipv4Net::new(Ipv4Addr::new(192, 0, 2, 0), 24).unwrap());
        assert_eq!(emit(&v).unwrap(), hex!("d834821818 43c00002"));

        // 54(h'20010db8000000000000000000000001')
        let v: Ipv6Addr = from_slice(&hex!("d8365020010db8000000000000000000000001")).unwrap();
        assert_eq!(emit(&v).unwrap(), hex!("d8365020010db8000000000000000000000001"));
    }

    #[test]
    fn self_describe_is_transparent() {
        let v: u64 = from_slice(&hex!("d9d9f700")).unwrap();
        assert_eq!(v, 0);
        let tag: Tag = from_slice(&hex!("d9d9f700")).unwrap();
        assert_eq!(tag.decode().unwrap(), Semantic::Value(Value::Integer(0u64.into())));
    }

    #[test]
    fn unknown_tags_pass_through() {
        let tag: Tag = from_slice(&hex!("d9303900")).unwrap();
        assert!(matches!(tag.decode().unwrap(), Semantic::Value(Value::Tag(12345, _))));
    }

    #[test]
    fn expected_base64_json() {
        // 21({"data": h'12345678'})
        let v: ExpectedBase64Url = from_slice(&hex!("d5a164646174614412345678")).unwrap();
        assert_eq!(v.to_json()["data"], serde_json::json!("EjRWeA"));

        let v: ExpectedBase16 = from_slice(&hex!("d7a164646174614412345678")).unwrap();
        assert_eq!(v.to_json()["data"], serde_json::json!("12345678"));
    }
}
