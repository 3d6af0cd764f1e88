//! The wide integer carrier.
//!
//! CBOR majors 0 and 1 cover `-2^64 ..= 2^64-1`, which no native integer
//! holds. [`Integer`] carries the full range as sign plus magnitude, where
//! `sign == true` means the value is `-1 - magnitude`.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;

use crate::decode::{Error, FromCbor, Item, parse_value};
use crate::encode::{Encoder, ToCbor};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Integer {
    pub sign: bool,
    pub magnitude: u64,
}

impl Integer {
    /// The value when it fits a signed 64-bit integer.
    pub fn int64(self) -> Result<i64, Error> {
        i64::try_from(self.as_i128())
            .map_err(|_| Error::semantic("integer overflows 64 bits"))
    }

    /// The magnitude when the value is nonnegative.
    pub fn uint64(self) -> Result<u64, Error> {
        if self.sign {
            Err(Error::semantic("integer overflows 64 bits"))
        } else {
            Ok(self.magnitude)
        }
    }

    pub fn as_i128(self) -> i128 {
        if self.sign {
            -1 - self.magnitude as i128
        } else {
            self.magnitude as i128
        }
    }

    pub fn to_bigint(self) -> BigInt {
        BigInt::from(self.as_i128())
    }
}

impl From<u64> for Integer {
    fn from(v: u64) -> Integer {
        Integer { sign: false, magnitude: v }
    }
}

impl From<i64> for Integer {
    fn from(v: i64) -> Integer {
        if v < 0 {
            Integer { sign: true, magnitude: !v as u64 }
        } else {
            Integer { sign: false, magnitude: v as u64 }
        }
    }
}

impl TryFrom<i128> for Integer {
    type Error = Error;

    fn try_from(v: i128) -> Result<Integer, Error> {
        if v >= 0 {
            u64::try_from(v)
                .map(Integer::from)
                .map_err(|_| Error::semantic("integer out of CBOR range"))
        } else {
            u64::try_from(-1 - v)
                .map(|m| Integer { sign: true, magnitude: m })
                .map_err(|_| Error::semantic("integer out of CBOR range"))
        }
    }
}

impl PartialOrd for Integer {
    fn partial_cmp(&self, other: &Integer) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Integer {
    fn cmp(&self, other: &Integer) -> std::cmp::Ordering {
        self.as_i128().cmp(&other.as_i128())
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign {
            if self.magnitude == u64::MAX {
                f.write_str("-18446744073709551616")
            } else {
                write!(f, "-{}", self.magnitude + 1)
            }
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

impl FromStr for Integer {
    type Err = Error;

    /// Parses decimal with an optional `+` or `-` sign. The accumulator is
    /// 128-bit, so anything past the CBOR integer range is an overflow
    /// rather than a wraparound.
    fn from_str(s: &str) -> Result<Integer, Error> {
        let v = i128::from_str(s).map_err(|e| Error::semantic(format!("invalid integer: {e}")))?;
        Integer::try_from(v)
    }
}

impl FromCbor for Integer {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, bool, usize), Self::Error> {
        parse_value(data, |item, shortest, tags| {
            if !tags.is_empty() {
                return Err(Error::type_mismatch("tag", "Integer", 0));
            }
            match item {
                Item::Integer(i) => Ok((i, shortest)),
                item => Err(Error::type_mismatch(item.kind(), "Integer", 0)),
            }
        })
        .map(|((v, s), len)| (v, s, len))
    }
}

impl ToCbor for Integer {
    fn to_cbor(&self, encoder: &mut Encoder) {
        encoder.emit_uint_minor(if self.sign { 1 } else { 0 }, self.magnitude);
    }

    fn is_empty_value(&self) -> bool {
        !self.sign && self.magnitude == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;
    use crate::encode;
    use hex_literal::hex;

    #[test]
    fn display_covers_the_full_range() {
        assert_eq!(Integer::from(0u64).to_string(), "0");
        assert_eq!(Integer::from(-1i64).to_string(), "-1");
        assert_eq!(Integer::from(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(
            Integer { sign: true, magnitude: u64::MAX }.to_string(),
            "-18446744073709551616"
        );
    }

    #[test]
    fn from_str_round_trips() {
        for s in ["0", "1", "-1", "18446744073709551615", "-18446744073709551616"] {
            assert_eq!(s.parse::<Integer>().unwrap().to_string(), s);
        }
        assert_eq!("+42".parse::<Integer>().unwrap(), Integer::from(42u64));
        assert!("18446744073709551616".parse::<Integer>().is_err());
        assert!("-18446744073709551617".parse::<Integer>().is_err());
        assert!("170141183460469231731687303715884105728".parse::<Integer>().is_err());
    }

    #[test]
    fn int64_and_uint64_overflow() {
        assert_eq!(Integer::from(7i64).int64().unwrap(), 7);
        assert!(Integer::from(u64::MAX).int64().is_err());
        assert!(Integer { sign: true, magnitude: u64::MAX }.int64().is_err());
        assert_eq!(Integer::from(u64::MAX).uint64().unwrap(), u64::MAX);
        assert!(Integer::from(-1i64).uint64().is_err());
    }

    #[test]
    fn wire_round_trip() {
        let v: Integer = decode::from_slice(&hex!("3bffffffffffffffff")).unwrap();
        assert_eq!(v, Integer { sign: true, magnitude: u64::MAX });
        assert_eq!(encode::emit(&v).unwrap(), hex!("3bffffffffffffffff"));

        let v: Integer = decode::from_slice(&hex!("1bffffffffffffffff")).unwrap();
        assert_eq!(encode::emit(&v).unwrap(), hex!("1bffffffffffffffff"));
    }

    #[test]
    fn ordering_is_numeric() {
        let min = Integer { sign: true, magnitude: u64::MAX };
        assert!(min < Integer::from(-1i64));
        assert!(Integer::from(-1i64) < Integer::from(0u64));
        assert!(Integer::from(0u64) < Integer::from(u64::MAX));
    }
}
