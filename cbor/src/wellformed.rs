//! Structural validation of encoded items without building host values.
//!
//! [`validate`] is run over the full input by [`crate::decode::from_slice`]
//! before any destination value is constructed, so malformed input never
//! leaves a partially-filled result behind. [`item`] measures a single item
//! and doubles as the skip primitive and the stream decoder's boundary
//! oracle.

use crate::MAX_DEPTH;
use crate::decode::Error;
use crate::head;

pub fn well_formed(data: &[u8]) -> bool {
    validate(data).is_ok()
}

/// Checks that `data` holds exactly one well-formed item with nothing after
/// it.
pub fn validate(data: &[u8]) -> Result<(), Error> {
    let n = item(data)?;
    if n != data.len() {
        return Err(Error::TrailingData(n));
    }
    Ok(())
}

/// Checks one item at the front of `data` and returns its encoded length.
pub fn item(data: &[u8]) -> Result<usize, Error> {
    let mut off = 0;
    check(data, &mut off, MAX_DEPTH)?;
    Ok(off)
}

fn peek_break(data: &[u8], off: &mut usize) -> Result<bool, Error> {
    let b = *data.get(*off).ok_or(Error::UnexpectedEnd(data.len()))?;
    if b == 0xFF {
        *off += 1;
        Ok(true)
    } else {
        Ok(false)
    }
}

fn skip_payload(data: &[u8], off: &mut usize, n: u64) -> Result<(), Error> {
    let n = usize::try_from(n).map_err(|_| Error::UnexpectedEnd(data.len()))?;
    let end = off
        .checked_add(n)
        .filter(|e| *e <= data.len())
        .ok_or(Error::UnexpectedEnd(data.len()))?;
    *off = end;
    Ok(())
}

fn check(data: &[u8], off: &mut usize, depth: usize) -> Result<(), Error> {
    if depth == 0 {
        return Err(Error::MaxRecursion);
    }
    let ib = *data.get(*off).ok_or(Error::UnexpectedEnd(data.len()))?;
    *off += 1;
    let minor = ib & 0x1F;

    match ib >> 5 {
        0 | 1 => {
            head::uint_argument(minor, data, off)?;
        }
        2 | 3 => {
            if minor == 31 {
                loop {
                    let c = *data.get(*off).ok_or(Error::UnexpectedEnd(data.len()))?;
                    if c == 0xFF {
                        *off += 1;
                        break;
                    }
                    // Chunks share the outer major type and are themselves
                    // definite-length.
                    if c >> 5 != ib >> 5 || c & 0x1F == 31 {
                        return Err(Error::InvalidChunk(*off));
                    }
                    *off += 1;
                    let (n, _) = head::uint_argument(c & 0x1F, data, off)?;
                    skip_payload(data, off, n)?;
                }
            } else {
                let (n, _) = head::uint_argument(minor, data, off)?;
                skip_payload(data, off, n)?;
            }
        }
        4 => {
            if minor == 31 {
                while !peek_break(data, off)? {
                    check(data, off, depth - 1)?;
                }
            } else {
                let (n, _) = head::uint_argument(minor, data, off)?;
                for _ in 0..n {
                    check(data, off, depth - 1)?;
                }
            }
        }
        5 => {
            if minor == 31 {
                while !peek_break(data, off)? {
                    check(data, off, depth - 1)?;
                    if data.get(*off) == Some(&0xFF) {
                        return Err(Error::PartialMap(*off));
                    }
                    check(data, off, depth - 1)?;
                }
            } else {
                let (n, _) = head::uint_argument(minor, data, off)?;
                for _ in 0..n {
                    check(data, off, depth - 1)?;
                    check(data, off, depth - 1)?;
                }
            }
        }
        6 => {
            head::uint_argument(minor, data, off)?;
            check(data, off, depth - 1)?;
        }
        7 => match minor {
            0..=23 => {}
            24 => {
                let v = *data.get(*off).ok_or(Error::UnexpectedEnd(data.len()))?;
                // The two-byte simple form below 32 is reserved.
                if v < 32 {
                    return Err(Error::InvalidSimple(v, *off));
                }
                *off += 1;
            }
            25 => skip_payload(data, off, 2)?,
            26 => skip_payload(data, off, 4)?,
            27 => skip_payload(data, off, 8)?,
            31 => return Err(Error::UnexpectedBreak(*off - 1)),
            v => return Err(Error::ReservedAi(v, *off - 1)),
        },
        _ => unreachable!(),
    }
    Ok(())
}
