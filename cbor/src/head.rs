use crate::decode::Error;

pub(crate) fn to_array<const N: usize>(data: &[u8], off: usize) -> Result<[u8; N], Error> {
    match data.len().checked_sub(off) {
        Some(n) if n >= N => Ok(data[off..off + N].try_into().unwrap()),
        _ => Err(Error::UnexpectedEnd(data.len())),
    }
}

/// Reads the argument following an initial byte with the given
/// additional-information bits, advancing `off` past the argument bytes.
///
/// Returns the argument and whether it was encoded in the shortest form that
/// can hold it (preferred serialization, RFC 8949 §4.1). Reserved codes
/// 28..=30 and the indefinite-length code 31 are rejected; callers that
/// accept indefinite lengths handle code 31 before calling this.
pub(crate) fn uint_argument(minor: u8, data: &[u8], off: &mut usize) -> Result<(u64, bool), Error> {
    match minor {
        v if v < 24 => Ok((v as u64, true)),
        24 => {
            let b = *data.get(*off).ok_or(Error::UnexpectedEnd(data.len()))?;
            *off += 1;
            Ok((b as u64, b >= 24))
        }
        25 => {
            let v = u16::from_be_bytes(to_array(data, *off)?);
            *off += 2;
            Ok((v as u64, v > u8::MAX as u16))
        }
        26 => {
            let v = u32::from_be_bytes(to_array(data, *off)?);
            *off += 4;
            Ok((v as u64, v > u16::MAX as u32))
        }
        27 => {
            let v = u64::from_be_bytes(to_array(data, *off)?);
            *off += 8;
            Ok((v, v > u32::MAX as u64))
        }
        v => Err(Error::ReservedAi(v, off.saturating_sub(1))),
    }
}

/// Writes a head with the shortest argument encoding.
pub(crate) fn emit_uint(out: &mut Vec<u8>, major: u8, val: u64) {
    if val < 24 {
        out.push((major << 5) | val as u8);
    } else if val <= u8::MAX as u64 {
        out.push((major << 5) | 24);
        out.push(val as u8);
    } else if val <= u16::MAX as u64 {
        out.push((major << 5) | 25);
        out.extend((val as u16).to_be_bytes());
    } else if val <= u32::MAX as u64 {
        out.push((major << 5) | 26);
        out.extend((val as u32).to_be_bytes());
    } else {
        out.push((major << 5) | 27);
        out.extend(val.to_be_bytes());
    }
}
