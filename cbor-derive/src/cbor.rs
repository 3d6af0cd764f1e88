//! Just enough of a CBOR encoder to pre-compute field keys at macro
//! expansion time, so map-mode fields can be sorted by their encoded bytes
//! once instead of per instance.

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

pub(crate) fn int_key_bytes(key: i64) -> Vec<u8> {
    let mut out = Vec::new();
    if key >= 0 {
        emit_uint(&mut out, 0, key as u64);
    } else {
        emit_uint(&mut out, 1, !key as u64);
    }
    out
}

pub(crate) fn text_key_bytes(key: &str) -> Vec<u8> {
    let mut out = Vec::new();
    emit_uint(&mut out, 3, key.len() as u64);
    out.extend_from_slice(key.as_bytes());
    out
}
