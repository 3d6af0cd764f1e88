use crate::encode::*;
use crate::integer::Integer;
use crate::value::{Simple, Value};
use hex_literal::hex;

#[test]
fn rfc_tests() {
    // RFC 8949, Appendix A
    assert_eq!(emit(&0u64).unwrap(), hex!("00"));
    assert_eq!(emit(&1u64).unwrap(), hex!("01"));
    assert_eq!(emit(&10u64).unwrap(), hex!("0a"));
    assert_eq!(emit(&23u64).unwrap(), hex!("17"));
    assert_eq!(emit(&24u64).unwrap(), hex!("1818"));
    assert_eq!(emit(&25u64).unwrap(), hex!("1819"));
    assert_eq!(emit(&100u64).unwrap(), hex!("1864"));
    assert_eq!(emit(&1000u64).unwrap(), hex!("1903e8"));
    assert_eq!(emit(&1000000u64).unwrap(), hex!("1a000f4240"));
    assert_eq!(emit(&1000000000000u64).unwrap(), hex!("1b000000e8d4a51000"));
    assert_eq!(emit(&u64::MAX).unwrap(), hex!("1bffffffffffffffff"));

    assert_eq!(emit(&-1i64).unwrap(), hex!("20"));
    assert_eq!(emit(&-10i64).unwrap(), hex!("29"));
    assert_eq!(emit(&-100i64).unwrap(), hex!("3863"));
    assert_eq!(emit(&-1000i64).unwrap(), hex!("3903e7"));
    assert_eq!(
        emit(&Integer { sign: true, magnitude: u64::MAX }).unwrap(),
        hex!("3bffffffffffffffff")
    );

    assert_eq!(emit(&false).unwrap(), hex!("f4"));
    assert_eq!(emit(&true).unwrap(), hex!("f5"));
    assert_eq!(emit(&None::<u64>).unwrap(), hex!("f6"));
    assert_eq!(emit(&Value::Undefined).unwrap(), hex!("f7"));
    assert_eq!(emit(&Simple(16)).unwrap(), hex!("f0"));
    assert_eq!(emit(&Simple(255)).unwrap(), hex!("f8ff"));

    assert_eq!(emit(&"").unwrap(), hex!("60"));
    assert_eq!(emit(&"a").unwrap(), hex!("6161"));
    assert_eq!(emit(&"IETF").unwrap(), hex!("6449455446"));
    assert_eq!(emit(&"\"\\").unwrap(), hex!("62225c"));
    assert_eq!(emit(&"\u{00fc}").unwrap(), hex!("62c3bc"));
    assert_eq!(emit(&"\u{6c34}").unwrap(), hex!("63e6b0b4"));

    assert_eq!(emit(&Bytes(b"")).unwrap(), hex!("40"));
    assert_eq!(emit(&Bytes(hex!("01020304"))).unwrap(), hex!("4401020304"));

    assert_eq!(emit(&[0u64; 0]).unwrap(), hex!("80"));
    assert_eq!(emit(&[1u64, 2, 3]).unwrap(), hex!("83010203"));
    assert_eq!(
        emit(&(1..=25).collect::<Vec<u64>>()).unwrap(),
        hex!("98190102030405060708090a0b0c0d0e0f101112131415161718181819")
    );

    assert_eq!(
        emit_tagged(&"2013-03-21T20:04:00Z", [0u64]).unwrap(),
        hex!("c074323031332d30332d32315432303a30343a30305a")
    );
    assert_eq!(emit_tagged(&1363896240u64, [1u64]).unwrap(), hex!("c11a514b67b0"));
    assert_eq!(
        emit_tagged(&1363896240.5f64, [1u64]).unwrap(),
        hex!("c1fb41d452d9ec200000")
    );
    assert_eq!(
        emit_tagged(&Bytes(hex!("01020304")), [23u64]).unwrap(),
        hex!("d74401020304")
    );
    assert_eq!(
        emit_tagged(&Bytes(hex!("6449455446")), [24u64]).unwrap(),
        hex!("d818456449455446")
    );
    assert_eq!(
        emit_tagged(&"http://www.example.com", [32u64]).unwrap(),
        hex!("d82076687474703a2f2f7777772e6578616d706c652e636f6d")
    );
}

#[test]
fn float_compaction() {
    assert_eq!(emit(&0.0f64).unwrap(), hex!("f90000"));
    assert_eq!(emit(&-0.0f64).unwrap(), hex!("f98000"));
    assert_eq!(emit(&1.0f64).unwrap(), hex!("f93c00"));
    assert_eq!(emit(&1.1f64).unwrap(), hex!("fb3ff199999999999a"));
    assert_eq!(emit(&1.5f64).unwrap(), hex!("f93e00"));
    assert_eq!(emit(&65504.0f64).unwrap(), hex!("f97bff"));
    assert_eq!(emit(&100000.0f64).unwrap(), hex!("fa47c35000"));
    assert_eq!(emit(&3.4028234663852886e38).unwrap(), hex!("fa7f7fffff"));
    assert_eq!(emit(&1.0e300).unwrap(), hex!("fb7e37e43c8800759c"));
    assert_eq!(emit(&5.960464477539063e-8).unwrap(), hex!("f90001"));
    assert_eq!(emit(&0.00006103515625f64).unwrap(), hex!("f90400"));
    assert_eq!(emit(&-4.0f64).unwrap(), hex!("f9c400"));
    assert_eq!(emit(&-4.1f64).unwrap(), hex!("fbc010666666666666"));

    // infinities compact to half precision from any width
    assert_eq!(emit(&f64::INFINITY).unwrap(), hex!("f97c00"));
    assert_eq!(emit(&f64::NEG_INFINITY).unwrap(), hex!("f9fc00"));
    assert_eq!(emit(&f32::INFINITY).unwrap(), hex!("f97c00"));

    // every NaN becomes the canonical quiet half-precision NaN
    assert_eq!(emit(&f64::NAN).unwrap(), hex!("f97e00"));
    assert_eq!(emit(&f32::NAN).unwrap(), hex!("f97e00"));
    assert_eq!(
        emit(&f64::from_bits(0xfff0_0000_0000_0001)).unwrap(),
        hex!("f97e00")
    );

    assert_eq!(emit(&half::f16::from_f32(1.5)).unwrap(), hex!("f93e00"));
}

#[test]
fn canonical_map_key_order() {
    // Entries given in insertion order; the output must sort the encoded
    // keys bytewise: 10, 100, -1, "z", "aa", [100], [-1], false.
    let map = Value::Map(vec![
        (Value::Text("aa".into()), Value::Integer(5u64.into())),
        (Value::Bool(false), Value::Integer(8u64.into())),
        (Value::Integer(100u64.into()), Value::Integer(2u64.into())),
        (
            Value::Array(vec![Value::Integer(Integer::from(-1i64))]),
            Value::Integer(7u64.into()),
        ),
        (Value::Integer(Integer::from(-1i64)), Value::Integer(3u64.into())),
        (Value::Text("z".into()), Value::Integer(4u64.into())),
        (
            Value::Array(vec![Value::Integer(100u64.into())]),
            Value::Integer(6u64.into()),
        ),
        (Value::Integer(10u64.into()), Value::Integer(1u64.into())),
    ]);
    assert_eq!(
        emit(&map).unwrap(),
        hex!("a8 0a01 186402 2003 617a04 62616105 81186406 812007 f408")
    );
}

#[test]
fn collection_maps_sort_canonically() {
    let mut m = std::collections::HashMap::new();
    m.insert(String::from("aa"), 1u64);
    m.insert(String::from("b"), 2u64);
    m.insert(String::from("a"), 3u64);
    // one-byte-longer keys sort after shorter ones of the same prefix
    assert_eq!(emit(&m).unwrap(), hex!("a3 616103 616202 62616101"));

    let mut m = std::collections::BTreeMap::new();
    m.insert(100u64, 0u64);
    m.insert(10u64, 0u64);
    m.insert(1000u64, 0u64);
    assert_eq!(emit(&m).unwrap(), hex!("a3 0a00 186400 1903e800"));
}

#[test]
fn indefinite_stream_builders() {
    let mut e = Encoder::new();
    e.emit_byte_stream(|s| {
        s.emit(hex!("0102"));
        s.emit(hex!("030405"));
    });
    assert_eq!(e.finish().unwrap(), hex!("5f42010243030405ff"));

    let mut e = Encoder::new();
    e.emit_text_stream(|s| {
        s.emit("strea");
        s.emit("ming");
    });
    assert_eq!(e.finish().unwrap(), hex!("7f657374726561646d696e67ff"));
}

#[test]
fn definite_builders_enforce_counts() {
    let mut e = Encoder::new();
    e.emit_array(Some(2), |a| {
        a.emit(&1u64);
        a.emit(&"2");
    });
    assert_eq!(e.finish().unwrap(), hex!("82016132"));

    let r = std::panic::catch_unwind(|| {
        let mut e = Encoder::new();
        e.emit_array(Some(2), |a| {
            a.emit(&1u64);
        });
        e.finish()
    });
    assert!(r.is_err());
}

#[test]
fn reserved_simple_values_fail() {
    assert!(matches!(emit(&Simple(24)), Err(Error::UnsupportedValue(_))));
    assert!(matches!(emit(&Simple(31)), Err(Error::UnsupportedValue(_))));
    assert_eq!(emit(&Simple(32)).unwrap(), hex!("f820"));
}

#[test]
fn depth_limit_stops_runaway_nesting() {
    let mut v = Value::Integer(0u64.into());
    for _ in 0..1100 {
        v = Value::Array(vec![v]);
    }
    assert!(matches!(emit(&v), Err(Error::MaxRecursion)));
}

#[test]
fn lossy_text_replaces_invalid_sequences() {
    assert_eq!(emit(&LossyText(b"a\xffb")).unwrap(), hex!("6561efbfbd62"));
}

#[test]
fn value_round_trip_is_canonical() {
    use crate::decode::from_slice;

    // non-preferred encodings decode and re-encode canonically
    for (input, canonical) in [
        (&hex!("1900ff")[..], &hex!("18ff")[..]),
        (&hex!("fa3fc00000")[..], &hex!("f93e00")[..]),
        (&hex!("5f42010243030405ff")[..], &hex!("450102030405")[..]),
        (&hex!("9f018202039f0405ffff")[..], &hex!("8301820203820405")[..]),
        (&hex!("a2616202616101")[..], &hex!("a2616101616202")[..]),
    ] {
        let v: Value = from_slice(input).unwrap();
        assert_eq!(emit(&v).unwrap(), canonical, "{input:02x?}");
    }
}
