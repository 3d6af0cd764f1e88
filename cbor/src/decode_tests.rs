use crate::decode::*;
use crate::encode::Bytes;
use crate::value::Simple;
use hex_literal::hex;

fn test_simple<T>(expected: T, data: &[u8])
where
    T: FromCbor<Error = Error> + PartialEq + std::fmt::Debug,
{
    let (v, shortest, len) = parse::<(T, bool, usize)>(data).unwrap();
    assert!(shortest, "{data:02x?}");
    assert_eq!(len, data.len());
    assert_eq!(v, expected);
}

fn test_item<F>(data: &[u8], expected_tags: &[u64], f: F)
where
    F: FnOnce(Item),
{
    assert_eq!(
        parse_value(data, |item, _, tags| {
            assert_eq!(tags, expected_tags);
            f(item);
            Ok::<_, Error>(())
        })
        .unwrap()
        .1,
        data.len()
    );
}

fn test_string(expected: &str, data: &[u8]) {
    test_item(data, &[], |v| {
        assert!(matches!(v, Item::Text { data, chunked: false } if data == expected))
    })
}

fn test_array<F>(is_definite: bool, data: &[u8], f: F)
where
    F: FnOnce(&mut Array),
{
    test_item(data, &[], |v| match v {
        Item::Array(a) => {
            assert_eq!(is_definite, a.is_definite());
            f(a)
        }
        _ => panic!("not an array"),
    })
}

fn test_map<F>(is_definite: bool, data: &[u8], f: F)
where
    F: FnOnce(&mut Map),
{
    test_item(data, &[], |v| match v {
        Item::Map(m) => {
            assert_eq!(is_definite, m.is_definite());
            f(m)
        }
        _ => panic!("not a map"),
    })
}

#[test]
fn rfc_unsigned_integers() {
    // RFC 8949, Appendix A
    test_simple(0u64, &hex!("00"));
    test_simple(1u64, &hex!("01"));
    test_simple(10u64, &hex!("0a"));
    test_simple(23u64, &hex!("17"));
    test_simple(24u64, &hex!("1818"));
    test_simple(25u64, &hex!("1819"));
    test_simple(100u64, &hex!("1864"));
    test_simple(1000u64, &hex!("1903e8"));
    test_simple(1000000u64, &hex!("1a000f4240"));
    test_simple(1000000000000u64, &hex!("1b000000e8d4a51000"));
    test_simple(18446744073709551615u64, &hex!("1bffffffffffffffff"));

    // bignums do not fit native integer destinations
    assert!(parse::<u64>(&hex!("c249010000000000000000")).is_err());
    assert!(parse::<i64>(&hex!("3bffffffffffffffff")).is_err());
}

#[test]
fn rfc_negative_integers() {
    test_simple(-1i64, &hex!("20"));
    test_simple(-10i64, &hex!("29"));
    test_simple(-100i64, &hex!("3863"));
    test_simple(-1000i64, &hex!("3903e7"));
    test_simple(i64::MIN, &hex!("3b7fffffffffffffff"));
    assert!(parse::<i64>(&hex!("3b8000000000000000")).is_err());
}

#[test]
fn narrow_integer_destinations_overflow() {
    test_simple(255u8, &hex!("18ff"));
    assert!(parse::<u8>(&hex!("190100")).is_err());
    test_simple(-128i8, &hex!("387f"));
    assert!(parse::<i8>(&hex!("388f")).is_err());
    // negative integers never fit unsigned destinations
    assert!(parse::<u64>(&hex!("20")).is_err());
    // integers never silently become floats
    assert!(parse::<f64>(&hex!("01")).is_err());
}

#[test]
fn rfc_floats() {
    test_simple(0.0f64, &hex!("f90000"));
    test_simple(-0.0f64, &hex!("f98000"));
    test_simple(1.0f64, &hex!("f93c00"));
    test_simple(1.1f64, &hex!("fb3ff199999999999a"));
    test_simple(1.5f64, &hex!("f93e00"));
    test_simple(65504.0f64, &hex!("f97bff"));
    test_simple(100000.0f64, &hex!("fa47c35000"));
    test_simple(3.4028234663852886e38f64, &hex!("fa7f7fffff"));
    test_simple(1.0e300f64, &hex!("fb7e37e43c8800759c"));
    test_simple(5.960464477539063e-8f64, &hex!("f90001"));
    test_simple(0.00006103515625f64, &hex!("f90400"));
    test_simple(-4.0f64, &hex!("f9c400"));
    test_simple(-4.1f64, &hex!("fbc010666666666666"));
    test_simple(f64::INFINITY, &hex!("f97c00"));
    test_simple(f64::NEG_INFINITY, &hex!("f9fc00"));

    // every NaN decodes to a NaN, whatever its payload
    for data in [
        &hex!("f97e00")[..],
        &hex!("f97c01"),
        &hex!("fa7fc00000"),
        &hex!("fa7f800001"),
        &hex!("fb7ff8000000000000"),
        &hex!("fb7ff0000000000001"),
    ] {
        assert!(parse::<f64>(data).unwrap().is_nan(), "{data:02x?}");
    }

    // wider-than-needed encodings decode fine but are not preferred
    let (v, shortest, _) = parse::<(f64, bool, usize)>(&hex!("fa3fc00000")).unwrap();
    assert_eq!(v, 1.5);
    assert!(!shortest);
}

#[test]
fn float_destination_range() {
    test_simple(100000.0f32, &hex!("fa47c35000"));
    // magnitude beyond f32 range is an error, precision loss is not
    assert!(parse::<f32>(&hex!("fb7e37e43c8800759c")).is_err());
    test_simple(1.1f64 as f32, &hex!("fb3ff199999999999a"));
    test_simple(f32::INFINITY, &hex!("f97c00"));
}

#[test]
fn rfc_simple_values() {
    test_simple(false, &hex!("f4"));
    test_simple(true, &hex!("f5"));
    test_simple(None::<u64>, &hex!("f6"));
    test_simple(None::<u64>, &hex!("f7"));
    test_simple(Some(1u64), &hex!("01"));
    test_simple(Simple(16), &hex!("f0"));
    test_simple(Simple(255), &hex!("f8ff"));
    assert!(parse::<Simple>(&hex!("f800")).is_err());
    assert!(parse::<Simple>(&hex!("f81f")).is_err());
}

#[test]
fn rfc_strings() {
    test_string("", &hex!("60"));
    test_string("a", &hex!("6161"));
    test_string("IETF", &hex!("6449455446"));
    test_string("\"\\", &hex!("62225c"));
    test_string("\u{00fc}", &hex!("62c3bc"));
    test_string("\u{6c34}", &hex!("63e6b0b4"));
    test_string("\u{10151}", &hex!("64f0908591"));

    test_simple(String::from("IETF"), &hex!("6449455446"));
    test_simple(Bytes(Vec::<u8>::new()), &hex!("40"));
    test_simple(Bytes(vec![0x01u8, 0x02, 0x03, 0x04]), &hex!("4401020304"));
}

#[test]
fn invalid_utf8_is_a_syntax_error() {
    assert!(matches!(
        parse::<String>(&hex!("62c328")),
        Err(Error::InvalidUtf8(_))
    ));
    // a chunk boundary inside a multi-byte sequence is fine as long as the
    // concatenation is valid
    test_item(&hex!("7f61c361a9ff"), &[], |v| {
        assert!(matches!(v, Item::Text { data, chunked: true } if data == "\u{e9}"))
    });
    // and invalid as a whole is still rejected
    assert!(matches!(
        parse::<String>(&hex!("7f61c3ff")),
        Err(Error::InvalidUtf8(_))
    ));
}

#[test]
fn indefinite_strings_concatenate() {
    test_item(&hex!("5f42010243030405ff"), &[], |v| {
        assert!(matches!(v, Item::Bytes { data, chunked: true } if data == hex!("0102030405")))
    });
    test_item(&hex!("7f657374726561646d696e67ff"), &[], |v| {
        assert!(matches!(v, Item::Text { data, chunked: true } if data == "streaming"))
    });
    test_item(&hex!("5fff"), &[], |v| {
        assert!(matches!(v, Item::Bytes { data, chunked: true } if data.is_empty()))
    });

    // chunk of the wrong major type
    assert!(parse::<Bytes<Vec<u8>>>(&hex!("5f6161ff")).is_err());
    // nested indefinite chunk
    assert!(parse::<Bytes<Vec<u8>>>(&hex!("5f5f4100ffff")).is_err());
}

#[test]
fn rfc_arrays() {
    test_simple(Vec::<u64>::new(), &hex!("80"));
    test_simple(vec![1u64, 2, 3], &hex!("83010203"));
    test_simple(
        (1..=25).collect::<Vec<u64>>(),
        &hex!("98190102030405060708090a0b0c0d0e0f101112131415161718181819"),
    );

    test_array(true, &hex!("8301820203820405"), |a| {
        assert_eq!(a.len(), Some(3));
        assert_eq!(a.parse::<u64>().unwrap(), 1);
        assert_eq!(a.parse::<Vec<u64>>().unwrap(), vec![2, 3]);
        assert_eq!(a.parse::<Vec<u64>>().unwrap(), vec![4, 5]);
        assert_eq!(a.consumed(), 3);
    });
}

#[test]
fn indefinite_arrays() {
    test_simple(Vec::<u64>::new(), &hex!("9fff"));
    test_simple(vec![1u64, 2, 3], &hex!("9f010203ff"));
    test_array(false, &hex!("9f018202039f0405ffff"), |a| {
        assert_eq!(a.len(), None);
        assert_eq!(a.parse::<u64>().unwrap(), 1);
        assert_eq!(a.parse::<Vec<u64>>().unwrap(), vec![2, 3]);
        assert_eq!(a.parse::<Vec<u64>>().unwrap(), vec![4, 5]);
        assert!(a.try_parse::<u64>().unwrap().is_none());
        assert_eq!(a.consumed(), 3);
    });
}

#[test]
fn rfc_maps() {
    test_map(true, &hex!("a201020304"), |m| {
        assert_eq!(m.len(), Some(2));
        assert_eq!(m.parse::<u64>().unwrap(), 1);
        assert_eq!(m.parse::<u64>().unwrap(), 2);
        assert_eq!(m.parse::<u64>().unwrap(), 3);
        assert_eq!(m.parse::<u64>().unwrap(), 4);
        assert_eq!(m.consumed(), 2);
    });

    test_map(true, &hex!("a26161016162820203"), |m| {
        assert_eq!(m.parse::<String>().unwrap(), "a");
        assert_eq!(m.parse::<u64>().unwrap(), 1);
        assert_eq!(m.parse::<String>().unwrap(), "b");
        assert_eq!(m.parse::<Vec<u64>>().unwrap(), vec![2, 3]);
    });

    let m: std::collections::HashMap<String, String> =
        parse(&hex!("a56161614161626142616361436164614461656145")).unwrap();
    assert_eq!(m.len(), 5);
    assert_eq!(m["a"], "A");
    assert_eq!(m["e"], "E");
}

#[test]
fn indefinite_maps() {
    test_map(false, &hex!("bf61610161629f0203ffff"), |m| {
        assert_eq!(m.parse::<String>().unwrap(), "a");
        assert_eq!(m.parse::<u64>().unwrap(), 1);
        assert_eq!(m.parse::<String>().unwrap(), "b");
        assert_eq!(m.parse::<Vec<u64>>().unwrap(), vec![2, 3]);
    });

    // a break between a key and its value
    assert!(matches!(
        parse::<std::collections::HashMap<String, u64>>(&hex!("bf6161ff")),
        Err(Error::PartialMap(_))
    ));
}

#[test]
fn duplicate_map_keys() {
    assert!(matches!(
        parse::<std::collections::HashMap<u64, u64>>(&hex!("a201000100")),
        Err(Error::Semantic(_))
    ));
}

#[test]
fn tags_reach_the_closure() {
    test_item(
        &hex!("c074323031332d30332d32315432303a30343a30305a"),
        &[0],
        |v| assert!(matches!(v, Item::Text { .. })),
    );
    test_item(&hex!("c11a514b67b0"), &[1], |v| {
        assert!(matches!(v, Item::Integer(i) if !i.sign && i.magnitude == 1363896240))
    });
    test_item(&hex!("d74401020304"), &[23], |v| {
        assert!(matches!(v, Item::Bytes { .. }))
    });
    test_item(&hex!("d818456449455446"), &[24], |v| {
        assert!(matches!(v, Item::Bytes { .. }))
    });
    // nested tags accumulate outermost-first
    test_item(&hex!("c1c200"), &[1, 2], |v| {
        assert!(matches!(v, Item::Integer(i) if !i.sign && i.magnitude == 0))
    });
    // a tag with nothing after it
    assert!(matches!(
        parse_value(&hex!("c0"), |_, _, _| Ok::<_, Error>(())),
        Err(Error::JustTags(_))
    ));
}

#[test]
fn typed_destinations_reject_tags() {
    assert!(parse::<u64>(&hex!("c100")).is_err());
    // except the transparent self-describe tag
    assert_eq!(parse::<u64>(&hex!("d9d9f700")).unwrap(), 0);
}

#[test]
fn from_slice_is_strict() {
    assert_eq!(from_slice::<u64>(&hex!("00")).unwrap(), 0);
    assert!(matches!(
        from_slice::<u64>(&hex!("0000")),
        Err(Error::TrailingData(1))
    ));
    // malformed input is rejected by the pre-pass even when the prefix
    // would satisfy the destination
    assert!(from_slice::<Vec<u64>>(&hex!("9f00")).is_err());
}

#[test]
fn element_type_errors_are_immediate_for_sequences() {
    assert!(
        parse::<Vec<u64>>(&hex!("83016178 03"))
            .unwrap_err()
            .is_type_mismatch()
    );
}

#[test]
fn skip_value_walks_whole_items() {
    // [{1: 2}, 4, [5, 6]]
    test_array(true, &hex!("83a1010204820506"), |a| {
        assert!(a.skip_value().unwrap().is_some());
        assert_eq!(a.parse::<u64>().unwrap(), 4);
        assert!(a.skip_value().unwrap().is_some());
        assert!(a.skip_value().unwrap().is_none());
    });
}

#[test]
fn item_bytes_spans_tags_and_content() {
    assert_eq!(
        item_bytes(&hex!("c11a514b67b000")).unwrap(),
        &hex!("c11a514b67b0")
    );
}
