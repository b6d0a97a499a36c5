//! Property tests for `range::parse_range_header`/`range::resolve`, grounded
//! on `aero-http-range`'s `range_prop.rs` — same invariants, narrowed to
//! this gateway's single-range model (no coalescing, no multi-range).

use linkgate::range::{ByteRangeSpec, RangeError, parse_range_header, resolve};
use proptest::prelude::*;

fn arbitrary_spec() -> impl Strategy<Value = ByteRangeSpec> {
    prop_oneof![
        (any::<u64>(), any::<u64>()).prop_map(|(start, end)| ByteRangeSpec::FromTo { start, end }),
        any::<u64>().prop_map(|start| ByteRangeSpec::From { start }),
        any::<u64>().prop_map(|len| ByteRangeSpec::Suffix { len }),
    ]
}

fn valid_header() -> impl Strategy<Value = (ByteRangeSpec, String)> {
    prop_oneof![
        (0u64..10_000u64, 0u64..10_000u64).prop_filter_map("end must be >= start", |(start, end)| {
            if end < start {
                return None;
            }
            Some((ByteRangeSpec::FromTo { start, end }, format!("bytes={start}-{end}")))
        }),
        (0u64..10_000u64).prop_map(|start| (ByteRangeSpec::From { start }, format!("bytes={start}-"))),
        (1u64..10_000u64).prop_map(|len| (ByteRangeSpec::Suffix { len }, format!("bytes=-{len}"))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn parse_never_panics(input in ".*") {
        std::panic::catch_unwind(|| {
            let _ = parse_range_header(&input);
        }).expect("parse_range_header panicked");
    }

    #[test]
    fn generated_headers_round_trip((spec, header) in valid_header()) {
        let parsed = parse_range_header(&header).expect("generated header must parse");
        prop_assert_eq!(parsed, spec);
    }

    #[test]
    fn resolve_never_panics(spec in arbitrary_spec(), size in 0u64..2_000u64) {
        let _ = resolve(spec, size);
    }

    #[test]
    fn resolve_invariants_when_satisfiable(spec in arbitrary_spec(), size in 1u64..2_000u64) {
        match resolve(spec, size) {
            Err(RangeError::Unsatisfiable) => {}
            Err(_) => prop_assert!(false, "resolve must only ever fail with Unsatisfiable"),
            Ok(r) => {
                prop_assert!(r.offset <= r.limit);
                prop_assert!(r.limit < size);
                prop_assert_eq!(r.len(), r.limit - r.offset + 1);
                prop_assert!(r.len() > 0);
            }
        }
    }

    #[test]
    fn resolve_on_empty_object_is_always_unsatisfiable(spec in arbitrary_spec()) {
        prop_assert_eq!(resolve(spec, 0).unwrap_err(), RangeError::Unsatisfiable);
    }

    #[test]
    fn from_to_matches_byte_level_model(start in 0u64..500u64, end in 0u64..500u64, size in 1u64..500u64) {
        prop_assume!(end >= start);
        let spec = ByteRangeSpec::FromTo { start, end };
        let expected = if start >= size {
            None
        } else {
            Some((start, end.min(size - 1)))
        };

        match resolve(spec, size) {
            Err(RangeError::Unsatisfiable) => prop_assert_eq!(expected, None),
            Err(_) => prop_assert!(false),
            Ok(r) => prop_assert_eq!(Some((r.offset, r.limit)), expected),
        }
    }
}

#[test]
fn rejects_comma_separated_multi_range() {
    let err = parse_range_header("bytes=0-1,2-3").unwrap_err();
    assert_eq!(err, RangeError::MultiRange);
}

#[test]
fn rejects_missing_bytes_prefix() {
    let err = parse_range_header("chickens=0-1").unwrap_err();
    assert_eq!(err, RangeError::Malformed);
}

#[test]
fn rejects_dangling_suffix() {
    let err = parse_range_header("bytes=-").unwrap_err();
    assert_eq!(err, RangeError::Malformed);
}
