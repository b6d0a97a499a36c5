//! HTTP byte-range parsing and resolution (C5 support module).
//!
//! Shape grounded on the `aero-http-range` crate found alongside the
//! teacher in the retrieval pack (`ByteRangeSpec`, `parse_range_header`,
//! `resolve_ranges`), simplified to this gateway's needs: multi-range
//! (comma-separated) requests are rejected with `416` rather than
//! coalesced, which spec §4.5 step 3 allows as the simpler of the two
//! permitted behaviors.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRangeSpec {
    /// `start-end`
    FromTo { start: u64, end: u64 },
    /// `start-`
    From { start: u64 },
    /// `-len`
    Suffix { len: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub offset: u64,
    pub limit: u64,
}

impl ResolvedRange {
    pub fn len(&self) -> u64 {
        self.limit - self.offset + 1
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed Range header")]
    Malformed,
    #[error("multiple ranges in one request are not supported")]
    MultiRange,
    #[error("range not satisfiable")]
    Unsatisfiable,
}

/// Parses a `Range: bytes=<start>-<end?>` header value into a single spec.
/// Returns `Ok(None)` for an absent header (callers pass `None` directly
/// rather than calling this); a present-but-unparsable or multi-range
/// header is an error.
pub fn parse_range_header(value: &str) -> Result<ByteRangeSpec, RangeError> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes=")
        .or_else(|| value.strip_prefix("bytes ="))
        .ok_or(RangeError::Malformed)?;

    if rest.contains(',') {
        return Err(RangeError::MultiRange);
    }

    let rest = rest.trim();
    let (start_str, end_str) = rest.split_once('-').ok_or(RangeError::Malformed)?;
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    if start_str.is_empty() {
        // Suffix range: "-500" means "last 500 bytes".
        if end_str.is_empty() {
            return Err(RangeError::Malformed);
        }
        let len = end_str.parse::<u64>().map_err(|_| RangeError::Malformed)?;
        return Ok(ByteRangeSpec::Suffix { len });
    }

    let start = start_str.parse::<u64>().map_err(|_| RangeError::Malformed)?;
    if end_str.is_empty() {
        return Ok(ByteRangeSpec::From { start });
    }

    let end = end_str.parse::<u64>().map_err(|_| RangeError::Malformed)?;
    Ok(ByteRangeSpec::FromTo { start, end })
}

/// Resolves a parsed spec against an object of `size` bytes, applying the
/// clamping rules of spec §4.5 step 3.
pub fn resolve(spec: ByteRangeSpec, size: u64) -> Result<ResolvedRange, RangeError> {
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }

    let (start, end) = match spec {
        ByteRangeSpec::FromTo { start, end } => (start, end),
        ByteRangeSpec::From { start } => (start, size - 1),
        ByteRangeSpec::Suffix { len } => {
            if len == 0 {
                return Err(RangeError::Unsatisfiable);
            }
            let len = len.min(size);
            (size - len, size - 1)
        }
    };

    if start >= size {
        return Err(RangeError::Unsatisfiable);
    }

    let end = end.min(size - 1);
    if end < start {
        return Err(RangeError::Unsatisfiable);
    }

    Ok(ResolvedRange { offset: start, limit: end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_to() {
        assert_eq!(
            parse_range_header("bytes=0-499").unwrap(),
            ByteRangeSpec::FromTo { start: 0, end: 499 }
        );
    }

    #[test]
    fn parses_from_only() {
        assert_eq!(
            parse_range_header("bytes=500-").unwrap(),
            ByteRangeSpec::From { start: 500 }
        );
    }

    #[test]
    fn parses_suffix() {
        assert_eq!(
            parse_range_header("bytes=-500").unwrap(),
            ByteRangeSpec::Suffix { len: 500 }
        );
    }

    #[test]
    fn rejects_multi_range() {
        assert_eq!(parse_range_header("bytes=0-1,2-3").unwrap_err(), RangeError::MultiRange);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_range_header("chickens=0-1").unwrap_err(), RangeError::Malformed);
        assert_eq!(parse_range_header("bytes=-").unwrap_err(), RangeError::Malformed);
    }

    #[test]
    fn resolves_clamps_end_to_size() {
        let spec = ByteRangeSpec::FromTo { start: 0, end: 1_000_000 };
        let resolved = resolve(spec, 100).unwrap();
        assert_eq!(resolved, ResolvedRange { offset: 0, limit: 99 });
    }

    #[test]
    fn resolves_start_beyond_size_is_unsatisfiable() {
        let spec = ByteRangeSpec::From { start: 200 };
        assert_eq!(resolve(spec, 100).unwrap_err(), RangeError::Unsatisfiable);
    }

    #[test]
    fn resolves_suffix_larger_than_object() {
        let spec = ByteRangeSpec::Suffix { len: 1000 };
        let resolved = resolve(spec, 10).unwrap();
        assert_eq!(resolved, ResolvedRange { offset: 0, limit: 9 });
    }

    #[test]
    fn single_byte_range() {
        let spec = ByteRangeSpec::FromTo { start: 5, end: 5 };
        let resolved = resolve(spec, 100).unwrap();
        assert_eq!(resolved.len(), 1);
    }
}
