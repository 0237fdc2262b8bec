//! Pure range arithmetic over a file's byte span.
//!
//! No I/O, no shared state. Everything here is deterministic and safe to
//! property-test directly.

use serde::{Deserialize, Serialize};

/// A closed byte interval `[lo, hi]`, `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub lo: u64,
    pub hi: u64,
}

impl Range {
    pub fn new(lo: u64, hi: u64) -> Self {
        debug_assert!(lo <= hi);
        Range { lo, hi }
    }

    /// Number of bytes covered by this range.
    pub fn size(&self) -> u64 {
        self.hi - self.lo + 1
    }
}

/// `r1.hi + 1 == r2.lo`.
pub fn adjacent(r1: Range, r2: Range) -> bool {
    r1.hi + 1 == r2.lo
}

/// Fuses two adjacent ranges. Panics (via debug_assert) if they aren't adjacent.
pub fn merge2(r1: Range, r2: Range) -> Range {
    debug_assert!(adjacent(r1, r2));
    Range::new(r1.lo, r2.hi)
}

/// Produces `ceil(size / chunk_size)` ranges covering `[0, size-1]`, ascending by `lo`.
/// Every range has length `chunk_size` except possibly the last, which holds the remainder.
pub fn plan(size: u64, chunk_size: u64) -> Vec<Range> {
    assert!(size >= 1, "size must be at least 1");
    assert!(chunk_size >= 1, "chunk_size must be at least 1");

    let mut ranges = Vec::new();
    let mut start = 0u64;
    loop {
        let stop = (start + chunk_size - 1).min(size - 1);
        ranges.push(Range::new(start, stop));
        if stop == size - 1 {
            break;
        }
        start = stop + 1;
    }
    ranges
}

/// Sweeps left-to-right, merging adjacent entries. Input is assumed already sorted by `lo`.
/// Idempotent: `merge(merge(x)) == merge(x)`.
pub fn merge(ranges: &[Range]) -> Vec<Range> {
    if ranges.len() <= 1 {
        return ranges.to_vec();
    }

    let mut result = Vec::new();
    let mut cur = ranges[0];
    for &next in &ranges[1..] {
        if adjacent(cur, next) {
            cur = merge2(cur, next);
        } else {
            result.push(cur);
            cur = next;
        }
    }
    result.push(cur);
    result
}

/// Given a sorted, non-overlapping set of occupied ranges inside `[0, size-1]`, produces the
/// complement as a sorted, non-overlapping list. Zero-length gaps are omitted.
pub fn invert(size: u64, ranges: &[Range]) -> Vec<Range> {
    let mut result = Vec::new();
    let mut cursor = 0u64;

    for r in ranges {
        if r.lo > cursor {
            result.push(Range::new(cursor, r.lo - 1));
        }
        cursor = r.hi + 1;
    }

    if cursor < size {
        result.push(Range::new(cursor, size - 1));
    }

    result
}

/// Pairwise scan over consecutive pairs (0&1, 2&3, ...). A pair is fused iff adjacent and its
/// combined length doesn't exceed `maxsize`; otherwise both elements pass through unchanged. An
/// unpaired trailing element passes through.
pub fn merge_leftovers(ranges: &[Range], maxsize: u64) -> Vec<Range> {
    let mut result = Vec::new();
    let mut pairs = ranges.chunks_exact(2);

    for pair in &mut pairs {
        let (c1, c2) = (pair[0], pair[1]);
        if adjacent(c1, c2) && c1.size() + c2.size() <= maxsize {
            result.push(merge2(c1, c2));
        } else {
            result.push(c1);
            result.push(c2);
        }
    }

    result.extend_from_slice(pairs.remainder());
    result
}

/// The plan entries that are not already fully represented in `completed`. An entry whose exact
/// `(lo, hi)` pair is present in `completed` is dropped; a chunk that only partially completed is
/// re-downloaded in full. This is deliberate: sub-chunk progress is not tracked.
pub fn outstanding(size: u64, chunk_size: u64, completed: &[Range]) -> Vec<Range> {
    plan(size, chunk_size)
        .into_iter()
        .filter(|r| !completed.contains(r))
        .collect()
}
