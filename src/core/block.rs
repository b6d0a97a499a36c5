/// Canonical fixed block size for the whole streaming pipeline: 1 MiB.
///
/// Kept as a `u64` constant rather than a config field because the spec
/// treats it as invariant for the life of a locator; `StreamingConfig`'s
/// `block_size_bytes` mirrors this value for documentation/tests but the
/// pipeline itself always reads `BLOCK_SIZE`.
pub const BLOCK_SIZE: u64 = 1024 * 1024;

/// Index of the block containing byte `offset`.
pub fn block_of(offset: u64) -> u64 {
    offset / BLOCK_SIZE
}

/// Number of blocks needed to cover an object of `size` bytes.
pub fn block_count(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE)
}

/// Splits `[start_block, end_block]` (inclusive) into consecutive batches of
/// at most `k` blocks each, in ascending order.
pub fn batch_ranges(start_block: u64, end_block: u64, k: u64) -> Vec<(u64, u64)> {
    let k = k.max(1);
    let mut batches = Vec::new();
    let mut cursor = start_block;
    while cursor <= end_block {
        let batch_end = (cursor + k - 1).min(end_block);
        batches.push((cursor, batch_end));
        cursor = batch_end + 1;
    }
    batches
}
