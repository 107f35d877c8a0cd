const DEFAULT_BLOCK_SIZE: usize = 1000;

/// Split `0..ntot` into contiguous `(lb, ub)` blocks for parallel jobs
/// * `ntot` - number of total elements
/// * `block_size` - the size of each block (0 falls back to a default)
pub fn generate_minibatch_intervals(ntot: usize, block_size: usize) -> Vec<(usize, usize)> {
    let block_size = if block_size == 0 {
        DEFAULT_BLOCK_SIZE
    } else {
        block_size
    };
    let num_batches = ntot.div_ceil(block_size);
    (0..num_batches)
        .map(|b| {
            let lb: usize = b * block_size;
            let ub: usize = ((b + 1) * block_size).min(ntot);
            (lb, ub)
        })
        .collect::<Vec<_>>()
}

/// Derive an independent seed for the `job`-th random stream from a
/// base seed. Streams depend only on `(rseed, job)`, never on the order
/// in which jobs are scheduled.
pub fn stream_seed(rseed: u64, job: u64) -> u64 {
    // splitmix64 finaliser
    let mut z = rseed ^ job.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
