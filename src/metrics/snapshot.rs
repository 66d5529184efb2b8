/// Point-in-time copy of the cache counters.
///
/// Counters are monotone non-decreasing over the life of a cache; the
/// two gauges at the bottom are captured at snapshot time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub evictions: u64,
    pub removals: u64,
    pub hits: u64,
    pub misses: u64,
    pub conflicts: u64,
    pub errors: u64,

    // gauges captured at snapshot time
    pub len: usize,
    pub capacity: usize,
}
