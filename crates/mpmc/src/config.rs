/// Configuration for a [`crate::Queue`] and the per-producer rings backing it.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Per-shard ring size as a power of 2 (e.g. 12 = 4096 slots).
    pub ring_bits: u8,
    /// Maximum number of producer tokens (one dedicated ring shard each).
    pub max_producer_tokens: usize,
    /// Enable metrics collection (slight overhead).
    pub enable_metrics: bool,
}

impl Config {
    /// Creates a new configuration with custom settings.
    ///
    /// # Panics
    ///
    /// Panics if `ring_bits` is 0 or greater than 20 (1M slots max), or if
    /// `max_producer_tokens` is 0 or greater than 1024.
    pub const fn new(ring_bits: u8, max_producer_tokens: usize, enable_metrics: bool) -> Self {
        assert!(
            ring_bits > 0 && ring_bits <= 20,
            "ring_bits must be between 1 and 20 (max 1M slots)"
        );
        assert!(
            max_producer_tokens > 0 && max_producer_tokens <= 1024,
            "max_producer_tokens must be between 1 and 1024"
        );

        Self {
            ring_bits,
            max_producer_tokens,
            enable_metrics,
        }
    }

    /// Capacity of a single shard ring.
    #[inline]
    pub const fn shard_capacity(&self) -> usize {
        1 << self.ring_bits
    }

    /// Index mask for wrapping within a shard.
    #[inline]
    pub const fn mask(&self) -> usize {
        self.shard_capacity() - 1
    }

    /// Total queue capacity across all shards.
    #[inline]
    pub const fn total_capacity(&self) -> usize {
        self.shard_capacity() * self.max_producer_tokens
    }

    /// Builds a configuration whose shards sum to roughly `capacity` slots
    /// spread over `max_producer_tokens` producers.
    ///
    /// `capacity` is rounded up to the next power of two per shard.
    pub fn for_total_capacity(capacity: usize, max_producer_tokens: usize) -> Self {
        let max_producer_tokens = max_producer_tokens.max(1);
        let per_shard = (capacity / max_producer_tokens).max(1);
        let ring_bits = (usize::BITS - (per_shard - 1).leading_zeros()).max(1) as u8;
        Self::new(ring_bits.min(20), max_producer_tokens, false)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ring_bits: 12, // 4K slots per shard
            max_producer_tokens: 16,
            enable_metrics: false,
        }
    }
}
