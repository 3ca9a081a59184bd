//! Mempool configuration.

use std::time::Duration;

/// Maximum number of transactions in the pool.
pub const MEM_POOL_MAX: usize = 80_000;

/// If the pool already holds this many transactions, reject any new
/// low-fee-density transactions.
pub const MEM_POOL_MAX_LOW: usize = 5_000;

/// Default expiring-cache capacity for the gossip driver.
pub const GOSSIP_CACHE_CAPACITY: usize = 10_000;

/// Configuration for a [`MemPool`](crate::pool::MemPool) instance.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Hard cap on pool transaction count.
    pub max_pool: usize,
    /// Pool count past which low-fee transactions are rejected.
    pub max_pool_low: usize,
    /// Byte budget for low-fee transactions within one block candidate.
    pub low_fee_block_bytes: usize,
    /// Whether transactions arriving from peers are accepted at all.
    pub accepts_p2p_tx: bool,
    /// Tip driver: longest sleep between pending-root checks.
    pub tip_check_period: Duration,
    /// Tip driver: minimum interval between passes.
    pub tip_check_floor: Duration,
    /// Gossip driver: longest sleep between broadcast passes.
    pub gossip_period: Duration,
    /// Gossip driver: minimum interval between passes.
    pub gossip_floor: Duration,
    /// Gossip seen-cache capacity.
    pub gossip_cache_capacity: usize,
    /// Gossip seen-cache entry lifetime.
    pub gossip_cache_ttl: Duration,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_pool: MEM_POOL_MAX,
            max_pool_low: MEM_POOL_MAX_LOW,
            low_fee_block_bytes: tarn_core::params::DEFAULT_LOW_FEE_BLOCK_BYTES,
            accepts_p2p_tx: true,
            tip_check_period: Duration::from_millis(300_000),
            tip_check_floor: Duration::from_millis(2_500),
            gossip_period: Duration::from_millis(5_000),
            gossip_floor: Duration::from_millis(250),
            gossip_cache_capacity: GOSSIP_CACHE_CAPACITY,
            gossip_cache_ttl: Duration::from_millis(300_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let cfg = MempoolConfig::default();
        assert_eq!(cfg.max_pool, 80_000);
        assert_eq!(cfg.max_pool_low, 5_000);
        assert!(cfg.accepts_p2p_tx);
    }

    #[test]
    fn default_driver_timing() {
        let cfg = MempoolConfig::default();
        assert_eq!(cfg.tip_check_period, Duration::from_secs(300));
        assert_eq!(cfg.tip_check_floor, Duration::from_millis(2_500));
        assert_eq!(cfg.gossip_period, Duration::from_secs(5));
        assert_eq!(cfg.gossip_floor, Duration::from_millis(250));
        assert_eq!(cfg.gossip_cache_capacity, 10_000);
        assert_eq!(cfg.gossip_cache_ttl, Duration::from_secs(300));
    }

    #[test]
    fn config_is_clone_and_debug() {
        let cfg = MempoolConfig::default();
        let cfg2 = cfg.clone();
        assert!(format!("{cfg2:?}").contains("MempoolConfig"));
    }
}
