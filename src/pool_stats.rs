use std::fmt;

use serde::Serialize;

use crate::poolable::PoolId;

/// Point-in-time snapshot of one pool's counters.
///
/// The field order is stable; log scrapers depend on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub pool_id: PoolId,
    pub class_name: String,
    pub total: usize,
    pub active: usize,
    pub available: usize,
    pub peak_active: usize,
    pub total_acquires: u64,
    pub failed_acquires: u64,
    pub growth_ops: u64,
    pub shrink_ops: u64,
    /// `active / total`, 0 for an empty pool
    pub usage_rate: f32,
    pub is_actor_pool: bool,
}

impl PoolStats {
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pool[{}] class={} total={} active={} available={} peak={} acquires={} failed={} grown={} shrunk={} usage={:.1}% actor={}",
            self.pool_id,
            self.class_name,
            self.total,
            self.active,
            self.available,
            self.peak_active,
            self.total_acquires,
            self.failed_acquires,
            self.growth_ops,
            self.shrink_ops,
            self.usage_rate * 100.0,
            self.is_actor_pool,
        )
    }
}
