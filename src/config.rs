// 7.0 config.rs: all engine settings in one place. distance bounds, staleness,
// ratchet policy.

use serde::{Deserialize, Serialize};

// How `update` treats a candidate stop that sits below the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatchetPolicy {
    /// The stop only ever tightens (rises, for a sell-side stop). An update
    /// whose candidate sits below the current stop still succeeds and
    /// advances the rate clock; the stop itself is left unchanged.
    MonotonicTighten,
    /// Re-peg the stop from the latest price on every update, even when that
    /// loosens it. Matches venues that re-anchor unconditionally.
    AlwaysRepeg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    // Minimum trailing distance accepted by configure, in basis points.
    pub min_trailing_distance_bps: u32,
    // Maximum age of an oracle sample before update refuses it, in seconds.
    pub max_price_staleness_secs: u64,
    pub ratchet_policy: RatchetPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_trailing_distance_bps: 50, // 0.5%
            max_price_staleness_secs: 300,
            ratchet_policy: RatchetPolicy::MonotonicTighten,
        }
    }
}

impl EngineConfig {
    pub fn with_policy(mut self, policy: RatchetPolicy) -> Self {
        self.ratchet_policy = policy;
        self
    }

    pub fn with_max_staleness(mut self, secs: u64) -> Self {
        self.max_price_staleness_secs = secs;
        self
    }
}
