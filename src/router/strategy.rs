//! Routing strategies applied to the already-filtered candidate list.

use rand::seq::SliceRandom;

use crate::providers::registry::ProviderDescriptor;
use crate::router::RoundRobinCounters;

pub use crate::config::RoutingStrategy;

impl RoutingStrategy {
    /// Reorder `candidates` per this strategy. `round-robin` rotates by the
    /// counter for `model` and post-increments it modulo the list length;
    /// the counter is per-model, not per-provider.
    pub fn order(
        &self,
        mut candidates: Vec<ProviderDescriptor>,
        model: &str,
        counters: &RoundRobinCounters,
    ) -> Vec<ProviderDescriptor> {
        match self {
            RoutingStrategy::FirstAvailable | RoutingStrategy::Latency => candidates,
            RoutingStrategy::Random => {
                candidates.shuffle(&mut rand::thread_rng());
                candidates
            }
            RoutingStrategy::RoundRobin => {
                if candidates.is_empty() {
                    return candidates;
                }
                let offset = counters.next(model, candidates.len());
                candidates.rotate_left(offset);
                candidates
            }
        }
    }
}
