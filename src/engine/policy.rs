use crate::engine::RankedResponder;
use crate::models::responder::ResponderStatus;

/// Tunables for the greedy nearest-available assignment heuristic. The
/// defaults (cap 3, ratio 0.5) come straight from the product and are not
/// validated against any operational requirement.
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    /// Maximum concurrent operations a single responder may hold.
    pub max_concurrent_ops: usize,
    /// Force-assign fires when the nearest unit is closer than the runner-up
    /// multiplied by this ratio, even if the unit is not `available`.
    pub force_assign_ratio: f64,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_concurrent_ops: 3,
            force_assign_ratio: 0.5,
        }
    }
}

impl DispatchPolicy {
    /// Recommends a responder for the alert the ranking was computed against,
    /// or `None` when no unit is eligible. Pure: only the top two entries are
    /// inspected and nothing is mutated; the caller decides whether to commit.
    pub fn recommend(&self, ranked: &[RankedResponder]) -> Option<String> {
        let first = ranked.first()?;
        let under_cap = first.assigned_operations.len() < self.max_concurrent_ops;

        let can_assign = first.status == ResponderStatus::Available && under_cap;

        // Proximity dominates availability: a unit more than twice as close as
        // the runner-up is dispatched even mid-operation, as long as it has
        // capacity left.
        let force_assign = match ranked.get(1) {
            Some(second) => under_cap && first.distance_km < second.distance_km * self.force_assign_ratio,
            None => false,
        };

        if can_assign || force_assign {
            Some(first.id.clone())
        } else {
            None
        }
    }
}
