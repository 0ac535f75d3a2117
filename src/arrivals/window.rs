use super::EnrichedArrival;

/// Display limit used when the caller does not pick one
pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ArrivalWindow {
    pub arrivals: Vec<EnrichedArrival>,
    /// Entries cut off by the limit, for a "show N more" affordance
    pub remaining: usize,
}

/// Sorts by arrival time ascending and keeps the first `limit` entries.
///
/// The sort is stable, so arrivals sharing a timestamp keep their input order.
pub fn order_and_limit(mut arrivals: Vec<EnrichedArrival>, limit: usize) -> ArrivalWindow {
    arrivals.sort_by_key(|a| a.arrival_time);
    let remaining = arrivals.len().saturating_sub(limit);
    arrivals.truncate(limit);
    ArrivalWindow {
        arrivals,
        remaining,
    }
}
