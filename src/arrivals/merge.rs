use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{Route, TripUpdate};

/// A trip update joined with its route, guaranteed to carry an arrival time.
///
/// Only built by [`merge_arrivals`]; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedArrival {
    pub arrival_time: DateTime<Utc>,
    pub update: TripUpdate,
    /// `None` when the route id has no metadata; callers fall back to the raw id
    pub route: Option<Route>,
}

impl EnrichedArrival {
    pub fn route_label(&self) -> &str {
        self.route
            .as_ref()
            .map(|r| r.route_number.as_str())
            .unwrap_or(self.update.route_id.as_str())
    }
}

/// Joins trip updates with route metadata by exact route id.
///
/// Updates without an arrival time are dropped. Records sharing a trip id are all kept.
pub fn merge_arrivals(trip_updates: &[TripUpdate], routes: &[Route]) -> Vec<EnrichedArrival> {
    let routes_by_id: HashMap<&str, &Route> =
        routes.iter().map(|r| (r.id.as_str(), r)).collect();

    trip_updates
        .iter()
        .filter_map(|update| {
            let arrival_time = update.arrival_time?;
            Some(EnrichedArrival {
                arrival_time,
                update: update.clone(),
                route: routes_by_id.get(update.route_id.as_str()).map(|r| (*r).clone()),
            })
        })
        .collect()
}
