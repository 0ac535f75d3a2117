//! Refresh cadence of each dataset.
//!
//! Every dataset key belongs to a class; a class carries a stale-after budget and an
//! optional refetch interval. Live classes are also force-invalidated when the
//! client comes back to the foreground.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetClass {
    Vehicles,
    Arrivals,
    Alerts,
    /// Stops and routes
    Reference,
}

impl DatasetClass {
    /// Live datasets are invalidated on a foreground event
    pub fn is_live(&self) -> bool {
        !matches!(self, DatasetClass::Reference)
    }
}

/// Identity of a cached dataset: the API path plus its optional parent filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatasetKey {
    Stops,
    Routes,
    Vehicles,
    VehiclesForRoute(String),
    ArrivalsForStop(String),
    Alerts,
    AlertsForRoute(String),
}

impl DatasetKey {
    pub fn class(&self) -> DatasetClass {
        match self {
            DatasetKey::Stops | DatasetKey::Routes => DatasetClass::Reference,
            DatasetKey::Vehicles | DatasetKey::VehiclesForRoute(_) => DatasetClass::Vehicles,
            DatasetKey::ArrivalsForStop(_) => DatasetClass::Arrivals,
            DatasetKey::Alerts | DatasetKey::AlertsForRoute(_) => DatasetClass::Alerts,
        }
    }

    /// REST path serving this dataset
    pub fn path(&self) -> String {
        match self {
            DatasetKey::Stops => "/api/stops".to_string(),
            DatasetKey::Routes => "/api/routes".to_string(),
            DatasetKey::Vehicles => "/api/vehicles".to_string(),
            DatasetKey::VehiclesForRoute(route_id) => {
                format!("/api/vehicles/route/{}", urlencoding::encode(route_id))
            }
            DatasetKey::ArrivalsForStop(stop_id) => {
                format!("/api/arrivals/stop/{}", urlencoding::encode(stop_id))
            }
            DatasetKey::Alerts => "/api/alerts".to_string(),
            DatasetKey::AlertsForRoute(route_id) => {
                format!("/api/alerts/route/{}", urlencoding::encode(route_id))
            }
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// Data older than this is eligible for a background refetch
    pub stale_after: Duration,
    /// Polling period while observed; `None` means fetch once and rely on staleness
    pub refetch_interval: Option<Duration>,
}

impl FreshnessPolicy {
    pub const fn new(stale_after: Duration, refetch_interval: Option<Duration>) -> Self {
        Self {
            stale_after,
            refetch_interval,
        }
    }

    /// `age` is the time since the last successful fetch
    pub fn is_stale(&self, age: Duration) -> bool {
        age >= self.stale_after
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessTable {
    vehicles: FreshnessPolicy,
    arrivals: FreshnessPolicy,
    alerts: FreshnessPolicy,
    reference: FreshnessPolicy,
}

impl Default for FreshnessTable {
    fn default() -> Self {
        Self {
            vehicles: FreshnessPolicy::new(Duration::from_secs(15), Some(Duration::from_secs(30))),
            arrivals: FreshnessPolicy::new(Duration::from_secs(15), Some(Duration::from_secs(30))),
            alerts: FreshnessPolicy::new(Duration::from_secs(60), Some(Duration::from_secs(120))),
            reference: FreshnessPolicy::new(Duration::from_secs(5 * 60), None),
        }
    }
}

impl FreshnessTable {
    pub fn policy(&self, class: DatasetClass) -> FreshnessPolicy {
        match class {
            DatasetClass::Vehicles => self.vehicles,
            DatasetClass::Arrivals => self.arrivals,
            DatasetClass::Alerts => self.alerts,
            DatasetClass::Reference => self.reference,
        }
    }

    pub fn set(&mut self, class: DatasetClass, policy: FreshnessPolicy) {
        match class {
            DatasetClass::Vehicles => self.vehicles = policy,
            DatasetClass::Arrivals => self.arrivals = policy,
            DatasetClass::Alerts => self.alerts = policy,
            DatasetClass::Reference => self.reference = policy,
        }
    }

    pub fn for_key(&self, key: &DatasetKey) -> FreshnessPolicy {
        self.policy(key.class())
    }
}
