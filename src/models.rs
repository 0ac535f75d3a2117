//! Transit entities served by the store and consumed by the live board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Badge color used when a route carries none
pub const DEFAULT_ROUTE_COLOR: &str = "#1565C0";

/// User id of the single implicit user
pub const DEFAULT_USER_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub suburb: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct StopUpdate {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub suburb: Option<String>,
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Active,
    Limited,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Route {
    pub id: String,
    /// Short label shown on the badge, e.g. "N10"
    pub route_number: String,
    pub route_name: String,
    /// Operates mainly between 1 AM and 4 AM
    #[serde(default)]
    pub is_night_service: bool,
    pub color: Option<String>,
    #[serde(default)]
    pub status: RouteStatus,
}

impl Route {
    pub fn badge_color(&self) -> &str {
        self.color.as_deref().unwrap_or(DEFAULT_ROUTE_COLOR)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VehiclePosition {
    pub id: String,
    pub vehicle_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// A predicted or scheduled arrival of a trip at a stop.
///
/// `arrival_time` stays optional at this boundary; only records carrying one can be
/// turned into an [`crate::arrivals::EnrichedArrival`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TripUpdate {
    pub id: String,
    pub trip_id: String,
    pub route_id: String,
    pub stop_id: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    /// Schedule deviation in seconds
    #[serde(default)]
    pub delay: i32,
    /// Live prediction (true) or static timetable (false)
    #[serde(default)]
    pub is_realtime: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServiceAlert {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub affected_routes: Option<Vec<String>>,
    pub affected_stops: Option<Vec<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ServiceAlert {
    pub fn affects_route(&self, route_id: &str) -> bool {
        self.affected_routes
            .as_ref()
            .is_some_and(|routes| routes.iter().any(|r| r == route_id))
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ServiceAlertUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub affected_routes: Option<Vec<String>>,
    pub affected_stops: Option<Vec<String>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Route,
    Stop,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentSearch {
    pub id: String,
    pub query: String,
    pub search_type: SearchType,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FavoriteStop {
    pub id: String,
    pub stop_id: String,
    pub user_id: String,
    pub added_at: DateTime<Utc>,
}

// ----------------------------------------------------------------------------
// Insert payloads
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStop {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub suburb: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewRoute {
    pub route_number: String,
    pub route_name: String,
    #[serde(default)]
    pub is_night_service: bool,
    pub color: Option<String>,
    pub status: Option<RouteStatus>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewVehiclePosition {
    pub vehicle_id: String,
    pub route_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewTripUpdate {
    pub trip_id: String,
    pub route_id: String,
    pub stop_id: String,
    pub arrival_time: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub delay: Option<i32>,
    pub is_realtime: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewServiceAlert {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub affected_routes: Option<Vec<String>>,
    pub affected_stops: Option<Vec<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewRecentSearch {
    pub query: String,
    pub search_type: SearchType,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewFavoriteStop {
    pub stop_id: String,
    pub user_id: Option<String>,
}

// ----------------------------------------------------------------------------
// Validation
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Malformed write payload. Reported to the caller as-is, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid input: {}", describe(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ValidationError {
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect()
    }
}

/// Collects field errors for one payload
#[derive(Default)]
struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.fail(field, "is required");
        }
    }

    fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.fail(field, &format!("must be at most {max} characters"));
        }
    }

    fn coordinate(&mut self, latitude: f64, longitude: f64) {
        if !(-90.0..=90.0).contains(&latitude) {
            self.fail("latitude", "must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&longitude) {
            self.fail("longitude", "must be between -180 and 180");
        }
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl NewStop {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("name", &self.name);
        check.coordinate(self.latitude, self.longitude);
        check.finish()
    }
}

impl StopUpdate {
    /// Checks the fields present in the patch
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        if let Some(name) = &self.name {
            check.required("name", name);
        }
        if let Some(latitude) = self.latitude {
            if !(-90.0..=90.0).contains(&latitude) {
                check.fail("latitude", "must be between -90 and 90");
            }
        }
        if let Some(longitude) = self.longitude {
            if !(-180.0..=180.0).contains(&longitude) {
                check.fail("longitude", "must be between -180 and 180");
            }
        }
        check.finish()
    }
}

impl NewRoute {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("route_number", &self.route_number);
        check.required("route_name", &self.route_name);
        if let Some(color) = &self.color {
            if !is_hex_color(color) {
                check.fail("color", "must be a #RRGGBB hex color");
            }
        }
        check.finish()
    }
}

impl NewVehiclePosition {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("vehicle_id", &self.vehicle_id);
        check.required("route_id", &self.route_id);
        check.coordinate(self.latitude, self.longitude);
        check.finish()
    }
}

impl NewTripUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("trip_id", &self.trip_id);
        check.required("route_id", &self.route_id);
        check.required("stop_id", &self.stop_id);
        check.finish()
    }
}

impl NewServiceAlert {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("title", &self.title);
        check.required("description", &self.description);
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                check.fail("end_time", "must not be before start_time");
            }
        }
        check.finish()
    }
}

impl ServiceAlertUpdate {
    /// Checks the fields present in the patch against the alert's current start time
    pub fn validate(&self, start_time: Option<DateTime<Utc>>) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        if let Some(title) = &self.title {
            check.required("title", title);
        }
        if let Some(description) = &self.description {
            check.required("description", description);
        }
        if let (Some(start), Some(end)) = (start_time, self.end_time) {
            if end < start {
                check.fail("end_time", "must not be before start_time");
            }
        }
        check.finish()
    }
}

impl NewRecentSearch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("query", &self.query);
        check.max_len("query", &self.query, 200);
        check.finish()
    }
}

impl NewFavoriteStop {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut check = Checker::default();
        check.required("stop_id", &self.stop_id);
        if let Some(user_id) = &self.user_id {
            check.required("user_id", user_id);
        }
        check.finish()
    }
}
