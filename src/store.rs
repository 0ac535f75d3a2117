//! In-memory backing store.
//!
//! The store is constructed explicitly and handed to the API routers and the local
//! transit source, so tests can run against isolated instances.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    FavoriteStop, NewFavoriteStop, NewRecentSearch, NewRoute, NewServiceAlert, NewStop,
    NewTripUpdate, NewVehiclePosition, RecentSearch, Route, RouteStatus, ServiceAlert,
    ServiceAlertUpdate, Stop, StopUpdate, TripUpdate, ValidationError, VehiclePosition,
    DEFAULT_ROUTE_COLOR, DEFAULT_USER_ID,
};

/// Maximum number of recent searches kept; older entries are evicted first
pub const RECENT_SEARCH_CAP: usize = 50;

/// Default number of recent searches returned
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Default search radius for nearby stops, in degrees
pub const DEFAULT_NEARBY_RADIUS: f64 = 1.0;

#[derive(Default)]
struct Tables {
    stops: HashMap<String, Stop>,
    routes: HashMap<String, Route>,
    vehicle_positions: HashMap<String, VehiclePosition>,
    trip_updates: HashMap<String, TripUpdate>,
    service_alerts: HashMap<String, ServiceAlert>,
    /// Oldest first
    recent_searches: VecDeque<RecentSearch>,
    favorite_stops: Vec<FavoriteStop>,
}

#[derive(Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Sorts by id so listings are stable across calls
fn sorted_by_id<T: Clone>(values: impl Iterator<Item = (String, T)>) -> Vec<T> {
    let mut entries: Vec<(String, T)> = values.collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().map(|(_, v)| v).collect()
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the demo network around Central and Wynyard
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let mut tables = Tables::default();

        let routes = [
            ("N10", "Leichhardt", true, "#3B82F6", RouteStatus::Active),
            ("N50", "Manly", true, "#8B5CF6", RouteStatus::Active),
            ("N60", "Hornsby", true, "#F97316", RouteStatus::Limited),
            ("N80", "Bondi Jct", true, "#22C55E", RouteStatus::Active),
            ("380", "Circular Quay", false, "#22C55E", RouteStatus::Active),
        ];
        for (id, name, night, color, status) in routes {
            tables.routes.insert(
                id.to_string(),
                Route {
                    id: id.to_string(),
                    route_number: id.to_string(),
                    route_name: name.to_string(),
                    is_night_service: night,
                    color: Some(color.to_string()),
                    status,
                },
            );
        }

        let stops = [
            ("200060", "Central Station - Eddy Ave", -33.8848, 151.2073),
            ("200069", "Wynyard Station - York St", -33.8647, 151.2068),
        ];
        for (id, name, latitude, longitude) in stops {
            tables.stops.insert(
                id.to_string(),
                Stop {
                    id: id.to_string(),
                    name: name.to_string(),
                    latitude,
                    longitude,
                    suburb: Some("Sydney".to_string()),
                    is_favorite: false,
                },
            );
        }

        // (id, trip, route, minutes ahead, delay seconds, realtime)
        let arrivals = [
            ("trip1", "trip_n10_001", "N10", 3, 0, true),
            ("trip2", "trip_n50_001", "N50", 8, 120, true),
            ("trip3", "trip_380_001", "380", 12, 0, false),
            ("trip4", "trip_n60_001", "N60", 18, 0, true),
        ];
        for (id, trip_id, route_id, minutes, delay, is_realtime) in arrivals {
            tables.trip_updates.insert(
                id.to_string(),
                TripUpdate {
                    id: id.to_string(),
                    trip_id: trip_id.to_string(),
                    route_id: route_id.to_string(),
                    stop_id: "200060".to_string(),
                    arrival_time: Some(now + Duration::minutes(minutes)),
                    departure_time: Some(now + Duration::minutes(minutes + 1)),
                    delay,
                    is_realtime,
                    timestamp: now,
                },
            );
        }

        Self {
            tables: RwLock::new(tables),
        }
    }

    // ------------------------------------------------------------------------
    // Stops
    // ------------------------------------------------------------------------

    pub async fn get_stop(&self, id: &str) -> Option<Stop> {
        self.tables.read().await.stops.get(id).cloned()
    }

    pub async fn list_stops(&self) -> Vec<Stop> {
        let tables = self.tables.read().await;
        sorted_by_id(tables.stops.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    /// Stops within `radius` degrees (planar distance) of the given point
    pub async fn nearby_stops(&self, lat: f64, lng: f64, radius: Option<f64>) -> Vec<Stop> {
        let radius = radius.unwrap_or(DEFAULT_NEARBY_RADIUS);
        self.list_stops()
            .await
            .into_iter()
            .filter(|stop| {
                let distance =
                    ((stop.latitude - lat).powi(2) + (stop.longitude - lng).powi(2)).sqrt();
                distance <= radius
            })
            .collect()
    }

    pub async fn create_stop(&self, input: NewStop) -> Result<Stop, ValidationError> {
        input.validate()?;
        let stop = Stop {
            id: new_id(),
            name: input.name,
            latitude: input.latitude,
            longitude: input.longitude,
            suburb: input.suburb,
            is_favorite: input.is_favorite,
        };
        self.tables
            .write()
            .await
            .stops
            .insert(stop.id.clone(), stop.clone());
        Ok(stop)
    }

    /// `Ok(None)` when the stop does not exist; nothing is written if the patch is invalid
    pub async fn update_stop(
        &self,
        id: &str,
        update: StopUpdate,
    ) -> Result<Option<Stop>, ValidationError> {
        update.validate()?;
        let mut tables = self.tables.write().await;
        let Some(stop) = tables.stops.get_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            stop.name = name;
        }
        if let Some(latitude) = update.latitude {
            stop.latitude = latitude;
        }
        if let Some(longitude) = update.longitude {
            stop.longitude = longitude;
        }
        if let Some(suburb) = update.suburb {
            stop.suburb = Some(suburb);
        }
        if let Some(is_favorite) = update.is_favorite {
            stop.is_favorite = is_favorite;
        }
        Ok(Some(stop.clone()))
    }

    // ------------------------------------------------------------------------
    // Routes
    // ------------------------------------------------------------------------

    pub async fn get_route(&self, id: &str) -> Option<Route> {
        self.tables.read().await.routes.get(id).cloned()
    }

    pub async fn list_routes(&self) -> Vec<Route> {
        let tables = self.tables.read().await;
        sorted_by_id(tables.routes.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub async fn night_routes(&self) -> Vec<Route> {
        self.list_routes()
            .await
            .into_iter()
            .filter(|route| route.is_night_service)
            .collect()
    }

    pub async fn create_route(&self, input: NewRoute) -> Result<Route, ValidationError> {
        input.validate()?;
        let route = Route {
            id: new_id(),
            route_number: input.route_number,
            route_name: input.route_name,
            is_night_service: input.is_night_service,
            color: Some(input.color.unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_string())),
            status: input.status.unwrap_or_default(),
        };
        self.tables
            .write()
            .await
            .routes
            .insert(route.id.clone(), route.clone());
        Ok(route)
    }

    // ------------------------------------------------------------------------
    // Vehicle positions
    // ------------------------------------------------------------------------

    pub async fn get_vehicle_position(&self, id: &str) -> Option<VehiclePosition> {
        self.tables.read().await.vehicle_positions.get(id).cloned()
    }

    pub async fn list_vehicle_positions(&self) -> Vec<VehiclePosition> {
        let tables = self.tables.read().await;
        sorted_by_id(
            tables
                .vehicle_positions
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        )
    }

    pub async fn vehicle_positions_for_route(&self, route_id: &str) -> Vec<VehiclePosition> {
        self.list_vehicle_positions()
            .await
            .into_iter()
            .filter(|pos| pos.route_id == route_id)
            .collect()
    }

    pub async fn create_vehicle_position(
        &self,
        input: NewVehiclePosition,
    ) -> Result<VehiclePosition, ValidationError> {
        input.validate()?;
        let position = vehicle_position_from(input);
        self.tables
            .write()
            .await
            .vehicle_positions
            .insert(position.id.clone(), position.clone());
        Ok(position)
    }

    /// Installs a new set of positions; the previous set is dropped in the same write.
    pub async fn replace_vehicle_positions(
        &self,
        inputs: Vec<NewVehiclePosition>,
    ) -> Result<(), ValidationError> {
        for input in &inputs {
            input.validate()?;
        }
        let positions: HashMap<String, VehiclePosition> = inputs
            .into_iter()
            .map(vehicle_position_from)
            .map(|p| (p.id.clone(), p))
            .collect();
        self.tables.write().await.vehicle_positions = positions;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Trip updates
    // ------------------------------------------------------------------------

    pub async fn get_trip_update(&self, id: &str) -> Option<TripUpdate> {
        self.tables.read().await.trip_updates.get(id).cloned()
    }

    pub async fn list_trip_updates(&self) -> Vec<TripUpdate> {
        let tables = self.tables.read().await;
        sorted_by_id(tables.trip_updates.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub async fn trip_updates_for_stop(&self, stop_id: &str) -> Vec<TripUpdate> {
        self.list_trip_updates()
            .await
            .into_iter()
            .filter(|update| update.stop_id == stop_id)
            .collect()
    }

    pub async fn create_trip_update(
        &self,
        input: NewTripUpdate,
    ) -> Result<TripUpdate, ValidationError> {
        input.validate()?;
        let update = trip_update_from(input);
        self.tables
            .write()
            .await
            .trip_updates
            .insert(update.id.clone(), update.clone());
        Ok(update)
    }

    /// Installs a new set of trip updates; the previous set is dropped in the same write.
    pub async fn replace_trip_updates(
        &self,
        inputs: Vec<NewTripUpdate>,
    ) -> Result<(), ValidationError> {
        for input in &inputs {
            input.validate()?;
        }
        let updates: HashMap<String, TripUpdate> = inputs
            .into_iter()
            .map(trip_update_from)
            .map(|u| (u.id.clone(), u))
            .collect();
        self.tables.write().await.trip_updates = updates;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Service alerts
    // ------------------------------------------------------------------------

    pub async fn get_service_alert(&self, id: &str) -> Option<ServiceAlert> {
        self.tables.read().await.service_alerts.get(id).cloned()
    }

    pub async fn active_service_alerts(&self) -> Vec<ServiceAlert> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<ServiceAlert> = tables
            .service_alerts
            .values()
            .filter(|alert| alert.is_active)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        alerts
    }

    pub async fn alerts_for_route(&self, route_id: &str) -> Vec<ServiceAlert> {
        self.active_service_alerts()
            .await
            .into_iter()
            .filter(|alert| alert.affects_route(route_id))
            .collect()
    }

    pub async fn create_service_alert(
        &self,
        input: NewServiceAlert,
    ) -> Result<ServiceAlert, ValidationError> {
        input.validate()?;
        let alert = ServiceAlert {
            id: new_id(),
            title: input.title,
            description: input.description,
            severity: input.severity,
            affected_routes: input.affected_routes,
            affected_stops: input.affected_stops,
            start_time: input.start_time,
            end_time: input.end_time,
            is_active: input.is_active.unwrap_or(true),
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .service_alerts
            .insert(alert.id.clone(), alert.clone());
        Ok(alert)
    }

    pub async fn update_service_alert(
        &self,
        id: &str,
        update: ServiceAlertUpdate,
    ) -> Result<Option<ServiceAlert>, ValidationError> {
        let mut tables = self.tables.write().await;
        let Some(alert) = tables.service_alerts.get_mut(id) else {
            return Ok(None);
        };
        update.validate(alert.start_time)?;
        if let Some(title) = update.title {
            alert.title = title;
        }
        if let Some(description) = update.description {
            alert.description = description;
        }
        if let Some(severity) = update.severity {
            alert.severity = severity;
        }
        if let Some(routes) = update.affected_routes {
            alert.affected_routes = Some(routes);
        }
        if let Some(stops) = update.affected_stops {
            alert.affected_stops = Some(stops);
        }
        if let Some(end_time) = update.end_time {
            alert.end_time = Some(end_time);
        }
        if let Some(is_active) = update.is_active {
            alert.is_active = is_active;
        }
        Ok(Some(alert.clone()))
    }

    // ------------------------------------------------------------------------
    // Recent searches
    // ------------------------------------------------------------------------

    /// Most recent first
    pub async fn recent_searches(&self, limit: Option<usize>) -> Vec<RecentSearch> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        let tables = self.tables.read().await;
        let mut searches: Vec<RecentSearch> =
            tables.recent_searches.iter().rev().cloned().collect();
        // Stable: equal timestamps keep newest-insert-first order
        searches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        searches.truncate(limit);
        searches
    }

    pub async fn create_recent_search(
        &self,
        input: NewRecentSearch,
    ) -> Result<RecentSearch, ValidationError> {
        input.validate()?;
        let search = RecentSearch {
            id: new_id(),
            query: input.query,
            search_type: input.search_type,
            metadata: input.metadata,
            timestamp: Utc::now(),
        };
        let mut tables = self.tables.write().await;
        tables.recent_searches.push_back(search.clone());
        while tables.recent_searches.len() > RECENT_SEARCH_CAP {
            tables.recent_searches.pop_front();
        }
        Ok(search)
    }

    // ------------------------------------------------------------------------
    // Favorite stops
    // ------------------------------------------------------------------------

    pub async fn favorite_stops(&self, user_id: Option<&str>) -> Vec<FavoriteStop> {
        let user_id = user_id.unwrap_or(DEFAULT_USER_ID);
        self.tables
            .read()
            .await
            .favorite_stops
            .iter()
            .filter(|fav| fav.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Adds a favorite, returning the existing entry if the stop is already a favorite
    /// of that user.
    pub async fn add_favorite_stop(
        &self,
        input: NewFavoriteStop,
    ) -> Result<FavoriteStop, ValidationError> {
        input.validate()?;
        let user_id = input.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string());
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .favorite_stops
            .iter()
            .find(|fav| fav.stop_id == input.stop_id && fav.user_id == user_id)
        {
            return Ok(existing.clone());
        }
        let favorite = FavoriteStop {
            id: new_id(),
            stop_id: input.stop_id,
            user_id,
            added_at: Utc::now(),
        };
        tables.favorite_stops.push(favorite.clone());
        Ok(favorite)
    }

    /// Returns false when the stop was not a favorite of that user
    pub async fn remove_favorite_stop(&self, stop_id: &str, user_id: Option<&str>) -> bool {
        let user_id = user_id.unwrap_or(DEFAULT_USER_ID);
        let mut tables = self.tables.write().await;
        match tables
            .favorite_stops
            .iter()
            .position(|fav| fav.stop_id == stop_id && fav.user_id == user_id)
        {
            Some(index) => {
                tables.favorite_stops.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn is_favorite_stop(&self, stop_id: &str, user_id: Option<&str>) -> bool {
        let user_id = user_id.unwrap_or(DEFAULT_USER_ID);
        self.tables
            .read()
            .await
            .favorite_stops
            .iter()
            .any(|fav| fav.stop_id == stop_id && fav.user_id == user_id)
    }
}

fn vehicle_position_from(input: NewVehiclePosition) -> VehiclePosition {
    VehiclePosition {
        id: new_id(),
        vehicle_id: input.vehicle_id,
        route_id: input.route_id,
        latitude: input.latitude,
        longitude: input.longitude,
        bearing: input.bearing,
        speed: input.speed,
        timestamp: input.timestamp,
    }
}

fn trip_update_from(input: NewTripUpdate) -> TripUpdate {
    TripUpdate {
        id: new_id(),
        trip_id: input.trip_id,
        route_id: input.route_id,
        stop_id: input.stop_id,
        arrival_time: input.arrival_time,
        departure_time: input.departure_time,
        delay: input.delay.unwrap_or(0),
        is_realtime: input.is_realtime.unwrap_or(false),
        timestamp: input.timestamp,
    }
}
