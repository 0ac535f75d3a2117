//! Live board composition.
//!
//! A board is assembled from independent sections (arrivals, alerts, night routes).
//! Each section reads its datasets from the [`LiveCache`] and renders in its own task,
//! so a failing or panicking section is reported in place while its siblings render.
//! ETA labels are computed here, from the clock at render time.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::future::Future;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::arrivals::{
    compute_eta, delay_minutes, is_delayed, merge_arrivals, order_and_limit, EnrichedArrival,
};
use crate::freshness::DatasetKey;
use crate::live::{DatasetSnapshot, DatasetState, LiveCache};
use crate::models::{
    Route, RouteStatus, ServiceAlert, TripUpdate, VehiclePosition, DEFAULT_ROUTE_COLOR,
};
use crate::source::Dataset;

pub const EMPTY_ARRIVALS_MESSAGE: &str = "No upcoming arrivals";
pub const ARRIVALS_ERROR_MESSAGE: &str = "Unable to load arrival times";

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Expected {expected} dataset, got {found}")]
    UnexpectedDataset {
        expected: &'static str,
        found: &'static str,
    },
}

fn unexpected(expected: &'static str, found: &Dataset) -> BoardError {
    BoardError::UnexpectedDataset {
        expected,
        found: found.kind(),
    }
}

fn trip_updates_of(data: &Dataset) -> Result<&[TripUpdate], BoardError> {
    match data {
        Dataset::Arrivals(updates) => Ok(updates),
        other => Err(unexpected("arrivals", other)),
    }
}

fn routes_of(data: &Dataset) -> Result<&[Route], BoardError> {
    match data {
        Dataset::Routes(routes) => Ok(routes),
        other => Err(unexpected("routes", other)),
    }
}

fn alerts_of(data: &Dataset) -> Result<&[ServiceAlert], BoardError> {
    match data {
        Dataset::Alerts(alerts) => Ok(alerts),
        other => Err(unexpected("alerts", other)),
    }
}

fn vehicles_of(data: &Dataset) -> Result<&[VehiclePosition], BoardError> {
    match data {
        Dataset::Vehicles(vehicles) => Ok(vehicles),
        other => Err(unexpected("vehicles", other)),
    }
}

/// Outcome of one isolated board section
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Section<T> {
    Rendered { panel: T },
    Failed { message: String },
}

impl<T> Section<T> {
    pub fn panel(&self) -> Option<&T> {
        match self {
            Section::Rendered { panel } => Some(panel),
            Section::Failed { .. } => None,
        }
    }
}

/// Runs a section in its own task; an error or a panic becomes a failed section.
pub async fn run_section<T, F>(name: &'static str, render: F) -> Section<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, BoardError>> + Send + 'static,
{
    match tokio::spawn(render).await {
        Ok(Ok(panel)) => Section::Rendered { panel },
        Ok(Err(e)) => {
            warn!(section = name, error = %e, "Board section failed to render");
            Section::Failed {
                message: e.to_string(),
            }
        }
        Err(e) => {
            error!(section = name, error = %e, "Board section crashed");
            Section::Failed {
                message: format!("The {name} section could not be displayed"),
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArrivalView {
    pub trip_id: String,
    pub route_id: String,
    /// Route number, or the raw route id when the route is unknown
    pub route_label: String,
    pub route_name: String,
    pub color: String,
    pub is_night_service: bool,
    pub arrival_time: DateTime<Utc>,
    /// "Due", "N min" or a local clock time
    pub eta: String,
    pub due: bool,
    pub is_realtime: bool,
    pub realtime_label: String,
    pub delayed: bool,
    pub delay_minutes: Option<i64>,
}

fn realtime_label(is_realtime: bool) -> &'static str {
    if is_realtime {
        "Real-time"
    } else {
        "Scheduled"
    }
}

impl ArrivalView {
    pub fn render(arrival: &EnrichedArrival, now: DateTime<Utc>, tz: Tz) -> Self {
        let update = &arrival.update;
        let route = arrival.route.as_ref();
        let eta = compute_eta(Some(arrival.arrival_time), now, tz);
        let delayed = is_delayed(update.delay);

        Self {
            trip_id: update.trip_id.clone(),
            route_id: update.route_id.clone(),
            route_label: arrival.route_label().to_string(),
            route_name: route
                .map(|r| r.route_name.clone())
                .unwrap_or_else(|| format!("Route {}", update.route_id)),
            color: route
                .map(|r| r.badge_color())
                .unwrap_or(DEFAULT_ROUTE_COLOR)
                .to_string(),
            is_night_service: route.is_some_and(|r| r.is_night_service),
            arrival_time: arrival.arrival_time,
            eta: eta.to_string(),
            due: eta.is_due(),
            is_realtime: update.is_realtime,
            realtime_label: realtime_label(update.is_realtime).to_string(),
            delayed,
            delay_minutes: delayed.then(|| delay_minutes(update.delay)),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArrivalsPanel {
    pub state: DatasetState,
    pub message: Option<String>,
    pub retry_available: bool,
    pub arrivals: Vec<ArrivalView>,
    /// Arrivals hidden by the display limit
    pub remaining: usize,
    pub more_hint: Option<String>,
    /// Shown data is older than its stale-after budget
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Renders the arrivals panel from cached snapshots.
///
/// Missing or failed route metadata degrades to raw route ids. After a failed refetch
/// the last good arrivals are still listed under the error state.
pub fn render_arrivals(
    arrivals: &DatasetSnapshot,
    routes: &DatasetSnapshot,
    stale: bool,
    limit: usize,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<ArrivalsPanel, BoardError> {
    let route_list: &[Route] = match &routes.data {
        Some(data) => routes_of(data)?,
        None => &[],
    };
    let updates: &[TripUpdate] = match &arrivals.data {
        Some(data) => trip_updates_of(data)?,
        None => &[],
    };

    let window = order_and_limit(merge_arrivals(updates, route_list), limit);
    let views: Vec<ArrivalView> = window
        .arrivals
        .iter()
        .map(|a| ArrivalView::render(a, now, tz))
        .collect();

    let mut state = arrivals.state();
    if state == DatasetState::Ready && views.is_empty() && window.remaining == 0 {
        state = DatasetState::Empty;
    }
    let message = match state {
        DatasetState::Empty => Some(EMPTY_ARRIVALS_MESSAGE.to_string()),
        DatasetState::Error => Some(ARRIVALS_ERROR_MESSAGE.to_string()),
        DatasetState::Loading | DatasetState::Ready => None,
    };

    Ok(ArrivalsPanel {
        state,
        message,
        retry_available: state == DatasetState::Error,
        more_hint: (window.remaining > 0)
            .then(|| format!("Show {} more arrivals", window.remaining)),
        remaining: window.remaining,
        arrivals: views,
        stale: stale && arrivals.data.is_some(),
        updated_at: arrivals.updated_at,
    })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertsPanel {
    pub state: DatasetState,
    /// Most severe first, then newest
    pub alerts: Vec<ServiceAlert>,
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn render_alerts(snapshot: &DatasetSnapshot, stale: bool) -> Result<AlertsPanel, BoardError> {
    let mut alerts = match &snapshot.data {
        Some(data) => alerts_of(data)?.to_vec(),
        None => Vec::new(),
    };
    alerts.retain(|a| a.is_active);
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    Ok(AlertsPanel {
        state: snapshot.state(),
        alerts,
        stale: stale && snapshot.data.is_some(),
        updated_at: snapshot.updated_at,
    })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NightRouteView {
    pub id: String,
    pub route_number: String,
    pub route_name: String,
    pub color: String,
    pub status: RouteStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NightRoutesPanel {
    pub state: DatasetState,
    pub routes: Vec<NightRouteView>,
}

pub fn render_night_routes(snapshot: &DatasetSnapshot) -> Result<NightRoutesPanel, BoardError> {
    let routes = match &snapshot.data {
        Some(data) => routes_of(data)?
            .iter()
            .filter(|r| r.is_night_service)
            .map(|r| NightRouteView {
                id: r.id.clone(),
                route_number: r.route_number.clone(),
                route_name: r.route_name.clone(),
                color: r.badge_color().to_string(),
                status: r.status,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(NightRoutesPanel {
        state: snapshot.state(),
        routes,
    })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StopBoard {
    pub stop_id: String,
    pub rendered_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub arrivals: Section<ArrivalsPanel>,
    #[schema(value_type = Object)]
    pub alerts: Section<AlertsPanel>,
    #[schema(value_type = Object)]
    pub night_routes: Section<NightRoutesPanel>,
}

/// How a board reads its datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Read {
    /// Refetch stale or invalidated datasets first
    Refresh,
    /// Use whatever the cache holds; for re-rendering an observed board
    Cached,
}

async fn read(cache: &LiveCache, key: &DatasetKey, mode: Read) -> DatasetSnapshot {
    match mode {
        Read::Refresh => cache.get(key).await,
        Read::Cached => cache.snapshot(key),
    }
}

/// Dataset keys a stop board depends on
pub fn stop_board_keys(stop_id: &str) -> [DatasetKey; 3] {
    [
        DatasetKey::ArrivalsForStop(stop_id.to_string()),
        DatasetKey::Routes,
        DatasetKey::Alerts,
    ]
}

pub async fn stop_board(
    cache: &LiveCache,
    stop_id: &str,
    limit: usize,
    tz: Tz,
    mode: Read,
) -> StopBoard {
    let arrivals = {
        let cache = cache.clone();
        let key = DatasetKey::ArrivalsForStop(stop_id.to_string());
        run_section("arrivals", async move {
            let (arrivals, routes) = tokio::join!(
                read(&cache, &key, mode),
                read(&cache, &DatasetKey::Routes, mode)
            );
            let stale = cache.is_stale(&key);
            render_arrivals(&arrivals, &routes, stale, limit, Utc::now(), tz)
        })
    };

    let alerts = {
        let cache = cache.clone();
        run_section("alerts", async move {
            let snapshot = read(&cache, &DatasetKey::Alerts, mode).await;
            render_alerts(&snapshot, cache.is_stale(&DatasetKey::Alerts))
        })
    };

    let night_routes = {
        let cache = cache.clone();
        run_section("night routes", async move {
            let snapshot = read(&cache, &DatasetKey::Routes, mode).await;
            render_night_routes(&snapshot)
        })
    };

    let (arrivals, alerts, night_routes) = tokio::join!(arrivals, alerts, night_routes);
    StopBoard {
        stop_id: stop_id.to_string(),
        rendered_at: Utc::now(),
        arrivals,
        alerts,
        night_routes,
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VehiclesPanel {
    pub route_id: Option<String>,
    pub state: DatasetState,
    pub error: Option<String>,
    pub vehicles: Vec<VehiclePosition>,
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

pub async fn vehicles(
    cache: &LiveCache,
    route_id: Option<String>,
) -> Result<VehiclesPanel, BoardError> {
    let key = match &route_id {
        Some(route_id) => DatasetKey::VehiclesForRoute(route_id.clone()),
        None => DatasetKey::Vehicles,
    };
    let snapshot = cache.get(&key).await;
    let vehicles = match &snapshot.data {
        Some(data) => vehicles_of(data)?.to_vec(),
        None => Vec::new(),
    };

    Ok(VehiclesPanel {
        route_id,
        state: snapshot.state(),
        error: snapshot.failure.as_ref().map(|f| f.to_string()),
        vehicles,
        stale: cache.is_stale(&key) && snapshot.data.is_some(),
        updated_at: snapshot.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::fetch::testing::{network_error, ScriptedSource};
    use crate::fetch::FetchFailure;
    use crate::freshness::FreshnessTable;
    use crate::models::Severity;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Australia::Sydney;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 14, 30, 0).unwrap()
    }

    fn route(id: &str, night: bool, color: Option<&str>) -> Route {
        Route {
            id: id.to_string(),
            route_number: id.to_string(),
            route_name: format!("{id} line"),
            is_night_service: night,
            color: color.map(str::to_string),
            status: RouteStatus::Active,
        }
    }

    fn update(route_id: &str, minutes: i64, delay: i32, realtime: bool) -> TripUpdate {
        TripUpdate {
            id: format!("{route_id}-{minutes}"),
            trip_id: format!("trip_{route_id}_{minutes}"),
            route_id: route_id.to_string(),
            stop_id: "200060".to_string(),
            arrival_time: Some(now() + Duration::minutes(minutes)),
            departure_time: None,
            delay,
            is_realtime: realtime,
            timestamp: now(),
        }
    }

    fn alert(id: &str, severity: Severity, age_minutes: i64) -> ServiceAlert {
        ServiceAlert {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            severity,
            affected_routes: None,
            affected_stops: None,
            start_time: None,
            end_time: None,
            is_active: true,
            created_at: now() - Duration::minutes(age_minutes),
        }
    }

    fn ready(data: Dataset) -> DatasetSnapshot {
        DatasetSnapshot {
            data: Some(Arc::new(data)),
            updated_at: Some(now()),
            ..Default::default()
        }
    }

    fn failed() -> DatasetSnapshot {
        DatasetSnapshot {
            failure: Some(FetchFailure {
                error: network_error(),
                attempts: 3,
            }),
            ..Default::default()
        }
    }

    fn central_routes() -> DatasetSnapshot {
        ready(Dataset::Routes(vec![
            route("N10", true, Some("#3B82F6")),
            route("N50", true, None),
            route("380", false, None),
        ]))
    }

    #[test]
    fn test_loading_panel() {
        let panel = render_arrivals(
            &DatasetSnapshot::default(),
            &DatasetSnapshot::default(),
            true,
            5,
            now(),
            Sydney,
        )
        .unwrap();
        assert_eq!(panel.state, DatasetState::Loading);
        assert!(panel.arrivals.is_empty());
        assert!(panel.message.is_none());
        assert!(!panel.stale);
    }

    #[test]
    fn test_empty_and_error_are_distinct() {
        let empty = render_arrivals(
            &ready(Dataset::Arrivals(vec![])),
            &central_routes(),
            false,
            5,
            now(),
            Sydney,
        )
        .unwrap();
        assert_eq!(empty.state, DatasetState::Empty);
        assert_eq!(empty.message.as_deref(), Some(EMPTY_ARRIVALS_MESSAGE));
        assert!(!empty.retry_available);

        let error =
            render_arrivals(&failed(), &central_routes(), false, 5, now(), Sydney).unwrap();
        assert_eq!(error.state, DatasetState::Error);
        assert_eq!(error.message.as_deref(), Some(ARRIVALS_ERROR_MESSAGE));
        assert!(error.retry_available);
    }

    #[test]
    fn test_updates_without_times_render_as_empty() {
        let mut untimed = update("N10", 3, 0, true);
        untimed.arrival_time = None;
        let panel = render_arrivals(
            &ready(Dataset::Arrivals(vec![untimed])),
            &central_routes(),
            false,
            5,
            now(),
            Sydney,
        )
        .unwrap();
        assert_eq!(panel.state, DatasetState::Empty);
    }

    #[test]
    fn test_central_station_panel() {
        let arrivals = ready(Dataset::Arrivals(vec![
            update("X1", 18, 0, false),
            update("N10", 3, 0, true),
            update("380", 12, 0, true),
            update("N50", 8, 120, true),
        ]));
        let panel =
            render_arrivals(&arrivals, &central_routes(), false, 5, now(), Sydney).unwrap();

        assert_eq!(panel.state, DatasetState::Ready);
        let etas: Vec<&str> = panel.arrivals.iter().map(|a| a.eta.as_str()).collect();
        assert_eq!(etas, ["3 min", "8 min", "12 min", "18 min"]);

        let n10 = &panel.arrivals[0];
        assert_eq!(n10.color, "#3B82F6");
        assert!(n10.is_night_service);
        assert_eq!(n10.realtime_label, "Real-time");

        let n50 = &panel.arrivals[1];
        assert!(n50.delayed);
        assert_eq!(n50.delay_minutes, Some(2));
        assert_eq!(n50.color, DEFAULT_ROUTE_COLOR);

        let unknown = &panel.arrivals[3];
        assert_eq!(unknown.route_label, "X1");
        assert_eq!(unknown.route_name, "Route X1");
        assert_eq!(unknown.color, DEFAULT_ROUTE_COLOR);
        assert!(!unknown.is_night_service);
        assert_eq!(unknown.realtime_label, "Scheduled");
        assert!(!unknown.delayed);
        assert_eq!(unknown.delay_minutes, None);

        assert_eq!(panel.remaining, 0);
        assert!(panel.more_hint.is_none());
    }

    #[test]
    fn test_more_hint_counts_hidden_arrivals() {
        let updates = (1..=7).map(|m| update("N10", m, 0, true)).collect();
        let panel = render_arrivals(
            &ready(Dataset::Arrivals(updates)),
            &central_routes(),
            false,
            5,
            now(),
            Sydney,
        )
        .unwrap();
        assert_eq!(panel.arrivals.len(), 5);
        assert_eq!(panel.remaining, 2);
        assert_eq!(panel.more_hint.as_deref(), Some("Show 2 more arrivals"));
    }

    #[test]
    fn test_zero_limit_is_not_reported_empty() {
        let updates = (1..=4).map(|m| update("N10", m, 0, true)).collect();
        let panel = render_arrivals(
            &ready(Dataset::Arrivals(updates)),
            &central_routes(),
            false,
            0,
            now(),
            Sydney,
        )
        .unwrap();
        assert_eq!(panel.state, DatasetState::Ready);
        assert!(panel.message.is_none());
        assert_eq!(panel.more_hint.as_deref(), Some("Show 4 more arrivals"));
    }

    #[test]
    fn test_labels_follow_render_time_not_fetch_time() {
        let arrivals = ready(Dataset::Arrivals(vec![update("N10", 3, 0, true)]));
        let at_fetch =
            render_arrivals(&arrivals, &central_routes(), false, 5, now(), Sydney).unwrap();
        let later = now() + Duration::minutes(3);
        let rerendered =
            render_arrivals(&arrivals, &central_routes(), true, 5, later, Sydney).unwrap();

        assert_eq!(at_fetch.arrivals[0].eta, "3 min");
        assert_eq!(rerendered.arrivals[0].eta, "Due");
        assert!(rerendered.arrivals[0].due);
        assert!(rerendered.stale);
    }

    #[test]
    fn test_error_keeps_last_good_arrivals() {
        let mut snapshot = ready(Dataset::Arrivals(vec![update("N10", 3, 0, true)]));
        snapshot.failure = failed().failure;
        let panel =
            render_arrivals(&snapshot, &central_routes(), false, 5, now(), Sydney).unwrap();
        assert_eq!(panel.state, DatasetState::Error);
        assert_eq!(panel.arrivals.len(), 1);
    }

    #[test]
    fn test_wrong_dataset_kind_is_an_error() {
        let err = render_arrivals(
            &central_routes(),
            &central_routes(),
            false,
            5,
            now(),
            Sydney,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BoardError::UnexpectedDataset {
                expected: "arrivals",
                found: "routes"
            }
        ));
    }

    #[test]
    fn test_alerts_ordered_by_severity_then_newest() {
        let mut inactive = alert("old-news", Severity::Critical, 1);
        inactive.is_active = false;
        let snapshot = ready(Dataset::Alerts(vec![
            alert("info", Severity::Info, 1),
            alert("warning-old", Severity::Warning, 30),
            alert("critical", Severity::Critical, 60),
            alert("warning-new", Severity::Warning, 5),
            inactive,
        ]));
        let panel = render_alerts(&snapshot, false).unwrap();
        let ids: Vec<&str> = panel.alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["critical", "warning-new", "warning-old", "info"]);
    }

    #[test]
    fn test_night_routes_panel() {
        let panel = render_night_routes(&central_routes()).unwrap();
        let numbers: Vec<&str> = panel
            .routes
            .iter()
            .map(|r| r.route_number.as_str())
            .collect();
        assert_eq!(numbers, ["N10", "N50"]);
        assert_eq!(panel.routes[1].color, DEFAULT_ROUTE_COLOR);
    }

    async fn explode() -> Result<u32, BoardError> {
        panic!("section blew up")
    }

    #[tokio::test]
    async fn test_panicking_section_is_contained() {
        let (broken, healthy) = tokio::join!(
            run_section("broken", explode()),
            run_section("healthy", async { Ok::<_, BoardError>(7u32) })
        );
        assert!(matches!(broken, Section::Failed { .. }));
        assert_eq!(healthy.panel(), Some(&7));
    }

    fn board_cache(source: &Arc<ScriptedSource>) -> LiveCache {
        LiveCache::new(
            source.clone(),
            FreshnessTable::default(),
            RetryConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_arrivals_do_not_block_siblings() {
        let source = ScriptedSource::new();
        let stop = "200060";
        source.always(
            DatasetKey::ArrivalsForStop(stop.to_string()),
            Err(network_error()),
        );
        source.always(
            DatasetKey::Routes,
            Ok(Dataset::Routes(vec![
                route("N10", true, None),
                route("N50", true, None),
                route("380", false, None),
            ])),
        );
        source.always(
            DatasetKey::Alerts,
            Ok(Dataset::Alerts(vec![alert("critical", Severity::Critical, 1)])),
        );
        let cache = board_cache(&source);

        let board = stop_board(&cache, stop, 5, Sydney, Read::Refresh).await;
        let arrivals = board.arrivals.panel().unwrap();
        assert_eq!(arrivals.state, DatasetState::Error);
        assert!(arrivals.retry_available);
        assert_eq!(board.alerts.panel().unwrap().alerts.len(), 1);
        assert_eq!(board.night_routes.panel().unwrap().routes.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_section_fails_alone() {
        let source = ScriptedSource::new();
        let stop = "200060";
        source.always(
            DatasetKey::ArrivalsForStop(stop.to_string()),
            Ok(Dataset::Stops(vec![])),
        );
        source.always(DatasetKey::Routes, Ok(Dataset::Routes(vec![])));
        source.always(DatasetKey::Alerts, Ok(Dataset::Alerts(vec![])));
        let cache = board_cache(&source);

        let board = stop_board(&cache, stop, 5, Sydney, Read::Refresh).await;
        assert!(matches!(board.arrivals, Section::Failed { .. }));
        assert_eq!(board.alerts.panel().unwrap().state, DatasetState::Empty);
        assert_eq!(board.night_routes.panel().unwrap().state, DatasetState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_read_does_not_fetch() {
        let source = ScriptedSource::new();
        let cache = board_cache(&source);

        let board = stop_board(&cache, "200060", 5, Sydney, Read::Cached).await;
        assert_eq!(source.total_calls(), 0);
        assert_eq!(board.arrivals.panel().unwrap().state, DatasetState::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vehicles_for_route() {
        let source = ScriptedSource::new();
        source.always(
            DatasetKey::VehiclesForRoute("N10".to_string()),
            Ok(Dataset::Vehicles(vec![VehiclePosition {
                id: "vp1".to_string(),
                vehicle_id: "bus_1234".to_string(),
                route_id: "N10".to_string(),
                latitude: -33.8830,
                longitude: 151.2063,
                bearing: Some(90.0),
                speed: Some(32.5),
                timestamp: now(),
            }])),
        );
        let cache = board_cache(&source);

        let panel = vehicles(&cache, Some("N10".to_string())).await.unwrap();
        assert_eq!(panel.state, DatasetState::Ready);
        assert_eq!(panel.vehicles[0].vehicle_id, "bus_1234");
        assert!(panel.error.is_none());

        let all = vehicles(&cache, None).await.unwrap();
        assert_eq!(all.state, DatasetState::Error);
        assert!(all.error.is_some());
    }
}
