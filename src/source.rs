//! Boundary the live cache reads datasets through.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::fetch::FetchError;
use crate::freshness::DatasetKey;
use crate::models::{Route, ServiceAlert, Stop, TripUpdate, VehiclePosition};
use crate::store::MemStore;

/// Payload of one dataset fetch
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Stops(Vec<Stop>),
    Routes(Vec<Route>),
    Vehicles(Vec<VehiclePosition>),
    Arrivals(Vec<TripUpdate>),
    Alerts(Vec<ServiceAlert>),
}

impl Dataset {
    pub fn len(&self) -> usize {
        match self {
            Dataset::Stops(v) => v.len(),
            Dataset::Routes(v) => v.len(),
            Dataset::Vehicles(v) => v.len(),
            Dataset::Arrivals(v) => v.len(),
            Dataset::Alerts(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Stops(_) => "stops",
            Dataset::Routes(_) => "routes",
            Dataset::Vehicles(_) => "vehicles",
            Dataset::Arrivals(_) => "arrivals",
            Dataset::Alerts(_) => "alerts",
        }
    }
}

pub trait TransitSource: Send + Sync {
    fn fetch<'a>(&'a self, key: &'a DatasetKey) -> BoxFuture<'a, Result<Dataset, FetchError>>;
}

/// Reads datasets from the in-process store
pub struct StoreSource {
    store: Arc<MemStore>,
}

impl StoreSource {
    pub fn new(store: Arc<MemStore>) -> Self {
        Self { store }
    }
}

impl TransitSource for StoreSource {
    fn fetch<'a>(&'a self, key: &'a DatasetKey) -> BoxFuture<'a, Result<Dataset, FetchError>> {
        async move {
            let store = &self.store;
            let dataset = match key {
                DatasetKey::Stops => Dataset::Stops(store.list_stops().await),
                DatasetKey::Routes => Dataset::Routes(store.list_routes().await),
                DatasetKey::Vehicles => Dataset::Vehicles(store.list_vehicle_positions().await),
                DatasetKey::VehiclesForRoute(route_id) => {
                    Dataset::Vehicles(store.vehicle_positions_for_route(route_id).await)
                }
                DatasetKey::ArrivalsForStop(stop_id) => {
                    Dataset::Arrivals(store.trip_updates_for_stop(stop_id).await)
                }
                DatasetKey::Alerts => Dataset::Alerts(store.active_service_alerts().await),
                DatasetKey::AlertsForRoute(route_id) => {
                    Dataset::Alerts(store.alerts_for_route(route_id).await)
                }
            };
            Ok(dataset)
        }
        .boxed()
    }
}

/// Reads datasets from another instance's REST API
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSource {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn url_for(&self, key: &DatasetKey) -> String {
        format!("{}{}", self.base_url, key.path())
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &DatasetKey) -> Result<T, FetchError> {
        let mut request = self.client.get(self.url_for(key));
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("apikey {}", api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                path: key.path(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl TransitSource for HttpSource {
    fn fetch<'a>(&'a self, key: &'a DatasetKey) -> BoxFuture<'a, Result<Dataset, FetchError>> {
        async move {
            let dataset = match key {
                DatasetKey::Stops => Dataset::Stops(self.get_json(key).await?),
                DatasetKey::Routes => Dataset::Routes(self.get_json(key).await?),
                DatasetKey::Vehicles | DatasetKey::VehiclesForRoute(_) => {
                    Dataset::Vehicles(self.get_json(key).await?)
                }
                DatasetKey::ArrivalsForStop(_) => Dataset::Arrivals(self.get_json(key).await?),
                DatasetKey::Alerts | DatasetKey::AlertsForRoute(_) => {
                    Dataset::Alerts(self.get_json(key).await?)
                }
            };
            Ok(dataset)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_store_source_filters_by_parent_key() {
        let store = Arc::new(MemStore::seeded(Utc::now()));
        let source = StoreSource::new(store);

        let central = source
            .fetch(&DatasetKey::ArrivalsForStop("200060".to_string()))
            .await
            .unwrap();
        assert_eq!(central.kind(), "arrivals");
        assert_eq!(central.len(), 4);

        let wynyard = source
            .fetch(&DatasetKey::ArrivalsForStop("200069".to_string()))
            .await
            .unwrap();
        assert!(wynyard.is_empty());

        let routes = source.fetch(&DatasetKey::Routes).await.unwrap();
        assert_eq!(routes.len(), 5);
    }

    #[test]
    fn test_http_source_urls() {
        let source =
            HttpSource::new("http://upstream:3000/", Duration::from_secs(10), None).unwrap();
        assert_eq!(
            source.url_for(&DatasetKey::ArrivalsForStop("200060".to_string())),
            "http://upstream:3000/api/arrivals/stop/200060"
        );
        assert_eq!(
            source.url_for(&DatasetKey::Alerts),
            "http://upstream:3000/api/alerts"
        );
    }

    #[tokio::test]
    async fn test_http_source_unreachable_is_network_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let source =
            HttpSource::new("http://127.0.0.1:9", Duration::from_secs(2), None).unwrap();
        let err = source.fetch(&DatasetKey::Routes).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert!(err.is_transient());
    }
}
