//! Geocoding provider client
//!
//! Forward and reverse lookups against a `GET /geocode?q=..&key=..` endpoint.
//! Provider results are narrowed here; nothing provider-specific leaves this file.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::address::{replace_placeholder, AddressSuggestion, Coordinate};
use crate::config::GeocodingConfig;

/// Provider text for roads without a name.
const UNNAMED_ROAD: &str = "unnamed road";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeocodeError {
    #[error("Service d'adresses injoignable : {0}")]
    Network(String),

    #[error("Aucune adresse trouvée")]
    NoResults,
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        GeocodeError::Network(err.to_string())
    }
}

/// Forward and reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn forward_search(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError>;

    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<AddressSuggestion, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    results: Vec<ProviderResult>,
}

#[derive(Debug, Deserialize)]
struct ProviderResult {
    #[serde(default)]
    formatted: Option<String>,
    #[serde(default)]
    geometry: Option<ProviderGeometry>,
}

#[derive(Debug, Deserialize)]
struct ProviderGeometry {
    lat: f64,
    lng: f64,
}

/// HTTP geocoding client
pub struct GeocodeClient {
    client: Client,
    endpoint: String,
    api_key: String,
    language: Option<String>,
    unknown_road_label: String,
}

impl GeocodeClient {
    pub fn new(config: &GeocodingConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_seconds.max(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.base_url.trim().to_string(),
            api_key: config.api_key.clone(),
            language: config
                .language
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
            unknown_road_label: config.unknown_road_label.clone(),
        }
    }

    async fn lookup(&self, q: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        let mut query: Vec<(&str, &str)> = vec![("q", q), ("key", self.api_key.as_str())];
        if let Some(language) = self.language.as_deref() {
            query.push(("language", language));
        }

        let response = self.client.get(&self.endpoint).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "geocoding provider returned an error status");
            return Err(GeocodeError::Network(format!("HTTP {}", status.as_u16())));
        }

        let body: ProviderResponse = response.json().await?;
        let suggestions = self.narrow(body);
        debug!(count = suggestions.len(), "geocoding lookup finished");

        if suggestions.is_empty() {
            return Err(GeocodeError::NoResults);
        }
        Ok(suggestions)
    }

    fn narrow(&self, body: ProviderResponse) -> Vec<AddressSuggestion> {
        body.results
            .into_iter()
            .filter_map(|result| {
                let formatted = result.formatted?.trim().to_string();
                if formatted.is_empty() {
                    return None;
                }
                let geometry = result.geometry?;
                let coordinate = Coordinate::new(geometry.lat, geometry.lng)?;
                Some(AddressSuggestion::geocoded(
                    self.normalize(&formatted),
                    coordinate,
                ))
            })
            .collect()
    }

    fn normalize(&self, formatted: &str) -> String {
        replace_placeholder(formatted, UNNAMED_ROAD, &self.unknown_road_label)
    }
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn forward_search(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        self.lookup(text.trim()).await
    }

    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<AddressSuggestion, GeocodeError> {
        // Serialized as `lat+lng` by the query encoder.
        let q = format!("{} {}", coordinate.latitude, coordinate.longitude);
        let mut results = self.lookup(&q).await?;
        Ok(results.swap_remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    async fn spawn_server(app: Router) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, handle)
    }

    fn client_for(addr: SocketAddr) -> GeocodeClient {
        GeocodeClient::new(&GeocodingConfig {
            base_url: format!("http://{addr}/geocode"),
            api_key: "test-key".to_string(),
            timeout_seconds: 2,
            ..GeocodingConfig::default()
        })
    }

    fn provider_body() -> Value {
        json!({
            "results": [
                {
                    "formatted": "10 Rue de la Paix, 75002 Paris, France",
                    "geometry": { "lat": 48.8687, "lng": 2.3318 },
                    "confidence": 9,
                    "components": { "postcode": "75002" }
                },
                {
                    "formatted": "unnamed road, 31000 Toulouse, France",
                    "geometry": { "lat": 43.6, "lng": 1.44 }
                },
                { "formatted": "no geometry here" },
                {
                    "formatted": "Broken",
                    "geometry": { "lat": 123.0, "lng": 0.0 }
                }
            ]
        })
    }

    #[tokio::test]
    async fn forward_search_narrows_and_normalizes() {
        let seen: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_for_route = Arc::clone(&seen);
        let app = Router::new().route(
            "/geocode",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let seen = Arc::clone(&seen_for_route);
                async move {
                    seen.lock().unwrap().push(params);
                    Json(provider_body())
                }
            }),
        );
        let (addr, handle) = spawn_server(app).await;

        let results = client_for(addr)
            .forward_search("  10 rue de la Paix ")
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].formatted, "10 Rue de la Paix, 75002 Paris, France");
        assert_eq!(results[0].coordinate, Coordinate::new(48.8687, 2.3318).unwrap());
        assert_eq!(results[1].formatted, "Route inconnue, 31000 Toulouse, France");

        let params = seen.lock().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["q"], "10 rue de la Paix");
        assert_eq!(params[0]["key"], "test-key");
        assert_eq!(params[0]["language"], "fr");

        handle.abort();
    }

    #[tokio::test]
    async fn reverse_geocode_sends_lat_plus_lng_and_takes_first() {
        let seen: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let seen_for_route = Arc::clone(&seen);
        let app = Router::new().route(
            "/geocode",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let seen = Arc::clone(&seen_for_route);
                async move {
                    *seen.lock().unwrap() = params.get("q").cloned();
                    Json(provider_body())
                }
            }),
        );
        let (addr, handle) = spawn_server(app).await;

        let coordinate = Coordinate::new(48.8687, 2.3318).unwrap();
        let result = client_for(addr).reverse_geocode(coordinate).await.unwrap();

        assert_eq!(result.formatted, "10 Rue de la Paix, 75002 Paris, France");
        assert_eq!(seen.lock().unwrap().as_deref(), Some("48.8687 2.3318"));

        handle.abort();
    }

    #[tokio::test]
    async fn empty_results_are_distinguished_from_failures() {
        let app = Router::new().route("/geocode", get(|| async { Json(json!({ "results": [] })) }));
        let (addr, handle) = spawn_server(app).await;
        let err = client_for(addr).forward_search("nowhere").await.unwrap_err();
        assert_eq!(err, GeocodeError::NoResults);
        handle.abort();

        let app = Router::new().route(
            "/geocode",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let (addr, handle) = spawn_server(app).await;
        let err = client_for(addr).forward_search("anything").await.unwrap_err();
        assert_eq!(err, GeocodeError::Network("HTTP 503".to_string()));
        handle.abort();
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(addr).forward_search("anything").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Network(_)));
    }
}
