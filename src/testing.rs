//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::geocode::{AddressSuggestion, Coordinate, GeocodeError, Geocoder};

pub(crate) fn suggestion(formatted: &str, lat: f64, lng: f64) -> AddressSuggestion {
    AddressSuggestion::geocoded(formatted, Coordinate::new(lat, lng).unwrap())
}

/// In-memory geocoder.
///
/// Forward answers are keyed by the exact query text; unknown queries yield
/// `NoResults`. Reverse lookups answer `Adresse <lat>, <lng>`. Delays are keyed
/// by query text or by `Coordinate::to_address_fallback`.
#[derive(Default)]
pub(crate) struct FakeGeocoder {
    forward: Mutex<HashMap<String, Result<Vec<AddressSuggestion>, GeocodeError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    forward_calls: Mutex<Vec<String>>,
    reverse_calls: AtomicUsize,
    reverse_failure: Mutex<Option<GeocodeError>>,
}

impl FakeGeocoder {
    pub(crate) fn set_forward(
        &self,
        query: &str,
        result: Result<Vec<AddressSuggestion>, GeocodeError>,
    ) {
        self.forward.lock().unwrap().insert(query.to_string(), result);
    }

    pub(crate) fn delay(&self, key: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
    }

    pub(crate) fn fail_reverse(&self, failure: Option<GeocodeError>) {
        *self.reverse_failure.lock().unwrap() = failure;
    }

    pub(crate) fn forward_calls(&self) -> Vec<String> {
        self.forward_calls.lock().unwrap().clone()
    }

    pub(crate) fn reverse_calls(&self) -> usize {
        self.reverse_calls.load(Ordering::SeqCst)
    }

    fn delay_for(&self, key: &str) -> Option<Duration> {
        self.delays.lock().unwrap().get(key).copied()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn forward_search(&self, text: &str) -> Result<Vec<AddressSuggestion>, GeocodeError> {
        self.forward_calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delay_for(text) {
            tokio::time::sleep(delay).await;
        }
        self.forward
            .lock()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or(Err(GeocodeError::NoResults))
    }

    async fn reverse_geocode(
        &self,
        coordinate: Coordinate,
    ) -> Result<AddressSuggestion, GeocodeError> {
        self.reverse_calls.fetch_add(1, Ordering::SeqCst);
        let key = coordinate.to_address_fallback();
        if let Some(delay) = self.delay_for(&key) {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.reverse_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(AddressSuggestion::geocoded(format!("Adresse {key}"), coordinate))
    }
}
