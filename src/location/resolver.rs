//! Address resolver
//!
//! Turns typed queries into ranked suggestions and handles the "use my
//! position" flow. Searches are debounced, recent results are reused, and a
//! response is dropped if a newer search started while it was in flight.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::GeocodingConfig;
use crate::geocode::{rank_by_postal_code, AddressSuggestion, Coordinate, GeocodeError, Geocoder};

/// Result of one `search` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Blank query or the current-location label; nothing was looked up.
    Skipped,
    Suggestions(Vec<AddressSuggestion>),
    /// A newer search was issued before this one finished.
    Superseded,
    Failed(GeocodeError),
}

impl SearchOutcome {
    pub fn suggestions(&self) -> &[AddressSuggestion] {
        match self {
            SearchOutcome::Suggestions(list) => list,
            _ => &[],
        }
    }
}

/// Street address behind the current-location label.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentAddress {
    Idle,
    Pending {
        coordinate: Coordinate,
    },
    Resolved {
        coordinate: Coordinate,
        formatted: String,
    },
    Failed {
        coordinate: Coordinate,
        message: String,
    },
}

impl CurrentAddress {
    /// True once the lookup for `coordinate` has finished either way.
    pub fn is_settled_for(&self, coordinate: Coordinate) -> bool {
        match self {
            CurrentAddress::Resolved { coordinate: c, .. }
            | CurrentAddress::Failed { coordinate: c, .. } => *c == coordinate,
            _ => false,
        }
    }

    pub fn resolved_address(&self) -> Option<&str> {
        match self {
            CurrentAddress::Resolved { formatted, .. } => Some(formatted),
            _ => None,
        }
    }
}

type Lookup = Result<Vec<AddressSuggestion>, GeocodeError>;

/// A forward lookup still on the wire, joinable by later searches for the
/// same key.
struct PendingLookup {
    id: u64,
    result: watch::Receiver<Option<Lookup>>,
}

struct ResolverState {
    suggestions: Vec<AddressSuggestion>,
    error: Option<String>,
    cache: Option<LruCache<String, Vec<AddressSuggestion>>>,
    pending: HashMap<String, PendingLookup>,
    next_lookup_id: u64,
}

struct Inner {
    geocoder: Arc<dyn Geocoder>,
    current_location_label: String,
    debounce: Duration,
    search_generation: AtomicU64,
    location_generation: AtomicU64,
    state: Mutex<ResolverState>,
    current_address: watch::Sender<CurrentAddress>,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct AddressResolver {
    inner: Arc<Inner>,
}

impl AddressResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, config: &GeocodingConfig) -> Self {
        let (current_address, _) = watch::channel(CurrentAddress::Idle);
        let cache = NonZeroUsize::new(config.cache_capacity).map(LruCache::new);

        Self {
            inner: Arc::new(Inner {
                geocoder,
                current_location_label: config.current_location_label.clone(),
                debounce: config.debounce(),
                search_generation: AtomicU64::new(0),
                location_generation: AtomicU64::new(0),
                state: Mutex::new(ResolverState {
                    suggestions: Vec::new(),
                    error: None,
                    cache,
                    pending: HashMap::new(),
                    next_lookup_id: 0,
                }),
                current_address,
            }),
        }
    }

    pub fn current_location_label(&self) -> &str {
        &self.inner.current_location_label
    }

    /// Look up `query` and publish ranked suggestions.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let generation = self.bump_search_generation();
        let query = query.trim();

        if query.is_empty() || query == self.inner.current_location_label {
            debug!("search skipped for blank or current-location query");
            self.with_state(|state| {
                state.suggestions.clear();
                state.error = None;
            });
            return SearchOutcome::Skipped;
        }

        let key = cache_key(query);
        let cached = self.with_state(|state| {
            let hit = state.cache.as_mut().and_then(|c| c.get(&key).cloned());
            if let Some(list) = &hit {
                state.suggestions = list.clone();
                state.error = None;
            }
            hit
        });
        if let Some(list) = cached {
            debug!(count = list.len(), "search served from cache");
            return SearchOutcome::Suggestions(list);
        }

        if !self.inner.debounce.is_zero() {
            tokio::time::sleep(self.inner.debounce).await;
            if !self.is_latest_search(generation) {
                return SearchOutcome::Superseded;
            }
        }

        let result = self.shared_lookup(&key, query).await;

        if !self.is_latest_search(generation) {
            debug!("dropping stale search response");
            return SearchOutcome::Superseded;
        }

        match result {
            Ok(list) => {
                self.with_state(|state| {
                    state.suggestions = list.clone();
                    state.error = None;
                });
                SearchOutcome::Suggestions(list)
            }
            Err(err) => {
                warn!(error = %err, "address search failed");
                self.with_state(|state| {
                    state.suggestions.clear();
                    state.error = Some(err.to_string());
                });
                SearchOutcome::Failed(err)
            }
        }
    }

    /// One provider request per key at a time.
    ///
    /// A search for a key that is already on the wire waits for that request.
    /// Ranked results are cached even when the search that issued them has
    /// since been superseded.
    async fn shared_lookup(&self, key: &str, query: &str) -> Lookup {
        // An earlier request may have finished during the debounce.
        let cached =
            self.with_state(|state| state.cache.as_mut().and_then(|c| c.get(key).cloned()));
        if let Some(list) = cached {
            return Ok(list);
        }

        let joined = self.with_state(|state| {
            state
                .pending
                .get(key)
                .filter(|p| p.result.has_changed().is_ok())
                .map(|p| p.result.clone())
        });
        if let Some(mut rx) = joined {
            debug!("joining in-flight lookup");
            let shared = rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|done| (*done).clone());
            if let Some(result) = shared {
                return result;
            }
        }

        let (tx, rx) = watch::channel(None);
        let id = self.with_state(|state| {
            state.next_lookup_id += 1;
            let id = state.next_lookup_id;
            state
                .pending
                .insert(key.to_string(), PendingLookup { id, result: rx });
            id
        });

        let mut result = self.inner.geocoder.forward_search(query).await;
        if let Ok(list) = result.as_mut() {
            rank_by_postal_code(list);
        }

        self.with_state(|state| {
            if state.pending.get(key).is_some_and(|p| p.id == id) {
                state.pending.remove(key);
            }
            if let (Ok(list), Some(cache)) = (&result, state.cache.as_mut()) {
                cache.put(key.to_string(), list.clone());
            }
        });
        tx.send_replace(Some(result.clone()));
        result
    }

    /// Sentinel suggestion for the device position.
    ///
    /// Returns immediately. The street address is looked up in the background
    /// and published on [`AddressResolver::current_address`].
    pub fn resolve_current_location(&self, coordinate: Coordinate) -> AddressSuggestion {
        let generation = self.inner.location_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .current_address
            .send_replace(CurrentAddress::Pending { coordinate });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    let result = inner.geocoder.reverse_geocode(coordinate).await;
                    if inner.location_generation.load(Ordering::SeqCst) != generation {
                        return;
                    }
                    let next = match result {
                        Ok(suggestion) => CurrentAddress::Resolved {
                            coordinate,
                            formatted: suggestion.formatted,
                        },
                        Err(err) => {
                            warn!(error = %err, "current location lookup failed");
                            CurrentAddress::Failed {
                                coordinate,
                                message: err.to_string(),
                            }
                        }
                    };
                    inner.current_address.send_replace(next);
                });
            }
            Err(_) => {
                warn!("no async runtime, current location address stays unknown");
                self.inner
                    .current_address
                    .send_replace(CurrentAddress::Failed {
                        coordinate,
                        message: "no async runtime".to_string(),
                    });
            }
        }

        AddressSuggestion::current_location(self.inner.current_location_label.clone(), coordinate)
    }

    /// Reverse geocode a single point (map taps).
    pub async fn reverse(&self, coordinate: Coordinate) -> Result<AddressSuggestion, GeocodeError> {
        self.inner.geocoder.reverse_geocode(coordinate).await
    }

    /// Drop the suggestion list, including anything still in flight.
    pub fn clear_suggestions(&self) {
        self.bump_search_generation();
        self.with_state(|state| {
            state.suggestions.clear();
            state.error = None;
        });
    }

    pub fn suggestions(&self) -> Vec<AddressSuggestion> {
        self.with_state(|state| state.suggestions.clone())
    }

    pub fn error_message(&self) -> Option<String> {
        self.with_state(|state| state.error.clone())
    }

    pub fn current_address(&self) -> watch::Receiver<CurrentAddress> {
        self.inner.current_address.subscribe()
    }

    fn bump_search_generation(&self) -> u64 {
        self.inner.search_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest_search(&self, generation: u64) -> bool {
        self.inner.search_generation.load(Ordering::SeqCst) == generation
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ResolverState) -> R) -> R {
        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

fn cache_key(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
