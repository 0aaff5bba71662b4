//! Location selection state
//!
//! Holds the coordinate and label shown on the location step, plus the
//! address that will go into the submission payload. For "my position" the
//! two differ: the label is the sentinel while the address arrives later.

use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::resolver::{AddressResolver, CurrentAddress};
use crate::geocode::{AddressSuggestion, Coordinate, GeocodeError};

/// Address text destined for the submission payload.
#[derive(Debug, Clone)]
pub enum PayloadAddress {
    Unset,
    Known(String),
    /// Follows the resolver's background lookup for this coordinate.
    CurrentLocation {
        coordinate: Coordinate,
        updates: watch::Receiver<CurrentAddress>,
    },
}

#[derive(Debug, Clone)]
pub struct LocationSelection {
    pub display_text: String,
    pub coordinate: Option<Coordinate>,
    pub is_current_location_label: bool,
    pub payload_address: PayloadAddress,
}

impl Default for LocationSelection {
    fn default() -> Self {
        Self {
            display_text: String::new(),
            coordinate: None,
            is_current_location_label: false,
            payload_address: PayloadAddress::Unset,
        }
    }
}

impl LocationSelection {
    pub fn is_resolved(&self) -> bool {
        self.coordinate.is_some()
    }

    /// Address to submit.
    ///
    /// For the current location this waits up to `wait` for the background
    /// lookup, then falls back to the coordinate text. The sentinel label is
    /// never returned.
    pub async fn payload_address(&self, wait: Duration) -> Option<String> {
        let coordinate = self.coordinate?;
        match &self.payload_address {
            PayloadAddress::Known(address) => Some(address.clone()),
            PayloadAddress::Unset => Some(coordinate.to_address_fallback()),
            PayloadAddress::CurrentLocation {
                coordinate: pending,
                updates,
            } => {
                let pending = *pending;
                let mut updates = updates.clone();
                let settled =
                    tokio::time::timeout(wait, updates.wait_for(|a| a.is_settled_for(pending)))
                        .await;
                let resolved = match settled {
                    Ok(Ok(current)) => current.resolved_address().map(str::to_string),
                    Ok(Err(_)) => None,
                    Err(_) => {
                        warn!("current location address not ready, using coordinates");
                        None
                    }
                };
                Some(resolved.unwrap_or_else(|| pending.to_address_fallback()))
            }
        }
    }
}

pub struct LocationSelectionState {
    resolver: AddressResolver,
    selection: LocationSelection,
}

impl LocationSelectionState {
    pub fn new(resolver: AddressResolver) -> Self {
        Self {
            resolver,
            selection: LocationSelection::default(),
        }
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    pub fn selection(&self) -> &LocationSelection {
        &self.selection
    }

    pub fn select_suggestion(&mut self, suggestion: &AddressSuggestion) {
        let payload_address = if suggestion.is_current_location() {
            PayloadAddress::CurrentLocation {
                coordinate: suggestion.coordinate,
                updates: self.resolver.current_address(),
            }
        } else {
            PayloadAddress::Known(suggestion.formatted.clone())
        };

        self.selection = LocationSelection {
            display_text: suggestion.formatted.clone(),
            coordinate: Some(suggestion.coordinate),
            is_current_location_label: suggestion.is_current_location(),
            payload_address,
        };
        self.resolver.clear_suggestions();
        debug!(
            current_location = suggestion.is_current_location(),
            "location selected"
        );
    }

    /// Reverse geocode a tapped point and select it.
    ///
    /// The pin stays where the citizen tapped; only the text comes from the
    /// geocoder. On failure the previous selection is kept.
    pub async fn select_from_map_tap(
        &mut self,
        coordinate: Coordinate,
    ) -> Result<&LocationSelection, GeocodeError> {
        let found = self.resolver.reverse(coordinate).await.map_err(|err| {
            warn!(error = %err, "map tap could not be geocoded");
            err
        })?;
        self.select_suggestion(&AddressSuggestion::geocoded(found.formatted, coordinate));
        Ok(&self.selection)
    }

    /// Pick the device position; see [`AddressResolver::resolve_current_location`].
    pub fn select_current_location(&mut self, coordinate: Coordinate) -> &LocationSelection {
        let suggestion = self.resolver.resolve_current_location(coordinate);
        self.select_suggestion(&suggestion);
        &self.selection
    }

    pub fn clear(&mut self) {
        self.selection = LocationSelection::default();
    }
}
