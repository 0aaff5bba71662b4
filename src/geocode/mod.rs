//! Geocoding module
//!
//! Address value types and the HTTP client for the geocoding provider.

mod address;
mod client;

pub use address::{
    extract_city, extract_postal_code, rank_by_postal_code, AddressSuggestion, Coordinate,
    SourceKind,
};
pub use client::{GeocodeClient, GeocodeError, Geocoder};
