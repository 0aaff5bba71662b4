//! Citizen report client core
//!
//! Address search and selection, the report/event wizard, and the staged
//! submission pipeline used by the `citizen-report` binary.

pub mod calendar;
pub mod config;
pub mod geocode;
pub mod identity;
pub mod location;
pub mod submission;
pub mod wizard;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use geocode::{AddressSuggestion, Coordinate, GeocodeClient, GeocodeError, Geocoder};
pub use location::{AddressResolver, LocationSelection, LocationSelectionState};
pub use submission::{SubmissionPipeline, SubmissionProgress, SubmissionReceipt, SubmitError};
pub use wizard::{FormSnapshot, PhotoRef, SubmissionKind, SubmissionWizard, WizardStep};
