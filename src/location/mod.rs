//! Location module
//!
//! Address search, the current-location flow, and the selection consumed by
//! the submission wizard.

mod resolver;
mod selection;

pub use resolver::{AddressResolver, CurrentAddress, SearchOutcome};
pub use selection::{LocationSelection, LocationSelectionState, PayloadAddress};
