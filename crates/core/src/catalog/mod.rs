//! Media catalog - the persisted index of everything in the cache directory.
//!
//! Persistence is a single JSON file rewritten on every mutation. Listings are
//! projections computed on demand.

mod json;
mod query;
mod types;

pub use json::{Entries, JsonCatalog};
pub use query::{project, stats};
pub use types::*;
