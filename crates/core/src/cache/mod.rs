//! Content cache: media files on disk keyed by normalized source URL.

mod filename;
mod fs;
mod normalize;
mod store;
mod types;

pub use filename::{normalize_extension, sanitize, unique_filename};
pub use fs::{hash_file, move_file};
pub use normalize::normalize_url;
pub use store::{sidecar_name, CacheStore, PARTIAL_DIR, SIDECAR_SUFFIX};
pub use types::*;

pub(crate) use fs::hex;
