// Core algorithm exports
pub mod boost;
pub mod distance;
pub mod engine;
pub mod filters;
pub mod sorting;

pub use boost::{BoostLedger, BoostReceipt, LedgerError};
pub use distance::{distance_km, filter_by_radius, calculate_bounding_box, is_within_bounding_box, BoundingBox};
pub use engine::{apply_filters, apply_filters_at, paginate, ListingEngine};
pub use filters::{matches_criteria, parse_bound};
pub use sorting::sort_entities;
