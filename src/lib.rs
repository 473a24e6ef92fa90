//! Market Algo - listing search and boost ledger for the marketplace
//!
//! This library provides location-aware filtering and ranking of marketplace
//! listings (products, jobs, events, artistes) and the credit ledger that
//! sells time-limited boosts for them.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{
    apply_filters, distance_km, filter_by_radius, BoostLedger, LedgerError, ListingEngine,
};
pub use crate::models::{
    BoostPlan, Coordinate, EntityType, FilterCriteria, ListableEntity, Page, RankedEntity, SortMode,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let toronto = Coordinate::new(43.6532, -79.3832);
        assert_eq!(distance_km(toronto, toronto), 0.0);
        assert_eq!(BoostLedger::plans().len(), 3);
    }
}
