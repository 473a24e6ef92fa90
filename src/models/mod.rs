// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    BoostPlan, BoostPurchase, Coordinate, CreditBalance, CreditTransaction, EntityBoostState,
    EntityType, FilterCriteria, ListableEntity, Page, RankedEntity, SortMode, BOOST_PLANS,
    DEFAULT_RADIUS_KM, MAX_GRANT_CREDITS,
};
pub use requests::{EndBoostRequest, GrantCreditsRequest, PurchaseBoostRequest, SearchListingsRequest};
pub use responses::{
    BoostsEndedResponse, CreditsResponse, ErrorResponse, HealthResponse, PlansResponse,
    PurchaseBoostResponse,
};
