// Service exports
pub mod appwrite;
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use appwrite::{AppwriteClient, AppwriteCollections, AppwriteError};
pub use cache::{CacheManager, CacheKey, CacheError};
pub use memory::MemoryStore;
pub use postgres::PostgresClient;
pub use store::{BoostCommit, CommitOutcome, LedgerStore, ListingSource, StoreError};
