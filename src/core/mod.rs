pub mod archive;
pub mod classifier;
pub mod feed_locator;
pub mod ingest;
pub mod normalizer;
pub mod orchestrator;
pub mod trust;
pub mod upsert;

pub use crate::domain::ports::{CatalogStore, PartnerApi, Storage, SyncLogStore};
pub use crate::utils::error::Result;
