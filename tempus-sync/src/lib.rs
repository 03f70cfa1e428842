pub mod adapters;
pub mod batch;
pub mod domain;
pub mod rate_limit;
pub mod testing;

pub use domain::error::SyncError;
