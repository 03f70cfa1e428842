pub mod error;
pub mod models;
pub mod ports;
pub mod services;
pub mod wall_time;

pub use error::SyncError;
