mod client;
mod clockify_url;
mod credentials;
pub mod domain;

pub(crate) use clockify_url::*;

pub use client::*;
pub use clockify_url::ClockifyUrl;
pub use credentials::*;
