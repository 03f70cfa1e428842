mod project;
mod tag;
mod task;
mod time_entry;
mod user;

pub use project::*;
pub use tag::*;
pub use task::*;
pub use time_entry::*;
pub use user::*;
