mod candidate;
mod entry;
mod ids;
mod reference;
mod verification;

pub use candidate::*;
pub use entry::*;
pub use ids::*;
pub use reference::*;
pub use verification::*;
