mod directory;
mod time_entries;

pub use directory::DirectoryClient;
pub use time_entries::TimeEntryClient;
