mod clockify;

pub use clockify::ClockifyAdapter;
