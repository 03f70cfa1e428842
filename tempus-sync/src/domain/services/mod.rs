mod entry_writer;
mod intake;
mod resolver;

pub use entry_writer::*;
pub use intake::*;
pub use resolver::*;
