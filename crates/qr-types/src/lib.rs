pub mod collection;
pub mod entry;
pub mod errors;
pub mod history;

pub use collection::*;
pub use entry::*;
pub use errors::*;
pub use history::*;
