pub mod assignment;
pub mod config;
pub mod error;
pub mod import;
pub mod io;
pub mod paths;
pub mod progress;
pub mod protocol;
pub mod reorder;
pub mod store;
pub mod types;
pub mod visibility;

pub use error::{CoachError, Result};
pub use store::Store;
