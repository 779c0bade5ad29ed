pub mod call;
pub mod serve;

// Re-export command functions for convenience
pub use call::{call, locations};
pub use serve::serve;
