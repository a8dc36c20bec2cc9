pub mod generation;
pub mod metadata;
pub mod provider;

pub use generation::*;
pub use metadata::*;
