pub mod store;
pub mod directory;
pub mod estimator;

pub use store::*;
pub use directory::*;
pub use estimator::*;
