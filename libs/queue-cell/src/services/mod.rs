pub mod store;
pub mod redis_store;
pub mod classifier;
pub mod attachment;
pub mod operations;

pub use store::*;
pub use redis_store::*;
pub use classifier::*;
pub use attachment::*;
pub use operations::*;
