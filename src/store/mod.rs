//! Store Module
//!
//! The Cache Port consumed by both front-ends and its two engines: an
//! external Redis server, and an in-process map for tests and single-node
//! deployments.

mod entry;
mod memory;
mod port;
mod redis_store;


pub use entry::CacheEntry;
pub use memory::MemoryStore;
pub use port::{CachePort, StoredValue};
pub use redis_store::RedisStore;
