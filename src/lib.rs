//! bucketd - a TTL-bounded object cache served over DNS and HTTP
//!
//! One backing store is exposed through two front-ends: a DNS resolver
//! answering TXT (and fixed A/AAAA) questions, and a REST interface for
//! reading and writing entries. Both share the same admission rules.

pub mod admission;
pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use config::Config;
pub use tasks::spawn_cleanup_task;
