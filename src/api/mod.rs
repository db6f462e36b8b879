//! API Module
//!
//! HTTP front-end of the object cache.
//!
//! # Endpoints
//! - `GET /<key>` - Retrieve a value by key
//! - `POST /<key>?value=<v>&expire=<n>` - Store a value with a TTL

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
