//! Request and Response models for the HTTP front-end
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! deserializing query strings and serializing JSON response bodies.

pub mod requests;
pub mod responses;

pub use requests::SetParams;
pub use responses::{ErrorResponse, GetResponse, SetResponse};
