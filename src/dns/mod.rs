//! DNS front-end.
//!
//! Answers TXT questions from the store and A/AAAA questions from a fixed
//! configured address, for names at or below the served domain.

pub mod handler;
pub mod server;

pub use handler::{QueryHandler, StaticAnswer, EDE_INFO_OTHER, EDE_OPTION_CODE, STATIC_ANSWER_TTL};
pub use server::{serve_udp, start_dns_server};
