//! # gs-service
//!
//! HTTP/1.1 front end for the gsopt orchestrator.  All routes are `POST`,
//! require an `X-User-Email` header and are rate limited per caller.
//! Optimization work runs on the blocking pool.

pub mod config;
pub mod http;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use config::ServiceConfig;
pub use rate_limit::RateLimiter;
pub use routes::AppState;
pub use server::serve;
