//! SUPLA Core - protocol client and API rate limiting
//!
//! This crate implements the two pieces of the SUPLA cloud backend with real
//! protocol and state-machine character: the client for the SUPLA server's
//! line-oriented control socket, and the fixed-window API rate limiter that
//! guards requests before they reach it.

pub mod config;
pub mod direct_link;
pub mod error;
pub mod ratelimit;
pub mod server;
