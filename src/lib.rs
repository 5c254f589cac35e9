#![forbid(unsafe_code)]

//! Video cache with Google Drive import.
//!
//! The library holds everything except the HTTP server: link parsing and
//! the Drive download handshake ([`drive`]), content validation
//! ([`content`]), entry bookkeeping ([`store`]) and the [`cache::CacheManager`]
//! that ties them together. The `backend` binary exposes it over axum.

pub mod cache;
pub mod config;
pub mod content;
pub mod drive;
pub mod error;
pub mod logging;
pub mod store;
