//! Integration tests for tokio_rest
//!
//! Each test boots a server on an ephemeral port and drives it over real
//! sockets with reqwest (or the crate's own clients).
//!
//! Run with: cargo test --test integration

mod helpers;

mod client;
mod lifecycle;
mod plugins;
mod routing;
mod static_files;
mod tls;
