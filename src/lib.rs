//! BT bridge library.
//!
//! Exposes the bridge core and its Linux adapters for the `btbridged`
//! binary and for integration testing. Everything outside `adapters`
//! and `events` is free of file descriptors and runs against mocks.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bt;
pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
