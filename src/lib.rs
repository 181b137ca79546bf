//! markwatch library
//!
//! The marker sync layer (cache, query and mutation coordinators), the HTTP
//! transport, and the terminal UI, exposed for the binary and for integration
//! tests.

pub mod app;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod data;
pub mod logging;
pub mod notify;
pub mod sync;
pub mod ui;
