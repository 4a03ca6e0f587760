//! Inspector service: HTTP API and configuration.
//!
//! The binary wires these together with the [`notify`] and [`liveness`]
//! crates; the pieces live in a library so they can be exercised in tests.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod server;

pub use config::Config;
pub use server::{build_router, ApiError, AppState};
