//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema passed to every component at
//! construction and helpers to load it from disk and the environment.

mod load;
mod schema;

pub use schema::*;
