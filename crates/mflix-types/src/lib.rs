//! Mflix Types - Pure record type definitions
//!
//! This crate contains only data types with no async runtime dependencies,
//! shared between the server and the CLI client.

pub mod movie;
pub mod person;

pub use movie::*;
pub use person::*;
