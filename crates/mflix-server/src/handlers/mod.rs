//! HTTP handlers

pub mod export;
pub mod health;
pub mod movies;
pub mod persons;

pub use health::health;
