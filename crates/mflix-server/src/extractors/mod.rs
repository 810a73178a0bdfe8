//! Request guards

pub mod access_key;
