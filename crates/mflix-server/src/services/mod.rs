//! Background services

pub mod count_timer;

pub use count_timer::spawn_count_timer;
