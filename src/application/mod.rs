//! Application services layer.

pub mod blog;
pub mod repos;
pub mod warmer;
