pub mod config;
pub mod habit;
pub mod owner;
pub mod stats;
pub mod tick;
