pub mod cache;
pub mod config;
pub mod installed;
pub mod interrupt;
pub mod observability;
pub mod requirement;
