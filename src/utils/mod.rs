pub mod config;
pub mod fs;
pub mod properties;
