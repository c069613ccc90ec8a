pub mod config;
pub mod logger;

pub use config::Config;
