pub mod builder;
pub mod config;
pub mod error;

pub use builder::*;
pub use config::IngestConfig;
pub use error::{ConfigError, IngestError};
