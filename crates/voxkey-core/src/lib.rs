pub mod config;
pub mod error;
pub mod types;

pub use config::VoxkeyConfig;
pub use error::{Result, VoxkeyError};
pub use types::*;
