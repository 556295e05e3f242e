pub mod loader;
pub mod types;
pub mod validator;

pub use loader::{from_env, from_lookup};
pub use types::*;
pub use validator::*;

impl AppConfig {
    /// Load from `.env` plus the process environment.
    pub fn from_env() -> Result<Self, crate::error::ConfigError> {
        loader::from_env()
    }
}
