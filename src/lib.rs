//! Frappe Quickstart Library
//!
//! Docker Compose bootstrap for the Frappe/ERPNext stack: configuration
//! generation, stack lifecycle, health checks, backup/restore, and proxy
//! config generation.

pub mod backup;
pub mod compose;
pub mod config;
pub mod domain;
pub mod health;
pub mod lock;
pub mod presets;
pub mod restore;
pub mod setup;
pub mod utils;
pub mod validate;

// Re-export commonly used types
pub use config::EnvConfig;
pub use utils::errors::StackError;
pub type Result<T> = std::result::Result<T, StackError>;
