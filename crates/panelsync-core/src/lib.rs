//! # panelsync-core
//!
//! Core crate for PanelSync. Contains the configuration schema, the
//! logging bootstrap, the job and artifact domain types, the host
//! application capability trait, and the unified error system.
//!
//! This crate has **no** internal dependencies on other PanelSync crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
