//! Core types, configuration, and error handling for appdiff.
//!
//! This crate provides the shared foundation used by the other appdiff crates:
//! - [`AppDiffError`]: unified error type using `thiserror`
//! - [`AppDiffConfig`]: configuration loaded from `.appdiff.toml`
//! - Shared types: [`Application`], [`SyncStatus`], [`DiffResult`],
//!   [`DiffFailure`], [`Outcome`]

mod config;
mod error;
mod types;

pub use config::{AppDiffConfig, ArgoCdConfig, DiffConfig, ReportConfig};
pub use error::AppDiffError;
pub use types::{
    Application, ApplicationMetadata, ApplicationSource, ApplicationSpec, ApplicationStatus,
    DiffFailure, DiffResult, Outcome, SyncInfo, SyncStatus,
};

/// A convenience `Result` type for appdiff operations.
pub type Result<T> = std::result::Result<T, AppDiffError>;
