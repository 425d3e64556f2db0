#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Error (common error types)
pub mod error;

/// Embedded local database (record collections over SQLite)
pub mod db;

/// Version model and storage backends (local and remote)
pub mod version;

/// Unified version store driven by the editor UI
pub mod workspace;

/// Debounced draft auto-save
pub mod draft;

/// Per-provider API key configuration
pub mod api_config;
