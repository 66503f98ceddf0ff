//! Core crate-wide types

/// Text renderer configuration
pub mod config;
