//! # Textgen Common
//!
//! Shared types, traits, and utilities for the textgen workspace.
//! This crate provides common abstractions to ensure consistency across
//! all components in the textgen ecosystem.

pub mod config;
pub mod error;

// Re-export main traits for convenience
pub use config::{DefaultConfig, ValidatedConfig};
pub use error::{ErrorCategory, TextgenError};
