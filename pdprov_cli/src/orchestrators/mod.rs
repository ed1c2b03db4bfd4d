//! Command orchestrators for business logic
//!
//! This module provides orchestrators that coordinate between the CLI layer
//! and the core library services.

pub mod import_orchestrator;
pub mod subscription_orchestrator;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Colored per-record lines on stderr and a summary on stdout
    #[default]
    Human,
    /// One JSON document on stdout
    Json,
}
