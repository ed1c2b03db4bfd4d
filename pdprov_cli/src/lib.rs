//! Directory provisioning command line interface
//!
//! Library half of the `pdprov` binary: configuration, error reporting,
//! terminal gates and the command orchestrators.

pub mod config;
pub mod error;
pub mod gate;
pub mod orchestrators;
pub mod terminal;
