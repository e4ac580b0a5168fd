//! CLI command implementations.
//!
//! - [`warm`] - Generate thumbnails for a directory
//! - [`sweep`] - Disk retention sweep
//! - [`clear`] - Delete all disk artifacts
//! - [`config`] - Configuration file management (init, show, path)

pub mod clear;
pub mod config;
pub mod sweep;
pub mod warm;
