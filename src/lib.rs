//! el-installer - Enterprise Linux installer disk builder
//!
//! Converts an EL installer ISO into a two-partition GPT disk that boots the
//! installer unattended on a serial-console VM.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (text rewriting, disk layout, orchestration)
//! - [`infra`] - Infrastructure layer (processes, filesystem, metadata server)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
