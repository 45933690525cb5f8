//! Infrastructure layer
//!
//! Handles all I/O operations: external processes, filesystem and the
//! instance metadata server. This module is the only place where side
//! effects occur.

pub mod command;
pub mod filesystem;
pub mod metadata;
