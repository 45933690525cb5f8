//! Configuration and constants
//!
//! - [`defaults`] - Compiled-in paths, labels and boot parameters
//! - [`settings`] - Optional TOML settings file overriding the defaults

pub mod defaults;
pub mod settings;
