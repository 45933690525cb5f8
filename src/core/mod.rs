//! Core business logic module
//!
//! Text rewriting is pure; disk, staging and build orchestration only touch
//! the system through an injected [`crate::infra::command::CommandRunner`].
//!
//! # Submodules
//!
//! - [`patch`] - Ordered regex rewrite rules and line diffs
//! - [`boot_config`] - Grub configuration rewrite rules and boot arguments
//! - [`device_id`] - NVMe id helper rewrite rule
//! - [`disk`] - GPT partitioning and formatting
//! - [`staging`] - Mounting, payload copying and unmounting
//! - [`params`] - Build parameter resolution
//! - [`builder`] - End-to-end build orchestration
//! - [`doctor`] - External tool checks

pub mod boot_config;
pub mod builder;
pub mod device_id;
pub mod disk;
pub mod doctor;
pub mod params;
pub mod patch;
pub mod staging;
