//! ChairTime Core - Shared types library.
//!
//! This crate provides common types used across all ChairTime components:
//! - `engine` - Scheduling and service-queue engine
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no
//! clocks. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, tenants, money, and
//!   the status state machines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
