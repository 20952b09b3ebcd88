//! Core types for ChairTime.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;
pub mod tenant;

pub use id::*;
pub use money::{Money, MoneyError};
pub use status::*;
pub use tenant::{TenantId, TenantIdError};
