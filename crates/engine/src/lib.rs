//! ChairTime Engine - Multi-tenant scheduling and service-queue engine.
//!
//! One tenant = one shop. Each tenant manages two parallel arrival channels
//! that compete for the same service capacity:
//!
//! - pre-booked **appointments** (fixed time slots), driven by the
//!   [`scheduler::AppointmentScheduler`]
//! - walk-in **queue entries** (position-ordered line), driven by the
//!   [`queue::QueueService`]
//!
//! Both write through the [`store::EntityStore`] abstraction; the
//! [`stats::StatsService`] reads it to produce the dashboard snapshot.
//!
//! # Architecture
//!
//! The engine is a stateless request handler: no in-process locks of its
//! own, no background tasks. Atomicity of multi-row mutations (position
//! renumbering) is delegated to the store - a per-tenant mutex in
//! [`store::MemoryStore`], row locking inside a transaction in
//! [`store::PgStore`]. Time never comes from an ambient global; every
//! service takes a [`clock::Clock`] so day-window computations are
//! deterministic under test.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use estimator::WaitTimeEstimator;
pub use queue::{AdmitParams, QueueService};
pub use scheduler::{AppointmentScheduler, BookingRequest};
pub use stats::{StatsService, StatsSnapshot};
pub use store::{EntityStore, MemoryStore, PgStore};
