//! Structured logging for objectdb
//!
//! The store is an embedded library, so observability stays small: a
//! synchronous structured JSON logger for the handful of events callers
//! care about (shared-container fallback, file recreation, compaction,
//! migration, discarded torn tails).
//!
//! # Design Principles
//!
//! - Structured logs (JSON), one line = one event
//! - Deterministic key ordering
//! - Synchronous, no buffering

mod logger;

pub use logger::{Logger, Severity};
