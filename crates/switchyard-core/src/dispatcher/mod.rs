//! Dispatcher - classify, select, execute, aggregate
//!
//! One `route` call runs a fixed, linear pipeline. Each stage consumes the
//! previous stage's record and produces a new one; nothing loops back.
//!
//! # Module Structure
//!
//! - `core`: Dispatcher struct and builder methods
//! - `types`: Per-stage records
//! - `process`: The route pipeline and classify stage
//! - `select`: Capability matching, semantic fallback, domain fallback
//! - `invoke`: Single-agent call with retry and breaker bookkeeping
//! - `strategies`: Sequential, parallel and conditional execution
//! - `aggregate`: Mode-aware result aggregation

mod aggregate;
mod core;
mod invoke;
mod process;
mod select;
mod strategies;
mod types;

#[cfg(test)]
mod tests;

pub use aggregate::{aggregate, context_key};
pub use core::Dispatcher;
pub use select::{capability_similarity, order_by_capabilities};
