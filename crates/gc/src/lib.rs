//! Incremental reachability collector for shared bean graphs.
//!
//! Shared beans form a directed, acyclic reference graph. The collector
//! tracks every edge incrementally and schedules beans for collection as
//! soon as no path of live edges connects them to a root. Collection itself
//! is an explicit flush ([`GarbageCollector::gc`]); nothing runs in the
//! background.

#![warn(missing_docs)]

pub mod collector;
pub mod error;
pub mod instance;

pub use collector::GarbageCollector;
pub use error::{GcError, Result};
pub use instance::{BeanSnapshot, Reference, SlotKind};
