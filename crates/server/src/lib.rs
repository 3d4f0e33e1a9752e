//! Server half of the tether sync engine.
//!
//! A [`ServerEngine`] owns the action and controller registries plus an
//! explicit [`SessionRegistry`]; each inbound batch is applied in order
//! against the per-session [`tether_store::ServerModelStore`] and answered
//! with the commands the request produced. The long-poll listener is held on
//! the session until server-originated commands exist, a release arrives or
//! the poll times out.

#![warn(missing_docs)]

pub mod actions;
pub mod engine;
pub mod error;
pub mod session;

pub use actions::{ActionHandler, ActionRegistry, HandlerError};
pub use engine::{ControllerFactory, ServerEngine};
pub use error::{ActionInvocationError, Result, ServerError};
pub use session::{Session, SessionRegistry};
