//! In-memory presentation model stores.
//!
//! Two variants share one core repository:
//! * [`ClientModelStore`]: applies inbound commands and notifies listeners
//! * [`ServerModelStore`]: mirrors server-originated mutations into an
//!   explicit [`ResponseContext`] drained by the active request

#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod event;
pub mod server;
pub mod store;

pub use client::ClientModelStore;
pub use error::{Result, StoreError};
pub use event::{StoreEvent, StoreListener};
pub use server::{ResponseContext, ServerModelStore};
pub use store::{ModelStore, ValueChange};
