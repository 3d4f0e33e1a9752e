//! Client half of the tether sync engine.
//!
//! The concurrency core: a multi-producer [`CommandBatcher`] coalesces and
//! seals outgoing command batches; one [`Connector`] per client owns the
//! connection state machine and drives a single background transmit loop
//! that ships batches over a [`Transport`], replays response commands into
//! the shared [`tether_store::ClientModelStore`] and keeps the long poll
//! alive.

#![warn(missing_docs)]

// Exercised by the loopback integration test only.
#[cfg(test)]
use tether_server as _;

pub mod batcher;
pub mod connector;
pub mod error;
pub mod tether;
pub mod transport;

pub use batcher::{Batch, BatcherConfig, CommandBatcher, OnFinished};
pub use connector::{Connector, ErrorHandler};
pub use error::{ClientError, Result, TransportError};
pub use tether::ClientTether;
pub use transport::{CodecTransport, Transport, WireExchange};
