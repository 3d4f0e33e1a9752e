//! Client error types.

use thiserror::Error;

/// Failure reported by the transport collaborator.
///
/// A transport failure while connected disconnects the client and is
/// reported exactly once through the error handler; the engine never
/// resends the failed batch.
#[derive(Debug, Error)]
pub enum TransportError {
	/// Network-level failure.
	#[error("transport failure: {0}")]
	Io(String),

	/// The remote side rejected or could not handle the request.
	#[error("remote failure: {0}")]
	Remote(String),

	/// The outgoing batch could not be encoded.
	#[error(transparent)]
	Encode(#[from] tether_codec::EncodeError),

	/// The response payload could not be decoded; the whole batch is
	/// rejected and nothing from it is applied.
	#[error(transparent)]
	Decode(#[from] tether_codec::DecodeError),
}

/// Errors surfaced by the client connection surface.
#[derive(Debug, Error)]
pub enum ClientError {
	/// `connect` was called on an already connected client.
	#[error("already connected")]
	AlreadyConnected,

	/// `disconnect` or `send` was called while disconnected.
	#[error("not connected")]
	NotConnected,

	/// A local store mutation failed.
	#[error(transparent)]
	Store(#[from] tether_store::StoreError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
