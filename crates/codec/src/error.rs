//! Codec error types.

use thiserror::Error;

/// Errors raised while encoding a command batch.
#[derive(Debug, Error)]
pub enum EncodeError {
	/// A command failed to serialize.
	#[error("failed to encode command batch: {0}")]
	Serialize(#[from] serde_json::Error),
}

/// Errors raised while decoding a command batch.
///
/// Decoding is all-or-nothing: any failure rejects the whole batch and no
/// command from it is ever applied.
#[derive(Debug, Error)]
pub enum DecodeError {
	/// The payload is not a JSON array of objects.
	#[error("malformed wire payload: {0}")]
	Malformed(#[from] serde_json::Error),

	/// A command object is missing its `id` discriminator field.
	#[error("command at index {index} has no discriminator")]
	MissingDiscriminator {
		/// Position within the batch.
		index: usize,
	},

	/// A discriminator is not registered with the codec.
	#[error("unknown command discriminator `{id}` at index {index}")]
	UnknownDiscriminator {
		/// The offending discriminator.
		id: String,
		/// Position within the batch.
		index: usize,
	},

	/// A registered command's payload did not match its schema.
	#[error("invalid `{id}` payload at index {index}: {source}")]
	InvalidPayload {
		/// The command discriminator.
		id: String,
		/// Position within the batch.
		index: usize,
		/// Underlying parse error.
		source: serde_json::Error,
	},
}
