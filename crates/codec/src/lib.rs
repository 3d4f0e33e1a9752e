//! Wire codec for ordered command batches.
//!
//! The wire format is a JSON array of tagged objects, one per command, in
//! exactly the order the batch was given. Each object carries the short
//! discriminator field `id` plus command-specific short field names
//! (`p_id`, `a_id`, `v`, `n`, ...). Decoding dispatches per discriminator
//! and rejects the whole batch on any failure; a partially decoded batch is
//! never surfaced.

#![warn(missing_docs)]

pub mod error;

pub use error::{DecodeError, EncodeError};

use tether_model::Command;

/// Encodes an ordered command list into its wire form.
///
/// Input order is preserved exactly.
pub fn encode(commands: &[Command]) -> Result<String, EncodeError> {
	Ok(serde_json::to_string(commands)?)
}

/// Decodes a wire payload back into an ordered command list.
///
/// Dispatches on the `id` discriminator of each array element. Any malformed
/// element or unregistered discriminator rejects the whole batch.
pub fn decode(wire: &str) -> Result<Vec<Command>, DecodeError> {
	let raw: Vec<serde_json::Value> = serde_json::from_str(wire)?;
	let mut commands = Vec::with_capacity(raw.len());
	for (index, element) in raw.into_iter().enumerate() {
		commands.push(decode_one(element, index)?);
	}
	Ok(commands)
}

fn decode_one(element: serde_json::Value, index: usize) -> Result<Command, DecodeError> {
	let id = element
		.get("id")
		.and_then(serde_json::Value::as_str)
		.ok_or(DecodeError::MissingDiscriminator { index })?;
	if !Command::DISCRIMINATORS.contains(&id) {
		return Err(DecodeError::UnknownDiscriminator { id: id.to_owned(), index });
	}
	let id = id.to_owned();
	serde_json::from_value(element).map_err(|source| DecodeError::InvalidPayload { id, index, source })
}
