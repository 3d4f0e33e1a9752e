//! Store error types.

use thiserror::Error;

/// Errors raised by model store operations.
///
/// Every failing operation leaves the store unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
	/// A model with this id is already registered.
	#[error("presentation model id `{id}` already present")]
	DuplicateModelId {
		/// The conflicting model id.
		id: String,
	},

	/// An attribute with this id is already registered.
	#[error("attribute id `{id}` already present")]
	DuplicateAttributeId {
		/// The conflicting attribute id.
		id: String,
	},

	/// No model with this id is registered.
	#[error("presentation model `{id}` not found")]
	ModelNotFound {
		/// The missing model id.
		id: String,
	},

	/// No attribute with this id is registered.
	#[error("attribute `{id}` not found")]
	AttributeNotFound {
		/// The missing attribute id.
		id: String,
	},

	/// A metadata change named a key the store does not manage.
	#[error("unsupported attribute metadata key `{name}`")]
	UnsupportedMetadata {
		/// The offending metadata key.
		name: String,
	},
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
