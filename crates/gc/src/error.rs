//! Collector error types.

use thiserror::Error;

/// Errors raised by collector bookkeeping operations.
///
/// Every failing operation leaves the instance graph unchanged.
#[derive(Debug, Error)]
pub enum GcError {
	/// The bean id is already registered.
	#[error("bean `{id}` is already registered")]
	AlreadyRegistered {
		/// The conflicting bean id.
		id: String,
	},

	/// The bean id is not registered.
	#[error("bean `{id}` is not registered")]
	UnknownBean {
		/// The missing bean id.
		id: String,
	},

	/// No matching edge exists between the two beans.
	#[error("no `{slot}` edge from `{parent}` to `{child}`")]
	NoSuchEdge {
		/// Owning bean.
		parent: String,
		/// Referenced bean.
		child: String,
		/// Slot name.
		slot: String,
	},

	/// The assignment would make the reference graph cyclic.
	#[error("edge from `{parent}` to `{child}` would create a cycle")]
	Cycle {
		/// Owning bean.
		parent: String,
		/// Referenced bean that is an ancestor of the owner.
		child: String,
	},
}

/// Result type for collector operations.
pub type Result<T> = std::result::Result<T, GcError>;
