//! Server error types.

use thiserror::Error;

/// A remote-invoked action handler failed.
///
/// The failure is wrapped and surfaced only to that call's own completion
/// path; the connection and session remain usable.
#[derive(Debug, Error)]
#[error("action `{action}` failed: {message}")]
pub struct ActionInvocationError {
	/// Name of the failing action.
	pub action: String,
	/// Rendered handler error.
	pub message: String,
}

/// Errors raised by server-side command dispatch.
#[derive(Debug, Error)]
pub enum ServerError {
	/// No session is registered under this id.
	#[error("unknown session `{id}`")]
	UnknownSession {
		/// The missing session id.
		id: String,
	},

	/// A session with this id already exists.
	#[error("session `{id}` already exists")]
	DuplicateSession {
		/// The conflicting session id.
		id: String,
	},

	/// No controller type is registered under this name.
	#[error("unknown controller type `{name}`")]
	UnknownControllerType {
		/// The unregistered type name.
		name: String,
	},

	/// A controller instance with this id already exists in the session.
	#[error("controller `{id}` already exists")]
	DuplicateController {
		/// The conflicting controller id.
		id: String,
	},

	/// The controller instance is unknown or already destroyed.
	#[error("controller `{id}` not found")]
	ControllerNotFound {
		/// The missing controller id.
		id: String,
	},

	/// No action handler is registered under this name.
	#[error("unknown action `{name}`")]
	UnknownAction {
		/// The unregistered action name.
		name: String,
	},

	/// An action handler failed.
	#[error(transparent)]
	Action(#[from] ActionInvocationError),

	/// A store mutation failed.
	#[error(transparent)]
	Store(#[from] tether_store::StoreError),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
