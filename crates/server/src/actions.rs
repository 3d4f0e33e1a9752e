//! Named-action dispatch table.

use rustc_hash::FxHashMap;
use tether_model::ActionParam;
use tether_store::{ResponseContext, ServerModelStore};
use tracing::debug;

use crate::error::{ActionInvocationError, Result, ServerError};

/// Boxed error returned by an action handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// One registered action handler.
///
/// Handlers mutate the session store and push response commands through the
/// context; they never talk to the transport directly.
pub type ActionHandler =
	Box<dyn Fn(&mut ServerModelStore, &mut ResponseContext, &[ActionParam]) -> std::result::Result<(), HandlerError> + Send + Sync>;

/// Dispatch table mapping action names to handlers.
///
/// Registration happens once at engine setup; dispatch is read-only after
/// that, so the table needs no interior locking.
#[derive(Default)]
pub struct ActionRegistry {
	handlers: FxHashMap<String, ActionHandler>,
}

impl ActionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a handler, replacing any earlier one under the same name.
	pub fn register(&mut self, name: impl Into<String>, handler: ActionHandler) {
		let name = name.into();
		if self.handlers.insert(name.clone(), handler).is_some() {
			debug!(action = %name, "replacing action handler");
		}
	}

	/// Returns true if a handler is registered under this name.
	pub fn contains(&self, name: &str) -> bool {
		self.handlers.contains_key(name)
	}

	/// Invokes the named handler against the session store.
	///
	/// Handler failures are wrapped; the caller decides whether they abort
	/// the request or only the one call.
	pub fn dispatch(
		&self,
		name: &str,
		store: &mut ServerModelStore,
		response: &mut ResponseContext,
		params: &[ActionParam],
	) -> Result<()> {
		let handler = self.handlers.get(name).ok_or_else(|| ServerError::UnknownAction { name: name.to_owned() })?;
		handler(store, response, params).map_err(|source| {
			ServerError::Action(ActionInvocationError {
				action: name.to_owned(),
				message: source.to_string(),
			})
		})
	}
}
