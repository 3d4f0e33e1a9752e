//! Per-client sessions and the explicit session registry.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tether_model::Command;
use tether_store::ServerModelStore;
use tokio::sync::Notify;

use crate::error::{Result, ServerError};

/// One controller instance living in a session.
#[derive(Debug)]
pub(crate) struct Controller {
	/// Registered type name the instance was created from.
	pub type_name: String,
	/// Models the controller factory created; removed again on teardown.
	pub model_ids: Vec<String>,
}

/// Mutable per-session state, guarded by the session mutex.
#[derive(Default)]
pub(crate) struct SessionState {
	pub store: ServerModelStore,
	pub controllers: FxHashMap<String, Controller>,
	/// Server-originated commands awaiting the next long poll.
	pub pending: Vec<Command>,
	/// Set by an out-of-band release; the held poll returns early.
	pub interrupted: bool,
}

/// One client's server-side state.
///
/// The mutex guards the store and command buffers; the notify wakes a held
/// long poll when pending commands or a release arrive. The lock is never
/// held across an await.
pub struct Session {
	id: String,
	pub(crate) state: Mutex<SessionState>,
	pub(crate) notify: Notify,
}

impl Session {
	fn new(id: String) -> Self {
		Self {
			id,
			state: Mutex::new(SessionState::default()),
			notify: Notify::new(),
		}
	}

	/// The session id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Buffers a server-originated command for the next long poll and wakes
	/// a held one.
	pub fn push_pending(&self, command: Command) {
		self.state.lock().pending.push(command);
		self.notify.notify_waiters();
	}
}

/// Explicit session registry.
///
/// Entries are created by the context-creation command and removed only by
/// the matching destroy command; there is no ambient request-scoped state.
#[derive(Default)]
pub struct SessionRegistry {
	sessions: Mutex<FxHashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a fresh session under the given id.
	pub fn create(&self, id: &str) -> Result<Arc<Session>> {
		let mut sessions = self.sessions.lock();
		if sessions.contains_key(id) {
			return Err(ServerError::DuplicateSession { id: id.to_owned() });
		}
		let session = Arc::new(Session::new(id.to_owned()));
		sessions.insert(id.to_owned(), Arc::clone(&session));
		Ok(session)
	}

	/// Looks up a live session.
	pub fn get(&self, id: &str) -> Result<Arc<Session>> {
		self.sessions
			.lock()
			.get(id)
			.cloned()
			.ok_or_else(|| ServerError::UnknownSession { id: id.to_owned() })
	}

	/// Removes a session, waking any held poll so it can observe the end.
	pub fn remove(&self, id: &str) -> Result<Arc<Session>> {
		let session = self
			.sessions
			.lock()
			.remove(id)
			.ok_or_else(|| ServerError::UnknownSession { id: id.to_owned() })?;
		session.notify.notify_waiters();
		Ok(session)
	}

	/// Number of live sessions.
	pub fn len(&self) -> usize {
		self.sessions.lock().len()
	}

	/// Returns true if no session is live.
	pub fn is_empty(&self) -> bool {
		self.sessions.lock().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sessions_are_created_once_and_removed_explicitly() {
		let registry = SessionRegistry::new();
		registry.create("s1").unwrap();
		assert!(matches!(registry.create("s1"), Err(ServerError::DuplicateSession { .. })));

		assert_eq!(registry.get("s1").unwrap().id(), "s1");
		registry.remove("s1").unwrap();
		assert!(matches!(registry.get("s1"), Err(ServerError::UnknownSession { .. })));
		assert!(registry.is_empty());
	}

	#[test]
	fn pending_commands_accumulate_in_order() {
		let registry = SessionRegistry::new();
		let session = registry.create("s1").unwrap();
		session.push_pending(Command::Empty);
		session.push_pending(Command::InterruptLongPoll);

		let drained = std::mem::take(&mut session.state.lock().pending);
		assert_eq!(drained, vec![Command::Empty, Command::InterruptLongPoll]);
	}
}
