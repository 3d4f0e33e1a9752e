//! Request dispatch: applies inbound command batches against a session and
//! collects the response, holding long polls until there is something to say.

use std::time::Duration;

use rustc_hash::FxHashMap;
use tether_model::Command;
use tether_store::{ResponseContext, ServerModelStore, StoreError};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::actions::{ActionHandler, ActionRegistry, HandlerError};
use crate::error::{Result, ServerError};
use crate::session::{Controller, Session, SessionRegistry};

/// Builds the server half of a controller instance.
///
/// Receives the instance id, creates the controller's models through the
/// store (announcing them to the client) and returns the ids of the models
/// it owns; those are torn down again when the controller is destroyed.
pub type ControllerFactory =
	Box<dyn Fn(&str, &mut ServerModelStore, &mut ResponseContext) -> std::result::Result<Vec<String>, HandlerError> + Send + Sync>;

/// Server engine: registries plus per-session dispatch.
///
/// Action handlers and controller factories are registered once at setup;
/// afterwards the engine is shared behind an [`Arc`](std::sync::Arc) and all
/// entry points take `&self`. Session state is guarded per session, so
/// requests for different sessions never contend.
pub struct ServerEngine {
	actions: ActionRegistry,
	controllers: FxHashMap<String, ControllerFactory>,
	sessions: SessionRegistry,
	poll_timeout: Duration,
}

impl Default for ServerEngine {
	fn default() -> Self {
		Self::new()
	}
}

impl ServerEngine {
	/// Creates an engine with no registered actions or controllers.
	pub fn new() -> Self {
		Self {
			actions: ActionRegistry::new(),
			controllers: FxHashMap::default(),
			sessions: SessionRegistry::new(),
			poll_timeout: Duration::from_secs(30),
		}
	}

	/// Sets how long a long poll is held before returning empty.
	pub fn poll_timeout(mut self, timeout: Duration) -> Self {
		self.poll_timeout = timeout;
		self
	}

	/// Registers a named action handler.
	pub fn register_action(&mut self, name: impl Into<String>, handler: ActionHandler) {
		self.actions.register(name, handler);
	}

	/// Registers a controller factory under a type name.
	pub fn register_controller(&mut self, name: impl Into<String>, factory: ControllerFactory) {
		self.controllers.insert(name.into(), factory);
	}

	/// The session registry.
	pub fn sessions(&self) -> &SessionRegistry {
		&self.sessions
	}

	/// Runs a server-originated mutation against a session.
	///
	/// The commands the mutation announces are buffered for the session's
	/// next long poll, which is woken if currently held.
	pub fn publish<F>(&self, session_id: &str, mutate: F) -> Result<()>
	where
		F: FnOnce(&mut ServerModelStore, &mut ResponseContext) -> Result<()>,
	{
		let session = self.sessions.get(session_id)?;
		let mut state = session.state.lock();
		let mut response = ResponseContext::new();
		mutate(&mut state.store, &mut response)?;
		state.pending.extend(response.drain());
		drop(state);
		session.notify.notify_waiters();
		Ok(())
	}

	/// Runs a read-only closure against a session's store.
	pub fn inspect<F, R>(&self, session_id: &str, read: F) -> Result<R>
	where
		F: FnOnce(&ServerModelStore) -> R,
	{
		let session = self.sessions.get(session_id)?;
		let state = session.state.lock();
		Ok(read(&state.store))
	}

	/// Applies one inbound batch in order and returns the response commands.
	///
	/// Action handler failures are logged and skipped so one bad call never
	/// poisons the session; lifecycle violations abort the request instead.
	pub fn process(&self, session_id: &str, commands: &[Command]) -> Result<Vec<Command>> {
		let mut response = ResponseContext::new();
		for command in commands {
			match command {
				Command::CreateContext => {
					self.sessions.create(session_id)?;
				}
				Command::DestroyContext => {
					self.sessions.remove(session_id)?;
				}
				Command::StartLongPoll => {
					// Sync entry point: hand over whatever is already
					// buffered. The held variant lives in `poll`.
					let session = self.sessions.get(session_id)?;
					for pending in std::mem::take(&mut session.state.lock().pending) {
						response.push(pending);
					}
				}
				Command::InterruptLongPoll => {
					let session = self.sessions.get(session_id)?;
					session.state.lock().interrupted = true;
					session.notify.notify_waiters();
				}
				Command::CreateController { n, c_id } => {
					let session = self.sessions.get(session_id)?;
					self.create_controller(&session, n, c_id, &mut response)?;
				}
				Command::DestroyController { c_id } => {
					let session = self.sessions.get(session_id)?;
					self.destroy_controller(&session, c_id, &mut response)?;
				}
				Command::CallAction { n, p } => {
					let session = self.sessions.get(session_id)?;
					let mut state = session.state.lock();
					if let Err(err) = self.actions.dispatch(n, &mut state.store, &mut response, p) {
						warn!(session = session_id, action = %n, %err, "action failed");
					}
				}
				Command::Empty => {
					// Even a no-op must address a live session.
					self.sessions.get(session_id)?;
				}
				other => {
					let session = self.sessions.get(session_id)?;
					session.state.lock().store.apply_remote(other)?;
				}
			}
		}
		Ok(response.drain())
	}

	/// Holds a long poll until the session has commands for the client, an
	/// out-of-band release arrives or the timeout elapses.
	pub async fn poll(&self, session_id: &str) -> Result<Vec<Command>> {
		let session = self.sessions.get(session_id)?;
		let deadline = Instant::now() + self.poll_timeout;
		loop {
			// Register before inspecting state so a push between unlock and
			// await is not lost.
			let notified = session.notify.notified();
			{
				let mut state = session.state.lock();
				if !state.pending.is_empty() || state.interrupted {
					state.interrupted = false;
					return Ok(std::mem::take(&mut state.pending));
				}
			}
			tokio::select! {
				_ = notified => {}
				_ = sleep_until(deadline) => return Ok(Vec::new()),
			}
			// The wake may be session teardown; end the poll quietly.
			if self.sessions.get(session_id).is_err() {
				return Ok(Vec::new());
			}
		}
	}

	/// Routes one batch: the long-poll listener is held, everything else is
	/// dispatched synchronously.
	pub async fn handle(&self, session_id: &str, commands: &[Command]) -> Result<Vec<Command>> {
		if let [Command::StartLongPoll] = commands {
			self.poll(session_id).await
		} else {
			self.process(session_id, commands)
		}
	}

	fn create_controller(&self, session: &Session, type_name: &str, controller_id: &str, response: &mut ResponseContext) -> Result<()> {
		let factory = self
			.controllers
			.get(type_name)
			.ok_or_else(|| ServerError::UnknownControllerType { name: type_name.to_owned() })?;
		let mut state = session.state.lock();
		if state.controllers.contains_key(controller_id) {
			return Err(ServerError::DuplicateController { id: controller_id.to_owned() });
		}
		let model_ids = factory(controller_id, &mut state.store, response).map_err(|source| {
			ServerError::Action(crate::error::ActionInvocationError {
				action: type_name.to_owned(),
				message: source.to_string(),
			})
		})?;
		state.controllers.insert(
			controller_id.to_owned(),
			Controller {
				type_name: type_name.to_owned(),
				model_ids,
			},
		);
		Ok(())
	}

	fn destroy_controller(&self, session: &Session, controller_id: &str, response: &mut ResponseContext) -> Result<()> {
		let mut state = session.state.lock();
		let controller = state
			.controllers
			.remove(controller_id)
			.ok_or_else(|| ServerError::ControllerNotFound { id: controller_id.to_owned() })?;
		for model_id in &controller.model_ids {
			match state.store.remove(model_id, response) {
				Ok(_) => {}
				// The client may have deleted it already.
				Err(StoreError::ModelNotFound { .. }) => {
					debug!(controller = controller_id, model = %model_id, "owned model already gone");
				}
				Err(err) => return Err(err.into()),
			}
		}
		debug!(controller = controller_id, r#type = %controller.type_name, "controller destroyed");
		Ok(())
	}
}
