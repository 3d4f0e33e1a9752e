//! Connection state machine and background transmit loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tether_model::Command;
use tether_store::ClientModelStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batcher::{Batch, BatcherConfig, CommandBatcher, OnFinished};
use crate::error::{ClientError, Result, TransportError};
use crate::transport::Transport;

/// Callback receiving the single error report of a failed connection.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

enum ConnectionState {
	Disconnected,
	Connected {
		generation: u64,
		long_poll: bool,
		cancel: CancellationToken,
	},
}

struct Inner {
	transport: Arc<dyn Transport>,
	store: Arc<Mutex<ClientModelStore>>,
	batcher: CommandBatcher,
	/// Dedicated guard for connect/disconnect transitions.
	state: Mutex<ConnectionState>,
	/// True while the listener batch is parked inside the remote poll.
	poll_outstanding: AtomicBool,
	/// Monotonic connection counter; lets a stale loop's failure report be
	/// told apart from the live connection's.
	generation: AtomicU64,
	on_error: Mutex<ErrorHandler>,
}

/// Drives the transmit/receive loop and owns connection state.
///
/// The connector is the whole collaborator seam: applications call
/// [`Connector::send`] to enqueue outgoing commands and
/// [`Connector::dispatch_handle`] to apply inbound ones. One background
/// transmit loop runs per connection; response commands are replayed into
/// the shared client store in received order before any completion handler
/// fires.
#[derive(Clone)]
pub struct Connector {
	inner: Arc<Inner>,
}

impl Connector {
	/// Creates a disconnected connector over the given transport and store.
	pub fn new(transport: Arc<dyn Transport>, store: Arc<Mutex<ClientModelStore>>, config: BatcherConfig) -> Self {
		Self {
			inner: Arc::new(Inner {
				transport,
				store,
				batcher: CommandBatcher::new(config),
				state: Mutex::new(ConnectionState::Disconnected),
				poll_outstanding: AtomicBool::new(false),
				generation: AtomicU64::new(0),
				on_error: Mutex::new(Arc::new(|err: &TransportError| {
					warn!(%err, "connection failed");
				})),
			}),
		}
	}

	/// Replaces the error handler invoked (exactly once) when a connection
	/// dies on a transport failure.
	pub fn on_error(&self, handler: impl Fn(&TransportError) + Send + Sync + 'static) {
		*self.inner.on_error.lock() = Arc::new(handler);
	}

	/// Opens the connection and starts its transmit loop.
	///
	/// With `long_poll` the listen cycle is scheduled as soon as the loop is
	/// running. Fails if already connected. Batches queued under a previous
	/// connection are dropped; commands are at-most-once.
	pub fn connect(&self, long_poll: bool) -> Result<()> {
		let (generation, cancel) = {
			let mut state = self.inner.state.lock();
			if matches!(*state, ConnectionState::Connected { .. }) {
				return Err(ClientError::AlreadyConnected);
			}
			let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
			let cancel = CancellationToken::new();
			*state = ConnectionState::Connected {
				generation,
				long_poll,
				cancel: cancel.clone(),
			};
			self.inner.batcher.clear();
			self.inner.poll_outstanding.store(false, Ordering::SeqCst);
			(generation, cancel)
		};
		debug!(generation, long_poll, "connected");
		tokio::spawn(transmit_loop(Arc::clone(&self.inner), generation, cancel));
		if long_poll {
			self.inner.batcher.enqueue(Command::StartLongPoll, None);
		}
		Ok(())
	}

	/// Closes the connection, stopping the transmit loop cooperatively.
	///
	/// An in-flight transmit is not cancelled; the loop exits once it
	/// returns. Fails if already disconnected.
	pub fn disconnect(&self) -> Result<()> {
		let mut state = self.inner.state.lock();
		match &*state {
			ConnectionState::Connected { cancel, generation, .. } => {
				debug!(generation, "disconnected");
				cancel.cancel();
				*state = ConnectionState::Disconnected;
				Ok(())
			}
			ConnectionState::Disconnected => Err(ClientError::NotConnected),
		}
	}

	/// Returns true while connected.
	pub fn is_connected(&self) -> bool {
		matches!(*self.inner.state.lock(), ConnectionState::Connected { .. })
	}

	/// Enqueues one outgoing command with an optional completion handler.
	///
	/// Fails immediately when disconnected; nothing is queued. Any command
	/// other than the listener triggers a best-effort out-of-band release of
	/// an outstanding long poll so the poll cannot observe stale state.
	pub fn send(&self, command: Command, on_finished: Option<OnFinished>) -> Result<()> {
		if !self.is_connected() {
			return Err(ClientError::NotConnected);
		}
		if !command.is_listener() && self.inner.poll_outstanding.load(Ordering::SeqCst) {
			let transport = Arc::clone(&self.inner.transport);
			tokio::spawn(async move {
				if let Err(err) = transport.release().await {
					warn!(%err, "long-poll release failed");
				}
			});
		}
		self.inner.batcher.enqueue(command, on_finished);
		Ok(())
	}

	/// Applies one inbound command to the local store.
	pub fn dispatch_handle(&self, command: &Command) -> Result<()> {
		self.inner.store.lock().apply(command)?;
		Ok(())
	}

	/// Returns true when no command is queued for transmission.
	pub fn is_idle(&self) -> bool {
		self.inner.batcher.is_idle()
	}
}

/// Single consumer of the batch queue for one connection generation.
async fn transmit_loop(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
	loop {
		let batch = tokio::select! {
			_ = cancel.cancelled() => break,
			batch = inner.batcher.next_batch() => batch,
		};
		// Consult the connection flag before the transmit...
		if cancel.is_cancelled() {
			break;
		}
		if batch.listener {
			inner.poll_outstanding.store(true, Ordering::SeqCst);
		}
		let result = inner.transport.transmit(&batch.commands).await;
		if batch.listener {
			inner.poll_outstanding.store(false, Ordering::SeqCst);
		}
		match result {
			Ok(response) => replay(&inner, batch, response, &cancel),
			Err(err) => {
				report_failure(&inner, generation, &err);
				break;
			}
		}
		// ...and after it, exiting promptly once disconnected.
		if cancel.is_cancelled() {
			break;
		}
	}
	debug!(generation, "transmit loop stopped");
}

/// Replays response commands into the store in received order, then fires
/// the batch's completion handler, then re-arms the listener.
fn replay(inner: &Arc<Inner>, batch: Batch, response: Vec<Command>, cancel: &CancellationToken) {
	{
		let mut store = inner.store.lock();
		for command in &response {
			if let Err(err) = store.apply(command) {
				warn!(%err, discriminator = command.discriminator(), "dropping inapplicable response command");
			}
		}
	}
	if let Some(handler) = batch.handler {
		handler(&response);
	}
	if batch.listener && !cancel.is_cancelled() {
		inner.batcher.enqueue(Command::StartLongPoll, None);
	}
}

/// Disconnects and reports exactly one error if this loop's connection is
/// still the live one; a failure surfacing after disconnect is logged and
/// swallowed.
fn report_failure(inner: &Arc<Inner>, generation: u64, err: &TransportError) {
	let still_connected = {
		let mut state = inner.state.lock();
		match &*state {
			ConnectionState::Connected {
				generation: live, cancel, ..
			} if *live == generation => {
				cancel.cancel();
				*state = ConnectionState::Disconnected;
				true
			}
			_ => false,
		}
	};
	if still_connected {
		let handler = Arc::clone(&inner.on_error.lock());
		handler(err);
	} else {
		debug!(%err, generation, "transport failure after disconnect; swallowed");
	}
}
