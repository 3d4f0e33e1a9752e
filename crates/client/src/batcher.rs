//! Outgoing command queue with coalescing, deferral and batch sealing.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tether_model::Command;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Completion callback attached to a named command.
///
/// Fires exactly once, after the batch's response commands have been
/// replayed into the local store, and receives those response commands.
pub type OnFinished = Box<dyn FnOnce(&[Command]) + Send>;

/// One transmit-ready batch.
///
/// A batch is either a run of blind commands, a singleton named command
/// carrying its completion handler, or the long-poll listener.
pub struct Batch {
	/// Commands in enqueue order.
	pub commands: Vec<Command>,
	/// Handler of the batch's single named command, if any.
	pub handler: Option<OnFinished>,
	/// True for the long-poll listener batch.
	pub listener: bool,
}

/// Batching policy knobs.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
	/// Merge consecutive blind value changes targeting the same attribute,
	/// keeping only the latest value.
	pub merge_value_changes: bool,
	/// Deferral window opened by the first blind command of a batch.
	pub deferral: Duration,
	/// How often a further arrival may reset the window before the batch is
	/// flushed regardless.
	pub max_deferral_resets: u32,
}

impl Default for BatcherConfig {
	fn default() -> Self {
		Self {
			merge_value_changes: false,
			deferral: Duration::from_millis(50),
			max_deferral_resets: 10,
		}
	}
}

#[derive(Default)]
struct BatcherState {
	sealed: VecDeque<Batch>,
	/// Open run of blind commands, not yet sealed.
	open: Vec<Command>,
	deadline: Option<Instant>,
	resets: u32,
}

impl BatcherState {
	fn seal_open(&mut self) {
		if !self.open.is_empty() {
			self.sealed.push_back(Batch {
				commands: std::mem::take(&mut self.open),
				handler: None,
				listener: false,
			});
		}
		self.deadline = None;
		self.resets = 0;
	}
}

/// Multi-producer command queue feeding the single transmit loop.
///
/// Enqueueing never blocks; the consumer awaits [`CommandBatcher::next_batch`]
/// until a batch is transmit-ready. Batches are handed out strictly in seal
/// order, commands within a batch in enqueue order.
pub struct CommandBatcher {
	config: BatcherConfig,
	state: Mutex<BatcherState>,
	notify: Notify,
}

impl CommandBatcher {
	/// Creates an empty queue with the given policy.
	pub fn new(config: BatcherConfig) -> Self {
		Self {
			config,
			state: Mutex::new(BatcherState::default()),
			notify: Notify::new(),
		}
	}

	/// Enqueues one command.
	///
	/// A blind command joins the open batch (merging with an earlier value
	/// change for the same attribute when enabled) and opens or resets the
	/// deferral window. A named command and the long-poll listener each seal
	/// the open batch and ship as their own singleton batch.
	pub fn enqueue(&self, command: Command, handler: Option<OnFinished>) {
		let mut state = self.state.lock();
		if command.is_listener() || handler.is_some() {
			let listener = command.is_listener();
			state.seal_open();
			state.sealed.push_back(Batch {
				commands: vec![command],
				handler,
				listener,
			});
		} else {
			self.push_blind(&mut state, command);
		}
		drop(state);
		self.notify.notify_waiters();
	}

	/// Drops all queued batches and the open run. Pending completion
	/// handlers are dropped unfired.
	pub fn clear(&self) {
		let mut state = self.state.lock();
		*state = BatcherState::default();
	}

	/// Returns true if nothing is queued.
	pub fn is_idle(&self) -> bool {
		let state = self.state.lock();
		state.sealed.is_empty() && state.open.is_empty()
	}

	/// Awaits the next transmit-ready batch.
	///
	/// Single-consumer: exactly one transmit loop per connection drives this.
	pub async fn next_batch(&self) -> Batch {
		loop {
			// Register for wakeup before inspecting state so an enqueue
			// between unlock and await is not lost.
			let notified = self.notify.notified();
			let wait = {
				let mut state = self.state.lock();
				if let Some(batch) = state.sealed.pop_front() {
					return batch;
				}
				match state.deadline {
					Some(deadline) => {
						let now = Instant::now();
						if now >= deadline {
							state.seal_open();
							if let Some(batch) = state.sealed.pop_front() {
								return batch;
							}
							None
						} else {
							Some(deadline - now)
						}
					}
					None => None,
				}
			};
			match wait {
				Some(duration) => {
					tokio::select! {
						_ = notified => {}
						_ = tokio::time::sleep(duration) => {}
					}
				}
				None => notified.await,
			}
		}
	}

	fn push_blind(&self, state: &mut BatcherState, command: Command) {
		let merged = self.config.merge_value_changes
			&& command.value_change_target().is_some_and(|target| {
				state
					.open
					.iter_mut()
					.find(|open| open.value_change_target() == Some(target))
					.map(|open| *open = command.clone())
					.is_some()
			});
		if !merged {
			state.open.push(command);
		}

		// First arrival opens the window; later arrivals reset it until the
		// cap, after which the original deadline stands and the batch
		// flushes regardless.
		if state.deadline.is_none() {
			state.deadline = Some(Instant::now() + self.config.deferral);
			state.resets = 0;
		} else if state.resets < self.config.max_deferral_resets {
			state.deadline = Some(Instant::now() + self.config.deferral);
			state.resets += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use tether_model::Value;

	use super::*;

	fn value_changed(a_id: &str, v: i64) -> Command {
		Command::ValueChanged {
			a_id: a_id.to_owned(),
			v: Value::from(v),
		}
	}

	fn config(merge: bool) -> BatcherConfig {
		BatcherConfig {
			merge_value_changes: merge,
			deferral: Duration::from_millis(50),
			max_deferral_resets: 3,
		}
	}

	#[tokio::test(start_paused = true)]
	async fn blind_commands_batch_together_in_order() {
		let batcher = CommandBatcher::new(config(false));
		batcher.enqueue(value_changed("a", 1), None);
		batcher.enqueue(value_changed("b", 2), None);
		batcher.enqueue(value_changed("a", 3), None);

		let batch = batcher.next_batch().await;
		assert_eq!(batch.commands, vec![value_changed("a", 1), value_changed("b", 2), value_changed("a", 3)]);
		assert!(batch.handler.is_none());
		assert!(!batch.listener);
	}

	#[tokio::test(start_paused = true)]
	async fn merging_keeps_only_the_latest_value_per_attribute() {
		let batcher = CommandBatcher::new(config(true));
		batcher.enqueue(value_changed("a", 1), None);
		batcher.enqueue(value_changed("b", 7), None);
		batcher.enqueue(value_changed("a", 2), None);
		batcher.enqueue(value_changed("a", 3), None);

		let batch = batcher.next_batch().await;
		assert_eq!(batch.commands, vec![value_changed("a", 3), value_changed("b", 7)]);
	}

	#[tokio::test(start_paused = true)]
	async fn named_command_seals_the_open_batch_and_ships_alone() {
		let batcher = CommandBatcher::new(config(true));
		batcher.enqueue(value_changed("a", 1), None);
		batcher.enqueue(value_changed("a", 2), None);
		batcher.enqueue(
			Command::CallAction {
				n: "x".to_owned(),
				p: Vec::new(),
			},
			Some(Box::new(|_| {})),
		);

		let first = batcher.next_batch().await;
		assert_eq!(first.commands, vec![value_changed("a", 2)]);
		assert!(first.handler.is_none());

		let second = batcher.next_batch().await;
		assert_eq!(second.commands.len(), 1);
		assert!(matches!(&second.commands[0], Command::CallAction { n, .. } if n == "x"));
		assert!(second.handler.is_some());
	}

	#[tokio::test(start_paused = true)]
	async fn merging_never_crosses_a_sealed_batch_boundary() {
		let batcher = CommandBatcher::new(config(true));
		batcher.enqueue(value_changed("a", 1), None);
		batcher.enqueue(Command::Empty, Some(Box::new(|_| {})));
		// The earlier run for `a` is sealed; this opens a fresh one.
		batcher.enqueue(value_changed("a", 2), None);

		let first = batcher.next_batch().await;
		assert_eq!(first.commands, vec![value_changed("a", 1)]);
		let _named = batcher.next_batch().await;
		let third = batcher.next_batch().await;
		assert_eq!(third.commands, vec![value_changed("a", 2)]);
	}

	#[tokio::test(start_paused = true)]
	async fn listener_ships_immediately_as_its_own_batch() {
		let batcher = CommandBatcher::new(config(false));
		batcher.enqueue(value_changed("a", 1), None);
		batcher.enqueue(Command::StartLongPoll, None);

		let first = batcher.next_batch().await;
		assert_eq!(first.commands, vec![value_changed("a", 1)]);
		let second = batcher.next_batch().await;
		assert!(second.listener);
		assert_eq!(second.commands, vec![Command::StartLongPoll]);
	}

	#[tokio::test(start_paused = true)]
	async fn deferral_window_holds_the_batch_open() {
		let batcher = CommandBatcher::new(config(false));
		batcher.enqueue(value_changed("a", 1), None);
		// Arrives inside the window and joins the same batch.
		tokio::time::sleep(Duration::from_millis(20)).await;
		batcher.enqueue(value_changed("a", 2), None);

		let batch = batcher.next_batch().await;
		assert_eq!(batch.commands.len(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn deferral_resets_are_capped() {
		let batcher = CommandBatcher::new(BatcherConfig {
			merge_value_changes: false,
			deferral: Duration::from_millis(50),
			max_deferral_resets: 2,
		});

		let batcher = std::sync::Arc::new(batcher);
		let consumer = tokio::spawn({
			let batcher = std::sync::Arc::clone(&batcher);
			async move {
				let mut sizes = Vec::new();
				while sizes.iter().sum::<usize>() < 10 {
					sizes.push(batcher.next_batch().await.commands.len());
				}
				sizes
			}
		});

		// A steady stream of arrivals, each inside the previous window.
		// Without the cap the deadline would slide forever; with two resets
		// the first flush happens 130ms in (40 + 40 + 50).
		batcher.enqueue(value_changed("a", 0), None);
		for i in 1..10 {
			tokio::time::sleep(Duration::from_millis(40)).await;
			batcher.enqueue(value_changed("a", i), None);
		}

		let sizes = consumer.await.unwrap();
		assert!(sizes.len() >= 2, "cap must force a flush mid-stream: {sizes:?}");
		assert!(sizes[0] < 10);
		assert_eq!(sizes.iter().sum::<usize>(), 10);
	}
}
