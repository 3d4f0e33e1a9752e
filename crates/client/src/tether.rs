//! Application-facing facade owning the store and the connector.

use std::sync::Arc;

use parking_lot::Mutex;
use tether_model::{Attribute, AttributeSpec, Command, PresentationModel, Value};
use tether_store::{ClientModelStore, StoreListener};

use crate::batcher::{BatcherConfig, OnFinished};
use crate::connector::Connector;
use crate::error::Result;
use crate::transport::Transport;

/// Client entry point: one shared store plus the connection.
///
/// Local mutations go through the facade so the matching command is enqueued
/// in the same call; inbound commands keep funnelling through the connector's
/// replay path. Clonable and cheap to pass around.
#[derive(Clone)]
pub struct ClientTether {
	store: Arc<Mutex<ClientModelStore>>,
	connector: Connector,
}

impl ClientTether {
	/// Creates a disconnected client over the given transport.
	pub fn new(transport: Arc<dyn Transport>, config: BatcherConfig) -> Self {
		let store = Arc::new(Mutex::new(ClientModelStore::new()));
		let connector = Connector::new(transport, Arc::clone(&store), config);
		Self { store, connector }
	}

	/// The shared client store.
	pub fn store(&self) -> &Arc<Mutex<ClientModelStore>> {
		&self.store
	}

	/// The underlying connector.
	pub fn connector(&self) -> &Connector {
		&self.connector
	}

	/// Opens the connection. See [`Connector::connect`].
	pub fn connect(&self, long_poll: bool) -> Result<()> {
		self.connector.connect(long_poll)
	}

	/// Closes the connection. See [`Connector::disconnect`].
	pub fn disconnect(&self) -> Result<()> {
		self.connector.disconnect()
	}

	/// Enqueues one outgoing command with an optional completion handler.
	pub fn send(&self, command: Command, on_finished: Option<OnFinished>) -> Result<()> {
		self.connector.send(command, on_finished)
	}

	/// Applies one inbound command to the local store.
	pub fn dispatch_handle(&self, command: &Command) -> Result<()> {
		self.connector.dispatch_handle(command)
	}

	/// Registers a store-wide change listener.
	pub fn subscribe(&self, listener: StoreListener) {
		self.store.lock().subscribe(listener);
	}

	/// Creates a presentation model locally and announces it.
	///
	/// The local mutation happens first; a client-side-only model is never
	/// announced. When disconnected the announce fails and the model stays
	/// local until recreated under a live connection.
	pub fn create_presentation_model(&self, model: PresentationModel) -> Result<()> {
		let announce = (!model.is_client_side_only()).then(|| Command::CreatePresentationModel {
			p_id: model.id().to_owned(),
			p_type: model.model_type().map(str::to_owned),
			attrs: model.attributes().iter().map(AttributeSpec::from).collect(),
		});
		self.store.lock().add(model)?;
		if let Some(command) = announce {
			self.send(command, None)?;
		}
		Ok(())
	}

	/// Sets an attribute value locally (mirroring qualifier peers) and
	/// announces the change.
	pub fn set_value(&self, attribute_id: &str, value: Value) -> Result<()> {
		self.store.lock().set_value(attribute_id, value.clone())?;
		self.send(
			Command::ValueChanged {
				a_id: attribute_id.to_owned(),
				v: value,
			},
			None,
		)
	}

	/// Attributes sharing a qualifier, cloned out of the store.
	pub fn find_all_by_qualifier(&self, qualifier: &str) -> Vec<Attribute> {
		self.store.lock().find_all_by_qualifier(qualifier).into_iter().cloned().collect()
	}
}

#[cfg(test)]
mod tests {
	use async_trait::async_trait;
	use parking_lot::Mutex as PlMutex;
	use pretty_assertions::assert_eq;
	use tether_model::Value;

	use super::*;
	use crate::error::{ClientError, TransportError};

	/// Answers every batch empty and records what went out.
	struct RecordingTransport {
		sent: PlMutex<Vec<Vec<Command>>>,
	}

	#[async_trait]
	impl Transport for RecordingTransport {
		async fn transmit(&self, commands: &[Command]) -> std::result::Result<Vec<Command>, TransportError> {
			self.sent.lock().push(commands.to_vec());
			Ok(Vec::new())
		}

		async fn release(&self) -> std::result::Result<(), TransportError> {
			Ok(())
		}
	}

	fn tether() -> (ClientTether, Arc<RecordingTransport>) {
		let transport = Arc::new(RecordingTransport { sent: PlMutex::new(Vec::new()) });
		let tether = ClientTether::new(Arc::clone(&transport) as Arc<dyn Transport>, BatcherConfig::default());
		(tether, transport)
	}

	fn model(id: &str, attr_id: &str, qualifier: Option<&str>) -> PresentationModel {
		PresentationModel::new(
			id,
			Some("person".to_owned()),
			vec![Attribute::new(attr_id, "name", Value::from("Ada"), qualifier.map(str::to_owned))],
		)
	}

	#[tokio::test(start_paused = true)]
	async fn creation_mutates_locally_and_announces() {
		let (tether, _transport) = tether();
		tether.connect(false).unwrap();
		tether.create_presentation_model(model("pm1", "a1", None)).unwrap();

		assert!(tether.store().lock().find_by_id("pm1").is_some());
		// The announce is queued; a completion handler proves it shipped.
		let (tx, rx) = tokio::sync::oneshot::channel();
		tether.send(Command::Empty, Some(Box::new(move |_| {
			let _ = tx.send(());
		}))).unwrap();
		rx.await.unwrap();
	}

	#[tokio::test(start_paused = true)]
	async fn client_side_only_models_are_not_announced() {
		let (tether, transport) = tether();
		tether.connect(false).unwrap();
		tether.create_presentation_model(model("pm1", "a1", None).client_side_only()).unwrap();

		let (tx, rx) = tokio::sync::oneshot::channel();
		tether.send(Command::Empty, Some(Box::new(move |_| {
			let _ = tx.send(());
		}))).unwrap();
		rx.await.unwrap();

		let sent = transport.sent.lock();
		assert!(
			sent.iter().flatten().all(|c| !matches!(c, Command::CreatePresentationModel { .. })),
			"unexpected announce: {sent:?}"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn set_value_mirrors_qualifier_peers_before_announcing() {
		let (tether, _transport) = tether();
		tether.connect(false).unwrap();
		tether.create_presentation_model(model("pm1", "a1", Some("q"))).unwrap();
		tether.create_presentation_model(model("pm2", "a2", Some("q"))).unwrap();

		tether.set_value("a1", Value::from("Grace")).unwrap();
		let peers = tether.find_all_by_qualifier("q");
		assert_eq!(peers.len(), 2);
		assert!(peers.iter().all(|a| a.value() == &Value::from("Grace")));
	}

	#[tokio::test(start_paused = true)]
	async fn local_mutation_requires_a_connection_to_announce() {
		let (tether, _transport) = tether();
		let err = tether.create_presentation_model(model("pm1", "a1", None)).unwrap_err();
		assert!(matches!(err, ClientError::NotConnected));
		// The local half still happened.
		assert!(tether.store().lock().find_by_id("pm1").is_some());
	}
}
