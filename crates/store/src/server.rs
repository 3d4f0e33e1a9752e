//! Server-side model store: mirrors mutations into an explicit response
//! context drained by the active request.

use tether_model::{Attribute, AttributeSpec, Command, PresentationModel, Value};

use crate::error::Result;
use crate::store::ModelStore;

/// Commands accumulated while handling one request.
///
/// The response context is always passed explicitly by parameter; there is
/// no ambient per-thread response state. The request handler drains it once
/// command processing finishes.
#[derive(Debug, Default)]
pub struct ResponseContext {
	commands: Vec<Command>,
}

impl ResponseContext {
	/// Creates an empty response buffer.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends one response command.
	pub fn push(&mut self, command: Command) {
		self.commands.push(command);
	}

	/// Returns true if nothing was accumulated.
	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Accumulated commands, in append order.
	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	/// Takes the accumulated commands, leaving the buffer empty.
	pub fn drain(&mut self) -> Vec<Command> {
		std::mem::take(&mut self.commands)
	}
}

/// Server-side store variant.
///
/// Server-originated lifecycle and value mutations additionally append the
/// matching wire command to the response context so the client converges.
/// Client-originated commands are applied through [`ServerModelStore::apply_remote`],
/// which never echoes back to the sender.
#[derive(Debug, Default)]
pub struct ServerModelStore {
	store: ModelStore,
}

impl ServerModelStore {
	/// Creates an empty server store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a server-created model and announces it to the client,
	/// unless the model is client-side only.
	pub fn add(&mut self, model: PresentationModel, response: &mut ResponseContext) -> Result<()> {
		let announce = (!model.is_client_side_only()).then(|| Command::CreatePresentationModel {
			p_id: model.id().to_owned(),
			p_type: model.model_type().map(str::to_owned),
			attrs: model.attributes().iter().map(AttributeSpec::from).collect(),
		});
		self.store.add(model)?;
		if let Some(command) = announce {
			response.push(command);
		}
		Ok(())
	}

	/// Removes a server-side model and announces the deletion.
	pub fn remove(&mut self, model_id: &str, response: &mut ResponseContext) -> Result<PresentationModel> {
		let model = self.store.remove(model_id)?;
		if !model.is_client_side_only() {
			response.push(Command::DeletePresentationModel { p_id: model_id.to_owned() });
		}
		Ok(model)
	}

	/// Sets a value server-side and announces the change.
	///
	/// Only the targeted attribute is announced; the client mirrors
	/// qualifier-sharing attributes itself when applying the command.
	pub fn set_value(&mut self, attribute_id: &str, value: Value, response: &mut ResponseContext) -> Result<()> {
		let changes = self.store.set_value(attribute_id, value.clone())?;
		if changes.iter().any(|c| c.attribute_id == attribute_id) {
			response.push(Command::ValueChanged {
				a_id: attribute_id.to_owned(),
				v: value,
			});
		}
		Ok(())
	}

	/// Applies one client-originated command without echoing it back.
	pub fn apply_remote(&mut self, command: &Command) -> Result<()> {
		match command {
			Command::CreatePresentationModel { p_id, p_type, attrs } => {
				let attributes = attrs.iter().cloned().map(Attribute::from).collect();
				self.store.add(PresentationModel::new(p_id.clone(), p_type.clone(), attributes))
			}
			Command::DeletePresentationModel { p_id } => self.store.remove(p_id).map(|_| ()),
			Command::ValueChanged { a_id, v } => self.store.set_value(a_id, v.clone()).map(|_| ()),
			Command::AttributeMetadataChanged { a_id, n, v } => {
				if n == "qualifier" {
					self.store.set_qualifier(a_id, v.as_str().map(str::to_owned))
				} else {
					Err(crate::error::StoreError::UnsupportedMetadata { name: n.clone() })
				}
			}
			_ => Ok(()),
		}
	}

	/// Read-only model lookup.
	pub fn find_by_id(&self, model_id: &str) -> Option<&PresentationModel> {
		self.store.find_by_id(model_id)
	}

	/// Attributes sharing a qualifier, in registration order.
	pub fn find_all_by_qualifier(&self, qualifier: &str) -> Vec<&Attribute> {
		self.store.find_all_by_qualifier(qualifier)
	}

	/// Read-only attribute lookup.
	pub fn attribute(&self, attribute_id: &str) -> Option<&Attribute> {
		self.store.attribute(attribute_id)
	}

	/// Number of registered models.
	pub fn len(&self) -> usize {
		self.store.len()
	}

	/// Returns true if no model is registered.
	pub fn is_empty(&self) -> bool {
		self.store.is_empty()
	}
}
