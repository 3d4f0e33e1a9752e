//! Client-side model store: applies inbound commands and notifies listeners.

use tether_model::{Attribute, Command, PresentationModel, Value};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::event::{StoreEvent, StoreListener};
use crate::store::ModelStore;

/// Client-side store variant.
///
/// On top of the core repository it applies inbound commands coming back
/// from the server and fans change events out to registered listeners.
#[derive(Default)]
pub struct ClientModelStore {
	store: ModelStore,
	listeners: Vec<StoreListener>,
}

impl ClientModelStore {
	/// Creates an empty client store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a change listener. Listeners observe every mutation applied
	/// after registration, in application order.
	pub fn subscribe(&mut self, listener: StoreListener) {
		self.listeners.push(listener);
	}

	/// Registers a model locally.
	pub fn add(&mut self, model: PresentationModel) -> Result<()> {
		let model_id = model.id().to_owned();
		self.store.add(model)?;
		self.emit(&StoreEvent::ModelAdded { model_id });
		Ok(())
	}

	/// Removes a model locally.
	pub fn remove(&mut self, model_id: &str) -> Result<PresentationModel> {
		let model = self.store.remove(model_id)?;
		self.emit(&StoreEvent::ModelRemoved {
			model_id: model_id.to_owned(),
		});
		Ok(model)
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

	/// Sets an attribute value, mirroring qualifier-sharing attributes and
	/// notifying listeners for every applied change.
	pub fn set_value(&mut self, attribute_id: &str, value: Value) -> Result<()> {
		let changes = self.store.set_value(attribute_id, value)?;
		for change in changes {
			self.emit(&StoreEvent::ValueChanged {
				attribute_id: change.attribute_id,
				old: change.old,
				new: change.new,
			});
		}
		Ok(())
	}

	/// Applies one inbound command to local state.
	///
	/// This is the `dispatch_handle` half of the collaborator seam: every
	/// decoded response command funnels through here, in received order.
	/// Commands that do not address the store (action calls, lifecycle
	/// signals) are ignored.
	pub fn apply(&mut self, command: &Command) -> Result<()> {
		match command {
			Command::CreatePresentationModel { p_id, p_type, attrs } => {
				let attributes = attrs.iter().cloned().map(Attribute::from).collect();
				self.add(PresentationModel::new(p_id.clone(), p_type.clone(), attributes))
			}
			Command::DeletePresentationModel { p_id } => self.remove(p_id).map(|_| ()),
			Command::ValueChanged { a_id, v } => self.set_value(a_id, v.clone()),
			Command::AttributeMetadataChanged { a_id, n, v } => self.apply_metadata(a_id, n, v),
			other => {
				debug!(discriminator = other.discriminator(), "ignoring non-store command");
				Ok(())
			}
		}
	}

	fn apply_metadata(&mut self, attribute_id: &str, name: &str, value: &Value) -> Result<()> {
		if name != "qualifier" {
			return Err(StoreError::UnsupportedMetadata { name: name.to_owned() });
		}
		let qualifier = value.as_str().map(str::to_owned);
		self.store.set_qualifier(attribute_id, qualifier.clone())?;
		self.emit(&StoreEvent::QualifierChanged {
			attribute_id: attribute_id.to_owned(),
			qualifier,
		});
		Ok(())
	}

	fn emit(&mut self, event: &StoreEvent) {
		for listener in &mut self.listeners {
			listener(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{Arc, Mutex};

	use pretty_assertions::assert_eq;
	use tether_model::AttributeSpec;

	use super::*;

	fn create_command(p_id: &str, a_id: &str, qualifier: Option<&str>) -> Command {
		Command::CreatePresentationModel {
			p_id: p_id.to_owned(),
			p_type: None,
			attrs: vec![AttributeSpec {
				id: a_id.to_owned(),
				property_name: "name".to_owned(),
				value: Value::from("Ada"),
				qualifier: qualifier.map(str::to_owned),
			}],
		}
	}

	#[test]
	fn inbound_create_and_delete_round_trip() {
		let mut store = ClientModelStore::new();
		store.apply(&create_command("pm1", "a1", None)).unwrap();
		assert!(store.find_by_id("pm1").is_some());

		store.apply(&Command::DeletePresentationModel { p_id: "pm1".to_owned() }).unwrap();
		assert!(store.find_by_id("pm1").is_none());
	}

	#[test]
	fn inbound_value_change_mirrors_qualifiers_and_notifies() {
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&events);

		let mut store = ClientModelStore::new();
		store.apply(&create_command("pm1", "a1", Some("q"))).unwrap();
		store.apply(&create_command("pm2", "a2", Some("q"))).unwrap();
		store.subscribe(Box::new(move |event| sink.lock().unwrap().push(event.clone())));

		store
			.apply(&Command::ValueChanged {
				a_id: "a1".to_owned(),
				v: Value::from("Grace"),
			})
			.unwrap();

		assert_eq!(store.attribute("a2").unwrap().value(), &Value::from("Grace"));
		let seen = events.lock().unwrap();
		let changed: Vec<_> = seen
			.iter()
			.filter_map(|e| match e {
				StoreEvent::ValueChanged { attribute_id, .. } => Some(attribute_id.clone()),
				_ => None,
			})
			.collect();
		assert_eq!(changed, ["a1", "a2"]);
	}

	#[test]
	fn inbound_qualifier_metadata_repoints_the_index() {
		let mut store = ClientModelStore::new();
		store.apply(&create_command("pm1", "a1", Some("q"))).unwrap();
		store
			.apply(&Command::AttributeMetadataChanged {
				a_id: "a1".to_owned(),
				n: "qualifier".to_owned(),
				v: Value::from("r"),
			})
			.unwrap();
		assert!(store.find_all_by_qualifier("q").is_empty());
		assert_eq!(store.find_all_by_qualifier("r").len(), 1);
	}

	#[test]
	fn unsupported_metadata_key_is_rejected() {
		let mut store = ClientModelStore::new();
		store.apply(&create_command("pm1", "a1", None)).unwrap();
		let err = store
			.apply(&Command::AttributeMetadataChanged {
				a_id: "a1".to_owned(),
				n: "color".to_owned(),
				v: Value::from("red"),
			})
			.unwrap_err();
		assert!(matches!(err, StoreError::UnsupportedMetadata { .. }));
	}

	#[test]
	fn non_store_commands_are_ignored() {
		let mut store = ClientModelStore::new();
		store.apply(&Command::Empty).unwrap();
		store.apply(&Command::StartLongPoll).unwrap();
		assert!(store.is_empty());
	}

	#[test]
	fn duplicate_inbound_create_fails_without_mutation() {
		let mut store = ClientModelStore::new();
		store.apply(&create_command("pm1", "a1", None)).unwrap();
		let err = store.apply(&create_command("pm1", "a9", None)).unwrap_err();
		assert!(matches!(err, StoreError::DuplicateModelId { .. }));
		assert!(store.attribute("a9").is_none());
	}
}
