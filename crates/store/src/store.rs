//! Core model repository shared by the client and server store variants.

use rustc_hash::FxHashMap;
use tether_model::{Attribute, PresentationModel, Value};

use crate::error::{Result, StoreError};

/// One applied value change, reported so callers can notify listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
	/// The attribute whose value changed.
	pub attribute_id: String,
	/// Previous value.
	pub old: Value,
	/// New value.
	pub new: Value,
}

/// In-memory repository of presentation models, indexed by model id,
/// attribute id and qualifier.
///
/// Not synchronized; all mutation is expected on one logical thread.
#[derive(Debug, Default)]
pub struct ModelStore {
	models: FxHashMap<String, PresentationModel>,
	/// attribute id -> owning model id
	attribute_index: FxHashMap<String, String>,
	/// qualifier -> attribute ids sharing it, in registration order
	qualifier_index: FxHashMap<String, Vec<String>>,
}

impl ModelStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a model and indexes its attributes.
	///
	/// Fails with a duplicate-id error if the model id or any attribute id is
	/// already present; the store is left unchanged on failure.
	pub fn add(&mut self, model: PresentationModel) -> Result<()> {
		if self.models.contains_key(model.id()) {
			return Err(StoreError::DuplicateModelId { id: model.id().to_owned() });
		}
		for (i, attr) in model.attributes().iter().enumerate() {
			let clashes_within = model.attributes()[..i].iter().any(|prev| prev.id() == attr.id());
			if clashes_within || self.attribute_index.contains_key(attr.id()) {
				return Err(StoreError::DuplicateAttributeId { id: attr.id().to_owned() });
			}
		}

		let model_id = model.id().to_owned();
		for attr in model.attributes() {
			self.attribute_index.insert(attr.id().to_owned(), model_id.clone());
			if let Some(q) = attr.qualifier() {
				self.qualifier_index.entry(q.to_owned()).or_default().push(attr.id().to_owned());
			}
		}
		self.models.insert(model_id.clone(), model);
		self.update_qualifiers(&model_id)?;
		Ok(())
	}

	/// Unregisters a model, returning it.
	pub fn remove(&mut self, model_id: &str) -> Result<PresentationModel> {
		let model = self.models.remove(model_id).ok_or_else(|| StoreError::ModelNotFound { id: model_id.to_owned() })?;
		for attr in model.attributes() {
			self.attribute_index.remove(attr.id());
			if let Some(q) = attr.qualifier()
				&& let Some(ids) = self.qualifier_index.get_mut(q)
			{
				ids.retain(|id| id != attr.id());
				if ids.is_empty() {
					self.qualifier_index.remove(q);
				}
			}
		}
		Ok(model)
	}

	/// Read-only model lookup.
	pub fn find_by_id(&self, model_id: &str) -> Option<&PresentationModel> {
		self.models.get(model_id)
	}

	/// Returns every attribute sharing the given qualifier, in registration
	/// order.
	pub fn find_all_by_qualifier(&self, qualifier: &str) -> Vec<&Attribute> {
		let Some(ids) = self.qualifier_index.get(qualifier) else {
			return Vec::new();
		};
		ids.iter().filter_map(|id| self.attribute(id)).collect()
	}

	/// Read-only attribute lookup by unique attribute id.
	pub fn attribute(&self, attribute_id: &str) -> Option<&Attribute> {
		let model_id = self.attribute_index.get(attribute_id)?;
		self.models.get(model_id)?.attribute_by_id(attribute_id)
	}

	/// Number of registered models.
	pub fn len(&self) -> usize {
		self.models.len()
	}

	/// Returns true if no model is registered.
	pub fn is_empty(&self) -> bool {
		self.models.is_empty()
	}

	/// Ids of all registered models. Order is unspecified.
	pub fn model_ids(&self) -> impl Iterator<Item = &str> {
		self.models.keys().map(String::as_str)
	}

	/// Sets an attribute's value and mirrors it to every attribute sharing
	/// its qualifier.
	///
	/// Returns the applied changes in mirror order (target first). Attributes
	/// already holding the new value are skipped.
	pub fn set_value(&mut self, attribute_id: &str, value: Value) -> Result<Vec<ValueChange>> {
		let qualifier = {
			let attr = self
				.attribute(attribute_id)
				.ok_or_else(|| StoreError::AttributeNotFound { id: attribute_id.to_owned() })?;
			attr.qualifier().map(str::to_owned)
		};

		let mut targets = vec![attribute_id.to_owned()];
		if let Some(q) = qualifier
			&& let Some(ids) = self.qualifier_index.get(&q)
		{
			targets.extend(ids.iter().filter(|id| id.as_str() != attribute_id).cloned());
		}

		let mut changes = Vec::new();
		for id in targets {
			if let Some(change) = self.write_value(&id, value.clone()) {
				changes.push(change);
			}
		}
		Ok(changes)
	}

	/// Re-points an attribute's qualifier, keeping the qualifier index
	/// consistent.
	pub fn set_qualifier(&mut self, attribute_id: &str, qualifier: Option<String>) -> Result<()> {
		let model_id = self
			.attribute_index
			.get(attribute_id)
			.cloned()
			.ok_or_else(|| StoreError::AttributeNotFound { id: attribute_id.to_owned() })?;
		let model = self.models.get_mut(&model_id).ok_or_else(|| StoreError::ModelNotFound { id: model_id.clone() })?;
		let attr = model
			.attribute_by_id_mut(attribute_id)
			.ok_or_else(|| StoreError::AttributeNotFound { id: attribute_id.to_owned() })?;
		let previous = attr.set_qualifier(qualifier.clone());

		if let Some(prev) = previous
			&& let Some(ids) = self.qualifier_index.get_mut(&prev)
		{
			ids.retain(|id| id != attribute_id);
			if ids.is_empty() {
				self.qualifier_index.remove(&prev);
			}
		}
		if let Some(q) = qualifier {
			self.qualifier_index.entry(q).or_default().push(attribute_id.to_owned());
		}
		Ok(())
	}

	/// Creation-time qualifier propagation: pushes each of the model's
	/// attribute values to every other attribute sharing its qualifier.
	///
	/// Only called when a model is added; later changes propagate through the
	/// normal change-listener path.
	fn update_qualifiers(&mut self, model_id: &str) -> Result<()> {
		let sources: Vec<(String, Value)> = self
			.models
			.get(model_id)
			.ok_or_else(|| StoreError::ModelNotFound { id: model_id.to_owned() })?
			.attributes()
			.iter()
			.filter(|a| a.qualifier().is_some())
			.map(|a| (a.id().to_owned(), a.value().clone()))
			.collect();
		for (attribute_id, value) in sources {
			self.set_value(&attribute_id, value)?;
		}
		Ok(())
	}

	fn write_value(&mut self, attribute_id: &str, value: Value) -> Option<ValueChange> {
		let model_id = self.attribute_index.get(attribute_id)?.clone();
		let attr = self.models.get_mut(&model_id)?.attribute_by_id_mut(attribute_id)?;
		if attr.value() == &value {
			return None;
		}
		let old = attr.set_value(value.clone());
		Some(ValueChange {
			attribute_id: attribute_id.to_owned(),
			old,
			new: value,
		})
	}
}
