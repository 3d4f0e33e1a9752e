//! Presentation models: named bundles of attributes.

use crate::attribute::Attribute;

/// A named bundle of attributes representing one synchronized object.
///
/// The model owns its attributes; attribute order is preserved as given at
/// construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationModel {
	id: String,
	presentation_model_type: Option<String>,
	attributes: Vec<Attribute>,
	client_side_only: bool,
}

impl PresentationModel {
	/// Creates a model owning the given attributes.
	pub fn new(id: impl Into<String>, presentation_model_type: Option<String>, mut attributes: Vec<Attribute>) -> Self {
		let id = id.into();
		for attr in &mut attributes {
			attr.attach(&id);
		}
		Self {
			id,
			presentation_model_type,
			attributes,
			client_side_only: false,
		}
	}

	/// Marks the model as client-side only. Such models are never announced
	/// to the remote side.
	pub fn client_side_only(mut self) -> Self {
		self.client_side_only = true;
		self
	}

	/// Unique model id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Optional type tag grouping models of the same shape.
	pub fn model_type(&self) -> Option<&str> {
		self.presentation_model_type.as_deref()
	}

	/// Returns true if the model must not be announced to the remote side.
	pub fn is_client_side_only(&self) -> bool {
		self.client_side_only
	}

	/// Attributes in construction order.
	pub fn attributes(&self) -> &[Attribute] {
		&self.attributes
	}

	/// Mutable attribute access, preserving order.
	pub fn attributes_mut(&mut self) -> &mut [Attribute] {
		&mut self.attributes
	}

	/// Finds an attribute by its unique id.
	pub fn attribute_by_id(&self, attribute_id: &str) -> Option<&Attribute> {
		self.attributes.iter().find(|a| a.id() == attribute_id)
	}

	/// Finds an attribute by property name.
	pub fn attribute(&self, property_name: &str) -> Option<&Attribute> {
		self.attributes.iter().find(|a| a.property_name() == property_name)
	}

	/// Mutable lookup by attribute id.
	pub fn attribute_by_id_mut(&mut self, attribute_id: &str) -> Option<&mut Attribute> {
		self.attributes.iter_mut().find(|a| a.id() == attribute_id)
	}
}
