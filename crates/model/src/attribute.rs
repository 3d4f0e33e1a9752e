//! Attributes: single synchronized value slots.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One synchronized named value slot of a presentation model.
///
/// Attribute ids are unique per store. Attributes sharing a non-null
/// qualifier mirror each other's value after every commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
	id: String,
	property_name: String,
	value: Value,
	qualifier: Option<String>,
	/// Owning model id; non-owning back-reference, set when the attribute is
	/// attached to a model.
	model_id: Option<String>,
}

impl Attribute {
	/// Creates an attribute with an explicit id.
	pub fn new(id: impl Into<String>, property_name: impl Into<String>, value: Value, qualifier: Option<String>) -> Self {
		Self {
			id: id.into(),
			property_name: property_name.into(),
			value,
			qualifier,
			model_id: None,
		}
	}

	/// Unique attribute id.
	pub fn id(&self) -> &str {
		&self.id
	}

	/// Property name within the owning model.
	pub fn property_name(&self) -> &str {
		&self.property_name
	}

	/// Current value.
	pub fn value(&self) -> &Value {
		&self.value
	}

	/// Replaces the current value, returning the previous one.
	pub fn set_value(&mut self, value: Value) -> Value {
		std::mem::replace(&mut self.value, value)
	}

	/// Secondary grouping key shared by mirrored attributes.
	pub fn qualifier(&self) -> Option<&str> {
		self.qualifier.as_deref()
	}

	/// Replaces the qualifier, returning the previous one.
	pub fn set_qualifier(&mut self, qualifier: Option<String>) -> Option<String> {
		std::mem::replace(&mut self.qualifier, qualifier)
	}

	/// Id of the owning model, once attached.
	pub fn model_id(&self) -> Option<&str> {
		self.model_id.as_deref()
	}

	pub(crate) fn attach(&mut self, model_id: &str) {
		self.model_id = Some(model_id.to_owned());
	}
}

/// Wire-level attribute descriptor carried by create commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
	/// Attribute id.
	#[serde(rename = "a_id")]
	pub id: String,
	/// Property name.
	#[serde(rename = "n")]
	pub property_name: String,
	/// Initial value.
	#[serde(rename = "v", default, skip_serializing_if = "Value::is_null")]
	pub value: Value,
	/// Optional qualifier.
	#[serde(rename = "q", default, skip_serializing_if = "Option::is_none")]
	pub qualifier: Option<String>,
}

impl From<&Attribute> for AttributeSpec {
	fn from(attr: &Attribute) -> Self {
		Self {
			id: attr.id().to_owned(),
			property_name: attr.property_name().to_owned(),
			value: attr.value().clone(),
			qualifier: attr.qualifier().map(str::to_owned),
		}
	}
}

impl From<AttributeSpec> for Attribute {
	fn from(spec: AttributeSpec) -> Self {
		Self::new(spec.id, spec.property_name, spec.value, spec.qualifier)
	}
}
