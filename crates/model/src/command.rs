//! Wire-transferable commands.

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeSpec;
use crate::value::Value;

/// One named parameter of a remote action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParam {
	/// Parameter name.
	#[serde(rename = "n")]
	pub name: String,
	/// Parameter value.
	#[serde(rename = "v")]
	pub value: Value,
}

impl ActionParam {
	/// Creates a named parameter.
	pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
		}
	}
}

/// One atomic, wire-transferable mutation or lifecycle event.
///
/// The `id` field is the stable wire discriminator; codec dispatch is keyed
/// on it. Every variant carries only the fields relevant to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id")]
pub enum Command {
	/// Announce a new presentation model with its attributes.
	CreatePresentationModel {
		/// Model id.
		p_id: String,
		/// Optional model type tag.
		#[serde(default, skip_serializing_if = "Option::is_none")]
		p_type: Option<String>,
		/// Attribute descriptors in model order.
		attrs: Vec<AttributeSpec>,
	},
	/// Remove a presentation model and its attributes.
	DeletePresentationModel {
		/// Model id.
		p_id: String,
	},
	/// An attribute's value changed.
	ValueChanged {
		/// Attribute id.
		a_id: String,
		/// New value.
		v: Value,
	},
	/// An attribute's metadata (e.g. its qualifier) changed.
	///
	/// Older peers emit the `ChangeAttributeMetadata` spelling; both decode
	/// to this variant.
	#[serde(alias = "ChangeAttributeMetadata")]
	AttributeMetadataChanged {
		/// Attribute id.
		a_id: String,
		/// Metadata key, e.g. `qualifier`.
		n: String,
		/// New metadata value.
		v: Value,
	},
	/// Invoke a named server action.
	CallAction {
		/// Action name.
		n: String,
		/// Ordered named parameters.
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		p: Vec<ActionParam>,
	},
	/// Open a session context on the server.
	CreateContext,
	/// Tear down a session context.
	DestroyContext,
	/// Bind a named controller, instantiating its models.
	CreateController {
		/// Controller type name.
		n: String,
		/// Controller instance id chosen by the caller.
		c_id: String,
	},
	/// Tear down a controller instance and its models.
	DestroyController {
		/// Controller instance id.
		c_id: String,
	},
	/// Open the perpetual long poll.
	StartLongPoll,
	/// Ask the remote side to return the outstanding long poll early.
	InterruptLongPoll,
	/// No-op placeholder.
	Empty,
}

impl Command {
	/// Discriminators the codec accepts, including legacy aliases.
	pub const DISCRIMINATORS: &'static [&'static str] = &[
		"CreatePresentationModel",
		"DeletePresentationModel",
		"ValueChanged",
		"AttributeMetadataChanged",
		"ChangeAttributeMetadata",
		"CallAction",
		"CreateContext",
		"DestroyContext",
		"CreateController",
		"DestroyController",
		"StartLongPoll",
		"InterruptLongPoll",
		"Empty",
	];

	/// The stable wire discriminator of this command.
	pub fn discriminator(&self) -> &'static str {
		match self {
			Self::CreatePresentationModel { .. } => "CreatePresentationModel",
			Self::DeletePresentationModel { .. } => "DeletePresentationModel",
			Self::ValueChanged { .. } => "ValueChanged",
			Self::AttributeMetadataChanged { .. } => "AttributeMetadataChanged",
			Self::CallAction { .. } => "CallAction",
			Self::CreateContext => "CreateContext",
			Self::DestroyContext => "DestroyContext",
			Self::CreateController { .. } => "CreateController",
			Self::DestroyController { .. } => "DestroyController",
			Self::StartLongPoll => "StartLongPoll",
			Self::InterruptLongPoll => "InterruptLongPoll",
			Self::Empty => "Empty",
		}
	}

	/// For a [`Command::ValueChanged`], the targeted attribute id.
	///
	/// Batching uses this to merge consecutive blind value changes for the
	/// same attribute.
	pub fn value_change_target(&self) -> Option<&str> {
		match self {
			Self::ValueChanged { a_id, .. } => Some(a_id),
			_ => None,
		}
	}

	/// Returns true for the long-poll listener command.
	pub fn is_listener(&self) -> bool {
		matches!(self, Self::StartLongPoll)
	}
}
