//! Store change events delivered to local listeners.

use tether_model::Value;

/// One observable store mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
	/// A model was registered.
	ModelAdded {
		/// Id of the new model.
		model_id: String,
	},
	/// A model was unregistered.
	ModelRemoved {
		/// Id of the removed model.
		model_id: String,
	},
	/// An attribute's value changed (including qualifier mirroring).
	ValueChanged {
		/// Id of the changed attribute.
		attribute_id: String,
		/// Previous value.
		old: Value,
		/// New value.
		new: Value,
	},
	/// An attribute's qualifier changed.
	QualifierChanged {
		/// Id of the changed attribute.
		attribute_id: String,
		/// New qualifier, if any.
		qualifier: Option<String>,
	},
}

/// Callback invoked after each applied store mutation.
pub type StoreListener = Box<dyn FnMut(&StoreEvent) + Send>;
