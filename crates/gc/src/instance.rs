//! Instance graph bookkeeping types.

/// Kind of reference edge between two shared beans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
	/// A single reference-typed slot.
	Reference,
	/// One element of a list-typed slot.
	List,
}

/// One directed reference edge. The parent owns the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
	/// Owning bean id.
	pub parent: String,
	/// Referenced bean id.
	pub child: String,
	/// Slot kind.
	pub kind: SlotKind,
	/// Slot name within the parent.
	pub slot: String,
}

impl Reference {
	pub(crate) fn matches(&self, parent: &str, child: &str, kind: SlotKind, slot: &str) -> bool {
		self.parent == parent && self.child == child && self.kind == kind && self.slot == slot
	}
}

/// Per-bean bookkeeping: root flag plus incoming and outgoing edges.
#[derive(Debug, Default)]
pub(crate) struct Instance {
	pub(crate) root: bool,
	/// Edges pointing at this bean. Duplicates are allowed for list slots
	/// holding the same element more than once.
	pub(crate) incoming: Vec<Reference>,
	/// Edges this bean owns.
	pub(crate) outgoing: Vec<Reference>,
}

/// Snapshot of a bean's reference- and list-typed slots at creation time.
///
/// The caller supplies slot contents explicitly; the collector never
/// inspects application objects itself.
#[derive(Debug, Clone, Default)]
pub struct BeanSnapshot {
	pub(crate) id: String,
	pub(crate) reference_slots: Vec<(String, Option<String>)>,
	pub(crate) list_slots: Vec<(String, Vec<String>)>,
}

impl BeanSnapshot {
	/// Starts a snapshot for the given bean id.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			..Self::default()
		}
	}

	/// Declares one reference-typed slot with its current target.
	pub fn reference_slot(mut self, name: impl Into<String>, target: Option<String>) -> Self {
		self.reference_slots.push((name.into(), target));
		self
	}

	/// Declares one list-typed slot with its current elements.
	pub fn list_slot(mut self, name: impl Into<String>, elements: impl IntoIterator<Item = String>) -> Self {
		self.list_slots.push((name.into(), elements.into_iter().collect()));
		self
	}

	/// The bean id this snapshot describes.
	pub fn id(&self) -> &str {
		&self.id
	}
}
