//! Incremental reachability collector.

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::error::{GcError, Result};
use crate::instance::{BeanSnapshot, Instance, Reference, SlotKind};

type InstanceMap = rustc_hash::FxHashMap<String, Instance>;

/// Reference-counted reachability collector with explicit root marking.
///
/// Each registered bean tracks its incoming edges. The collector maintains
/// one invariant incrementally: a non-root bean is *scheduled* (slated for
/// collection) exactly when every one of its incoming parents is scheduled,
/// vacuously so for a bean with no incoming edges. Because the edge graph is
/// kept acyclic, this coincides with "no path of live edges from any root".
///
/// Cost is O(edge churn) per mutation; no full-graph scan ever runs after a
/// bean's initial slot classification.
#[derive(Debug, Default)]
pub struct GarbageCollector {
	instances: InstanceMap,
	/// Scheduled beans in scheduling order.
	scheduled: IndexSet<String>,
}

impl GarbageCollector {
	/// Creates an empty collector.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a freshly created bean and its current slot contents as
	/// outgoing edges.
	///
	/// Every referenced bean must already be registered. A non-root bean is
	/// scheduled immediately; it becomes live once something live references
	/// it. Fails without mutation on duplicate registration, unknown targets
	/// or self-reference.
	pub fn on_bean_created(&mut self, snapshot: BeanSnapshot, is_root: bool) -> Result<()> {
		let id = snapshot.id;
		if self.instances.contains_key(&id) {
			return Err(GcError::AlreadyRegistered { id });
		}

		let mut edges: Vec<(String, String, SlotKind)> = Vec::new();
		for (slot, target) in snapshot.reference_slots {
			if let Some(child) = target {
				edges.push((slot, child, SlotKind::Reference));
			}
		}
		for (slot, elements) in snapshot.list_slots {
			for child in elements {
				edges.push((slot.clone(), child, SlotKind::List));
			}
		}
		for (_, child, _) in &edges {
			if child == &id {
				return Err(GcError::Cycle {
					parent: id.clone(),
					child: child.clone(),
				});
			}
			if !self.instances.contains_key(child) {
				return Err(GcError::UnknownBean { id: child.clone() });
			}
		}

		self.instances.insert(id.clone(), Instance {
			root: is_root,
			..Instance::default()
		});
		// Schedule before wiring outgoing edges so children referenced only
		// by this (still unreachable) bean stay scheduled.
		if !is_root {
			trace!(bean = %id, "scheduling unreferenced bean");
			self.scheduled.insert(id.clone());
		}
		for (slot, child, kind) in edges {
			self.insert_edge(&id, &child, kind, &slot);
		}
		Ok(())
	}

	/// Re-points a reference-typed slot from `old` to `new`.
	///
	/// Removes the edge to `old` (cascading scheduling through descendants
	/// left unreachable) and adds an edge to `new` (cascading un-scheduling
	/// through descendants made reachable again). An assignment whose target
	/// is an ancestor of the owner is rejected before any mutation.
	pub fn on_property_value_changed(&mut self, parent: &str, slot: &str, old: Option<&str>, new: Option<&str>) -> Result<()> {
		if old == new {
			return Ok(());
		}
		self.ensure_known(parent)?;
		if let Some(new) = new {
			self.ensure_known(new)?;
			if self.would_cycle(parent, new) {
				return Err(GcError::Cycle {
					parent: parent.to_owned(),
					child: new.to_owned(),
				});
			}
		}
		if let Some(old) = old {
			self.remove_edge(parent, old, SlotKind::Reference, slot)?;
		}
		if let Some(new) = new {
			self.insert_edge(parent, new, SlotKind::Reference, slot);
		}
		Ok(())
	}

	/// Registers one list-element edge.
	pub fn on_added_to_list(&mut self, parent: &str, slot: &str, child: &str) -> Result<()> {
		self.ensure_known(parent)?;
		self.ensure_known(child)?;
		if self.would_cycle(parent, child) {
			return Err(GcError::Cycle {
				parent: parent.to_owned(),
				child: child.to_owned(),
			});
		}
		self.insert_edge(parent, child, SlotKind::List, slot);
		Ok(())
	}

	/// Drops one list-element edge.
	pub fn on_removed_from_list(&mut self, parent: &str, slot: &str, child: &str) -> Result<()> {
		self.ensure_known(parent)?;
		self.remove_edge(parent, child, SlotKind::List, slot)
	}

	/// Unregisters a bean, dropping its own outgoing edges and cascading
	/// scheduling to children left unreachable.
	pub fn on_bean_removed(&mut self, id: &str) -> Result<()> {
		let instance = self.instances.remove(id).ok_or_else(|| GcError::UnknownBean { id: id.to_owned() })?;
		self.scheduled.shift_remove(id);

		for reference in &instance.incoming {
			if let Some(parent) = self.instances.get_mut(&reference.parent)
				&& let Some(pos) = parent.outgoing.iter().position(|r| r == reference)
			{
				parent.outgoing.remove(pos);
			}
		}
		for reference in &instance.outgoing {
			if let Some(child) = self.instances.get_mut(&reference.child)
				&& let Some(pos) = child.incoming.iter().position(|r| r == reference)
			{
				child.incoming.remove(pos);
			}
		}
		for reference in &instance.outgoing {
			self.schedule_cascade(&reference.child);
		}
		Ok(())
	}

	/// Explicit flush point: hands the full scheduled set to `on_collect`,
	/// then clears bookkeeping for those instances. Returns the number of
	/// collected beans.
	///
	/// Never runs automatically; invoke it periodically or on a transport
	/// heartbeat.
	pub fn gc(&mut self, on_collect: impl FnOnce(&[String])) -> usize {
		let collected: Vec<String> = self.scheduled.drain(..).collect();
		if !collected.is_empty() {
			debug!(count = collected.len(), "collecting unreachable beans");
		}
		on_collect(&collected);
		for id in &collected {
			let Some(instance) = self.instances.remove(id) else { continue };
			for reference in &instance.incoming {
				if let Some(parent) = self.instances.get_mut(&reference.parent)
					&& let Some(pos) = parent.outgoing.iter().position(|r| r == reference)
				{
					parent.outgoing.remove(pos);
				}
			}
			for reference in &instance.outgoing {
				if let Some(child) = self.instances.get_mut(&reference.child)
					&& let Some(pos) = child.incoming.iter().position(|r| r == reference)
				{
					child.incoming.remove(pos);
				}
			}
		}
		collected.len()
	}

	/// Returns true if the bean is registered.
	pub fn is_registered(&self, id: &str) -> bool {
		self.instances.contains_key(id)
	}

	/// Returns true if the bean is currently slated for collection.
	pub fn is_scheduled(&self, id: &str) -> bool {
		self.scheduled.contains(id)
	}

	/// Number of registered beans.
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	/// Returns true if no bean is registered.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Scheduled bean ids in scheduling order.
	pub fn scheduled(&self) -> impl Iterator<Item = &str> {
		self.scheduled.iter().map(String::as_str)
	}

	fn ensure_known(&self, id: &str) -> Result<()> {
		if self.instances.contains_key(id) {
			Ok(())
		} else {
			Err(GcError::UnknownBean { id: id.to_owned() })
		}
	}

	/// Ancestor walk with an explicit visited set: true if `child` is the
	/// owner itself or an ancestor of it, i.e. the new edge would close a
	/// cycle. Bounded memory on deep graphs, no call-stack recursion.
	fn would_cycle(&self, parent: &str, child: &str) -> bool {
		if parent == child {
			return true;
		}
		let mut visited: FxHashSet<&str> = FxHashSet::default();
		let mut work: Vec<&str> = vec![parent];
		while let Some(id) = work.pop() {
			if !visited.insert(id) {
				continue;
			}
			if id == child {
				return true;
			}
			if let Some(instance) = self.instances.get(id) {
				work.extend(instance.incoming.iter().map(|r| r.parent.as_str()));
			}
		}
		false
	}

	/// Wires one validated edge and cascades un-scheduling if the child just
	/// became reachable through a live parent.
	fn insert_edge(&mut self, parent: &str, child: &str, kind: SlotKind, slot: &str) {
		let reference = Reference {
			parent: parent.to_owned(),
			child: child.to_owned(),
			kind,
			slot: slot.to_owned(),
		};
		if let Some(p) = self.instances.get_mut(parent) {
			p.outgoing.push(reference.clone());
		}
		if let Some(c) = self.instances.get_mut(child) {
			c.incoming.push(reference);
		}
		if self.scheduled.contains(child) && !self.scheduled.contains(parent) {
			self.unschedule_cascade(child);
		}
	}

	/// Drops one matching edge and cascades scheduling if the child lost its
	/// last live parent. Fails without mutation if no such edge exists.
	fn remove_edge(&mut self, parent: &str, child: &str, kind: SlotKind, slot: &str) -> Result<()> {
		let p = self
			.instances
			.get_mut(parent)
			.ok_or_else(|| GcError::UnknownBean { id: parent.to_owned() })?;
		let pos = p
			.outgoing
			.iter()
			.position(|r| r.matches(parent, child, kind, slot))
			.ok_or_else(|| GcError::NoSuchEdge {
				parent: parent.to_owned(),
				child: child.to_owned(),
				slot: slot.to_owned(),
			})?;
		let reference = p.outgoing.remove(pos);
		if let Some(c) = self.instances.get_mut(child)
			&& let Some(pos) = c.incoming.iter().position(|r| r == &reference)
		{
			c.incoming.remove(pos);
		}
		self.schedule_cascade(child);
		Ok(())
	}

	/// Schedules `start` if it just became unreachable, then walks its
	/// descendants re-checking each. Worklist-driven, no recursion.
	fn schedule_cascade(&mut self, start: &str) {
		let mut work = vec![start.to_owned()];
		while let Some(id) = work.pop() {
			let Some(instance) = self.instances.get(&id) else { continue };
			if instance.root || self.scheduled.contains(&id) {
				continue;
			}
			if instance.incoming.iter().any(|r| !self.scheduled.contains(&r.parent)) {
				// Still referenced by something live.
				continue;
			}
			trace!(bean = %id, "scheduling unreachable bean");
			work.extend(instance.outgoing.iter().map(|r| r.child.clone()));
			self.scheduled.insert(id);
		}
	}

	/// Un-schedules `start` if it regained a live parent, then walks its
	/// descendants re-checking each.
	fn unschedule_cascade(&mut self, start: &str) {
		let mut work = vec![start.to_owned()];
		while let Some(id) = work.pop() {
			if !self.scheduled.contains(&id) {
				continue;
			}
			let Some(instance) = self.instances.get(&id) else { continue };
			if !instance.incoming.iter().any(|r| !self.scheduled.contains(&r.parent)) {
				// Every parent is still scheduled.
				continue;
			}
			trace!(bean = %id, "bean became reachable again");
			work.extend(instance.outgoing.iter().map(|r| r.child.clone()));
			self.scheduled.shift_remove(&id);
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn root(gc: &mut GarbageCollector, id: &str) {
		gc.on_bean_created(BeanSnapshot::new(id), true).unwrap();
	}

	fn bean(gc: &mut GarbageCollector, id: &str) {
		gc.on_bean_created(BeanSnapshot::new(id), false).unwrap();
	}

	/// From-scratch reachability scan used to cross-check the incremental
	/// bookkeeping: walk outgoing edges from every root, report the rest.
	fn scan_unreachable(gc: &GarbageCollector) -> Vec<String> {
		let mut visited: FxHashSet<&str> = FxHashSet::default();
		let mut work: Vec<&str> = gc
			.instances
			.iter()
			.filter(|(_, inst)| inst.root)
			.map(|(id, _)| id.as_str())
			.collect();
		while let Some(id) = work.pop() {
			if !visited.insert(id) {
				continue;
			}
			if let Some(inst) = gc.instances.get(id) {
				work.extend(inst.outgoing.iter().map(|r| r.child.as_str()));
			}
		}
		let mut unreachable: Vec<String> = gc.instances.keys().filter(|id| !visited.contains(id.as_str())).cloned().collect();
		unreachable.sort();
		unreachable
	}

	fn assert_consistent(gc: &GarbageCollector) {
		let mut scheduled: Vec<String> = gc.scheduled().map(str::to_owned).collect();
		scheduled.sort();
		assert_eq!(scheduled, scan_unreachable(gc), "incremental set diverged from full scan");
	}

	#[test]
	fn fresh_orphan_is_scheduled_and_root_is_not() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "orphan");
		assert!(!gc.is_scheduled("r"));
		assert!(gc.is_scheduled("orphan"));
		assert_consistent(&gc);
	}

	#[test]
	fn gaining_a_live_parent_unschedules() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "a");
		gc.on_property_value_changed("r", "slot", None, Some("a")).unwrap();
		assert!(!gc.is_scheduled("a"));
		assert_consistent(&gc);
	}

	#[test]
	fn dropping_the_last_live_edge_cascades_through_descendants() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "c");
		bean(&mut gc, "b");
		bean(&mut gc, "a");
		gc.on_property_value_changed("a", "next", None, Some("b")).unwrap();
		gc.on_property_value_changed("b", "next", None, Some("c")).unwrap();
		gc.on_property_value_changed("r", "head", None, Some("a")).unwrap();
		assert_consistent(&gc);
		assert!(!gc.is_scheduled("c"));

		gc.on_property_value_changed("r", "head", Some("a"), None).unwrap();
		assert!(gc.is_scheduled("a"));
		assert!(gc.is_scheduled("b"));
		assert!(gc.is_scheduled("c"));
		assert_consistent(&gc);
	}

	#[test]
	fn regaining_an_edge_unschedules_the_whole_chain() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "b");
		bean(&mut gc, "a");
		gc.on_property_value_changed("a", "next", None, Some("b")).unwrap();
		gc.on_property_value_changed("r", "head", None, Some("a")).unwrap();
		gc.on_property_value_changed("r", "head", Some("a"), None).unwrap();
		assert!(gc.is_scheduled("a") && gc.is_scheduled("b"));

		gc.on_property_value_changed("r", "head", None, Some("a")).unwrap();
		assert!(!gc.is_scheduled("a"));
		assert!(!gc.is_scheduled("b"));
		assert_consistent(&gc);
	}

	#[test]
	fn repointing_a_slot_swaps_reachability() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "old");
		bean(&mut gc, "new");
		gc.on_property_value_changed("r", "slot", None, Some("old")).unwrap();
		gc.on_property_value_changed("r", "slot", Some("old"), Some("new")).unwrap();
		assert!(gc.is_scheduled("old"));
		assert!(!gc.is_scheduled("new"));
		assert_consistent(&gc);
	}

	#[test]
	fn list_edges_follow_the_same_semantics() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "item");
		gc.on_added_to_list("r", "items", "item").unwrap();
		assert!(!gc.is_scheduled("item"));

		// The same element twice: one removal must not orphan it.
		gc.on_added_to_list("r", "items", "item").unwrap();
		gc.on_removed_from_list("r", "items", "item").unwrap();
		assert!(!gc.is_scheduled("item"));
		assert_consistent(&gc);

		gc.on_removed_from_list("r", "items", "item").unwrap();
		assert!(gc.is_scheduled("item"));
		assert_consistent(&gc);
	}

	#[test]
	fn creation_snapshot_registers_slot_edges() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "left");
		bean(&mut gc, "right");
		gc.on_bean_created(
			BeanSnapshot::new("node")
				.reference_slot("left", Some("left".to_owned()))
				.reference_slot("empty", None)
				.list_slot("children", ["right".to_owned()]),
			false,
		)
		.unwrap();

		// `node` is itself unreferenced, so it and everything reachable only
		// through it stay scheduled.
		assert!(gc.is_scheduled("node"));
		assert!(gc.is_scheduled("left"));
		assert!(gc.is_scheduled("right"));
		assert_consistent(&gc);

		gc.on_property_value_changed("r", "slot", None, Some("node")).unwrap();
		assert!(!gc.is_scheduled("node"));
		assert!(!gc.is_scheduled("left"));
		assert!(!gc.is_scheduled("right"));
		assert_consistent(&gc);
	}

	#[test]
	fn cyclic_assignment_is_rejected_without_mutation() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "a");
		bean(&mut gc, "b");
		gc.on_property_value_changed("r", "head", None, Some("a")).unwrap();
		gc.on_property_value_changed("a", "next", None, Some("b")).unwrap();

		for _ in 0..2 {
			// Idempotent failure: rejecting twice leaves the graph identical.
			let err = gc.on_property_value_changed("b", "back", None, Some("a")).unwrap_err();
			assert!(matches!(err, GcError::Cycle { .. }));
			let err = gc.on_property_value_changed("b", "this", None, Some("b")).unwrap_err();
			assert!(matches!(err, GcError::Cycle { .. }));
			assert_consistent(&gc);
			assert!(!gc.is_scheduled("a") && !gc.is_scheduled("b"));
		}

		// A rejected re-pointing must also keep the old edge intact.
		let err = gc.on_property_value_changed("a", "next", Some("b"), Some("r")).unwrap_err();
		assert!(matches!(err, GcError::Cycle { .. }));
		assert!(!gc.is_scheduled("b"));
		assert_consistent(&gc);
	}

	#[test]
	fn removing_a_bean_drops_its_edges_and_cascades() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "b");
		bean(&mut gc, "a");
		gc.on_property_value_changed("a", "next", None, Some("b")).unwrap();
		gc.on_property_value_changed("r", "head", None, Some("a")).unwrap();

		gc.on_bean_removed("a").unwrap();
		assert!(!gc.is_registered("a"));
		assert!(gc.is_scheduled("b"));
		assert_consistent(&gc);
	}

	#[test]
	fn gc_hands_over_the_scheduled_set_and_clears_bookkeeping() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		bean(&mut gc, "b");
		bean(&mut gc, "a");
		gc.on_property_value_changed("a", "next", None, Some("b")).unwrap();

		let mut collected = Vec::new();
		let count = gc.gc(|set| collected = set.to_vec());
		assert_eq!(count, 2);
		assert_eq!(collected.len(), 2);
		assert!(collected.contains(&"a".to_owned()) && collected.contains(&"b".to_owned()));
		assert!(!gc.is_registered("a") && !gc.is_registered("b"));
		assert!(gc.is_registered("r"));
		assert_consistent(&gc);

		// Second flush has nothing to report.
		let count = gc.gc(|set| assert!(set.is_empty()));
		assert_eq!(count, 0);
	}

	#[test]
	fn duplicate_registration_and_unknown_targets_fail_cleanly() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r");
		assert!(matches!(
			gc.on_bean_created(BeanSnapshot::new("r"), false),
			Err(GcError::AlreadyRegistered { .. })
		));
		assert!(matches!(
			gc.on_bean_created(BeanSnapshot::new("x").reference_slot("slot", Some("ghost".to_owned())), false),
			Err(GcError::UnknownBean { .. })
		));
		assert!(!gc.is_registered("x"));
		assert!(matches!(
			gc.on_property_value_changed("r", "slot", None, Some("ghost")),
			Err(GcError::UnknownBean { .. })
		));
		assert_consistent(&gc);
	}

	#[test]
	fn incremental_result_matches_full_scan_over_an_edge_churn_sequence() {
		let mut gc = GarbageCollector::new();
		root(&mut gc, "r1");
		root(&mut gc, "r2");
		for id in ["a", "b", "c", "d", "e"] {
			bean(&mut gc, id);
		}
		let steps: Vec<Box<dyn Fn(&mut GarbageCollector)>> = vec![
			Box::new(|gc| gc.on_property_value_changed("r1", "s", None, Some("a")).unwrap()),
			Box::new(|gc| gc.on_property_value_changed("a", "s", None, Some("b")).unwrap()),
			Box::new(|gc| gc.on_added_to_list("b", "l", "c").unwrap()),
			Box::new(|gc| gc.on_added_to_list("r2", "l", "c").unwrap()),
			Box::new(|gc| gc.on_property_value_changed("c", "s", None, Some("d")).unwrap()),
			Box::new(|gc| gc.on_property_value_changed("r1", "s", Some("a"), None).unwrap()),
			Box::new(|gc| gc.on_removed_from_list("r2", "l", "c").unwrap()),
			Box::new(|gc| gc.on_property_value_changed("r2", "s", None, Some("e")).unwrap()),
			Box::new(|gc| gc.on_property_value_changed("e", "s", None, Some("d")).unwrap()),
			Box::new(|gc| gc.on_bean_removed("e").unwrap()),
		];
		for step in steps {
			step(&mut gc);
			assert_consistent(&gc);
		}
	}
}
