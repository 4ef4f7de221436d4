//! Bounds-consistency propagation for linear constraints.
//!
//! Both propagators share the same core algorithm over a queue of constraint
//! indices: pop a constraint, compute the 64-bit minimum and maximum of its
//! left-hand side, infer the truth of its reification literal or tighten the
//! bounds of its views, and re-queue every constraint watching a changed
//! bound. The [`linear::LinearPropagator`] runs before search and tightens
//! the real domains; the [`linear_lazy::LinearLiteralPropagator`] runs
//! during search on a per-thread bound storage and justifies every inference
//! with order literals.
//!
//! The constraint store only ever holds *implications* `lit → lhs ≤ rhs`:
//! the normalizer decomposes every relation and direction into this shape,
//! pairing each backward half with the negated literal of a mirrored
//! constraint. Within one thread propagation is confluent; the queue order
//! does not affect the fixpoint.

pub mod linear;
pub mod linear_lazy;

use index_vec::IndexVec;

use crate::{constraint::ReifiedLinearConstraint, storage::Variable};

#[derive(Debug, Default)]
/// Shared store of implication constraints, the propagation queue, and the
/// per-variable watch lists.
pub(crate) struct ConstraintStorage {
	/// The stored implications `lit → lhs ≤ rhs`.
	constraints: Vec<ReifiedLinearConstraint>,
	/// Indices of constraints awaiting re-examination.
	queue: Vec<usize>,
	/// Whether a constraint is currently enqueued.
	queued: Vec<bool>,
	/// Constraints to re-queue when a variable's lower bound rises.
	lb_watches: IndexVec<Variable, Vec<usize>>,
	/// Constraints to re-queue when a variable's upper bound drops.
	ub_watches: IndexVec<Variable, Vec<usize>>,
}

impl ConstraintStorage {
	/// Add an implication constraint and enqueue it.
	///
	/// The constraint must be normalized to the `≤` relation.
	pub(crate) fn add_imp(&mut self, rl: ReifiedLinearConstraint) {
		debug_assert!(rl.l.normalized());
		debug_assert_eq!(rl.l.relation(), crate::constraint::Relation::Le);
		let id = self.constraints.len();
		for view in rl.l.views() {
			self.grow_to(view.v);
			if view.a > 0 {
				self.lb_watches[view.v].push(id);
			} else {
				self.ub_watches[view.v].push(id);
			}
		}
		self.constraints.push(rl);
		self.queued.push(false);
		self.queue_constraint(id);
	}

	/// Whether the queue is drained.
	pub(crate) fn at_fixpoint(&self) -> bool {
		self.queue.is_empty()
	}

	/// The stored implications.
	pub(crate) fn constraints(&self) -> &[ReifiedLinearConstraint] {
		&self.constraints
	}

	/// Re-queue the watchers of a variable whose lower bound rose.
	pub(crate) fn notify_lower_changed(&mut self, v: Variable) {
		self.grow_to(v);
		for i in 0..self.lb_watches[v].len() {
			self.queue_constraint(self.lb_watches[v][i]);
		}
	}

	/// Re-queue the watchers of a variable whose upper bound dropped.
	pub(crate) fn notify_upper_changed(&mut self, v: Variable) {
		self.grow_to(v);
		for i in 0..self.ub_watches[v].len() {
			self.queue_constraint(self.ub_watches[v][i]);
		}
	}

	/// Pop the next constraint index to examine.
	pub(crate) fn pop_constraint(&mut self) -> Option<usize> {
		let id = self.queue.pop()?;
		self.queued[id] = false;
		Some(id)
	}

	/// Add a constraint index to the queue.
	pub(crate) fn queue_constraint(&mut self, id: usize) {
		if !self.queued[id] {
			self.queued[id] = true;
			self.queue.push(id);
		}
	}

	/// Move the stored implications out of the storage.
	pub(crate) fn remove_constraints(&mut self) -> Vec<ReifiedLinearConstraint> {
		self.queue.clear();
		self.queued.clear();
		self.lb_watches.iter_mut().for_each(Vec::clear);
		self.ub_watches.iter_mut().for_each(Vec::clear);
		std::mem::take(&mut self.constraints)
	}

	/// Ensure the watch lists cover the variable.
	fn grow_to(&mut self, v: Variable) {
		while self.lb_watches.len() <= v.index() {
			let _ = self.lb_watches.push(Vec::new());
			let _ = self.ub_watches.push(Vec::new());
		}
	}
}
