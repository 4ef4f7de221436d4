//! The lazy linear propagator driven during search, one instance per search
//! thread.
//!
//! The propagator mirrors the eager algorithm but runs over a
//! [`VolatileVariableStorage`] that follows the Boolean trail, and justifies
//! every inference with a clause over order literals: the reasons witness
//! the current minimum of every other view of the constraint, plus the
//! constraint's reification literal. Inferred clauses are handed back to the
//! adapter, which forwards them to the host; a clause whose literals are all
//! false is the conflict for the current state.

use tracing::trace;

use crate::{
	config::Config,
	constraint::ReifiedLinearConstraint,
	propagate::ConstraintStorage,
	solver::SatEngine,
	storage::{VariableCreator, VolatileVariableStorage},
	view::{upper_bound, ViewIterator},
	Clause, EmptyDomain, SumVal,
};

#[derive(Debug)]
/// Propagates linear implications along the Boolean trail, producing
/// nogoods over order literals.
pub struct LinearLiteralPropagator {
	/// The implication store and propagation queue.
	storage: ConstraintStorage,
	/// The per-thread bound storage.
	vs: VolatileVariableStorage,
	/// Propagation strength and clause options.
	config: Config,
}

impl LinearLiteralPropagator {
	/// Create a propagator over the creator's domains.
	pub fn new(vc: &VariableCreator, config: Config) -> Self {
		Self {
			storage: ConstraintStorage::default(),
			vs: VolatileVariableStorage::new(vc),
			config,
		}
	}

	/// Add an implication constraint `lit → lhs ≤ rhs`.
	pub fn add_imp(&mut self, rl: ReifiedLinearConstraint) {
		self.storage.add_imp(rl);
	}

	/// Open a new decision level.
	pub fn add_level(&mut self) {
		self.vs.add_level();
	}

	/// Whether the queue is drained.
	pub fn at_fixpoint(&self) -> bool {
		self.storage.at_fixpoint()
	}

	/// Narrow a view's upper bound from a trail literal; the iterator points
	/// at the first excluded element. Watching constraints are re-queued.
	pub fn constrain_upper_bound(
		&mut self,
		vc: &VariableCreator,
		it: &ViewIterator<'_>,
	) -> Result<(), EmptyDomain> {
		self.vs.constrain_upper_bound(vc, it)?;
		let view = it.view();
		if view.a > 0 {
			self.storage.notify_upper_changed(view.v);
		} else {
			self.storage.notify_lower_changed(view.v);
		}
		Ok(())
	}

	/// Narrow a view's lower bound from a trail literal; the iterator points
	/// at the first allowed element. Watching constraints are re-queued.
	pub fn constrain_lower_bound(
		&mut self,
		vc: &VariableCreator,
		it: &ViewIterator<'_>,
	) -> Result<(), EmptyDomain> {
		self.vs.constrain_lower_bound(vc, it)?;
		let view = it.view();
		if view.a > 0 {
			self.storage.notify_lower_changed(view.v);
		} else {
			self.storage.notify_upper_changed(view.v);
		}
		Ok(())
	}

	/// The stored implications.
	pub fn constraints(&self) -> &[ReifiedLinearConstraint] {
		self.storage.constraints()
	}

	/// Propagate all queued constraints to a fixpoint, collecting the
	/// clauses that justify the inferences.
	pub fn propagate<S: SatEngine>(&mut self, s: &mut S, vc: &VariableCreator) -> Vec<Clause> {
		let mut clauses = Vec::new();
		while !self.at_fixpoint() {
			clauses.extend(self.propagate_single_step(s, vc));
		}
		clauses
	}

	/// Examine one queued constraint and return the clauses it infers.
	#[tracing::instrument(level = "trace", skip(self, s, vc))]
	pub fn propagate_single_step<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
	) -> Vec<Clause> {
		let Some(id) = self.storage.pop_constraint() else {
			return Vec::new();
		};
		let rl = self.storage.constraints()[id].clone();
		if s.is_false(rl.v) {
			return Vec::new();
		}
		let rhs = SumVal::from(rl.l.rhs());

		let mut min = 0;
		for view in rl.l.views() {
			let r = self.vs.current_restrictor(vc, *view);
			min += r.lower();
		}
		if self.config.prop_strength >= 3 {
			// Look-ahead: skip constraints that cannot become false.
			let max: SumVal = rl
				.l
				.views()
				.iter()
				.map(|view| self.vs.current_restrictor(vc, *view).upper())
				.sum();
			if max <= rhs {
				return Vec::new();
			}
		}

		if min > rhs {
			trace!(constraint = %rl.l, "violated under current bounds");
			return vec![self.reason_base(s, vc, &rl, None)];
		}
		if self.config.prop_strength < 2 || !s.is_true(rl.v) {
			return Vec::new();
		}
		self.propagate_true(s, vc, &rl, min, rhs)
	}

	/// Close the top decision level, restoring the bounds it changed.
	pub fn remove_level(&mut self) {
		self.vs.remove_level();
	}

	/// Add a constraint index to the propagation queue.
	pub fn queue_constraint(&mut self, id: usize) {
		self.storage.queue_constraint(id);
	}

	/// The per-thread bound storage.
	pub fn variable_storage(&self) -> &VolatileVariableStorage {
		&self.vs
	}

	/// Mutable access to the per-thread bound storage.
	pub fn variable_storage_mut(&mut self) -> &mut VolatileVariableStorage {
		&mut self.vs
	}

	/// Tighten the views of a constraint whose literal is true on the trail.
	fn propagate_true<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
		rl: &ReifiedLinearConstraint,
		min: SumVal,
		rhs: SumVal,
	) -> Vec<Clause> {
		let mut clauses = Vec::new();
		for (j, view) in rl.l.views().iter().enumerate() {
			let r = self.vs.current_restrictor(vc, *view);
			let term_min = r.lower();
			// Admissible maximum of this term given the minima of the rest.
			let bound = rhs - (min - term_min);
			let it = upper_bound(&r.begin(), &r.end(), bound);
			if it == r.end() {
				continue;
			}
			let mut below = it.clone();
			below.advance(-1);
			let propagated = self.vs.get_le_lit(s, vc, &below);

			if !s.is_true(propagated) {
				let mut clause = self.reason_base(s, vc, rl, Some(j));
				clause.push(propagated);
				trace!(constraint = %rl.l, lit = %propagated, "tightening upper bound");
				clauses.push(clause);
			}
			let res = self.constrain_upper_bound(vc, &it);
			debug_assert!(res.is_ok(), "tightening stays above the lower bound");
		}
		clauses
	}

	/// The clause prefix refuting the current state of a constraint: the
	/// negated reification literal plus, for every view except `skip`, the
	/// literal placing the view below its current lower bound.
	fn reason_base<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
		rl: &ReifiedLinearConstraint,
		skip: Option<usize>,
	) -> Clause {
		let mut clause = Vec::with_capacity(rl.l.views().len() + 2);
		if rl.v != s.true_lit() {
			clause.push(!rl.v);
		}
		for (k, view) in rl.l.views().iter().enumerate() {
			if skip == Some(k) {
				continue;
			}
			let r = self.vs.current_restrictor(vc, *view);
			let begin = r.begin();
			if begin.num_element() == 0 {
				// The view is at its original lower bound, the witness is
				// trivially true and its negation is dropped.
				continue;
			}
			let mut below = begin;
			below.advance(-1);
			clause.push(self.vs.get_le_lit(s, vc, &below));
		}
		clause
	}
}
