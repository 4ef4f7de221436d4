//! The eager linear propagator used during normalization, before search.
//!
//! Bound tightenings land in a [`VariableStorage`] layered over the shared
//! creator; finalization later asserts the surviving initial bounds as unit
//! clauses on order literals. Refuted reification literals are asserted
//! directly as unit clauses on the host engine.

use tracing::trace;

use crate::{
	constraint::ReifiedLinearConstraint,
	propagate::ConstraintStorage,
	solver::{SatEngine, TruthValue},
	storage::{VariableCreator, VariableStorage},
	view::upper_bound,
	CoreError, SumVal,
};

#[derive(Debug, Default)]
/// Propagates linear implications to a fixpoint over the pre-search bounds.
pub struct LinearPropagator {
	/// The implication store and propagation queue.
	storage: ConstraintStorage,
	/// The pre-search bounds.
	vs: VariableStorage,
	/// Whether the last `propagate` call asserted any literal.
	propagated: bool,
}

impl LinearPropagator {
	/// Create a propagator over the creator's current domains.
	pub fn new(vc: &VariableCreator) -> Self {
		Self {
			storage: ConstraintStorage::default(),
			vs: VariableStorage::new(vc),
			propagated: false,
		}
	}

	/// Add an implication constraint `lit → lhs ≤ rhs`.
	pub fn add_imp(&mut self, rl: ReifiedLinearConstraint) {
		self.storage.add_imp(rl);
	}

	/// Whether the queue is drained.
	pub fn at_fixpoint(&self) -> bool {
		self.storage.at_fixpoint()
	}

	/// The stored implications.
	pub fn constraints(&self) -> &[ReifiedLinearConstraint] {
		self.storage.constraints()
	}

	/// Whether the last `propagate` call asserted any literal.
	pub fn propagated(&self) -> bool {
		self.propagated
	}

	/// Propagate all queued constraints to a fixpoint.
	///
	/// Fails when a domain becomes empty under a true reification literal or
	/// the engine refutes an asserted unit clause.
	pub fn propagate<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
	) -> Result<(), CoreError> {
		self.propagated = false;
		self.vs.grow_to(vc);
		while let Some(id) = self.storage.pop_constraint() {
			self.propagate_step(s, vc, id)?;
		}
		Ok(())
	}

	/// Move the stored implications out of the propagator.
	pub fn remove_constraints(&mut self) -> Vec<ReifiedLinearConstraint> {
		self.storage.remove_constraints()
	}

	/// The pre-search bounds accumulated so far.
	pub fn variable_storage(&self) -> &VariableStorage {
		&self.vs
	}

	/// Examine a single constraint.
	fn propagate_step<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
		id: usize,
	) -> Result<(), CoreError> {
		let rl = self.storage.constraints()[id].clone();
		if let TruthValue::False = s.truth_value(rl.v) {
			return Ok(());
		}
		let rhs = SumVal::from(rl.l.rhs());
		let mut min = 0;
		let mut max = 0;
		for view in rl.l.views() {
			let r = self.vs.current_restrictor(vc, *view);
			min += r.lower();
			max += r.upper();
		}
		if max <= rhs {
			// Entailed; the implication cannot force anything further.
			return Ok(());
		}
		if min > rhs {
			trace!(constraint = %rl.l, "refuted, asserting negated literal");
			self.propagated = true;
			if !s.add_clause(&[!rl.v]) {
				return Err(CoreError::Unsatisfiable);
			}
			return Ok(());
		}
		if let TruthValue::True = s.truth_value(rl.v) {
			self.propagate_true(vc, &rl, min, rhs)?;
		}
		Ok(())
	}

	/// Tighten the views of a constraint known to hold.
	fn propagate_true(
		&mut self,
		vc: &VariableCreator,
		rl: &ReifiedLinearConstraint,
		min: SumVal,
		rhs: SumVal,
	) -> Result<(), CoreError> {
		for view in rl.l.views() {
			let r = self.vs.current_restrictor(vc, *view);
			let term_min = r.lower();
			// Admissible maximum of this term given the minima of the rest.
			let bound = rhs - (min - term_min);
			let it = upper_bound(&r.begin(), &r.end(), bound);
			if it == r.end() {
				continue;
			}
			if self.vs.constrain_upper_bound(vc, &it).is_err() {
				return Err(CoreError::Unsatisfiable);
			}
			if view.a > 0 {
				self.storage.notify_upper_changed(view.v);
			} else {
				self.storage.notify_lower_changed(view.v);
			}
		}
		Ok(())
	}
}
