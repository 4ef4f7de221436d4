//! The adapter between the host's Boolean trail and the lazy integer
//! propagation, implementing the `init` / `propagate` / `check` / `undo`
//! contract.
//!
//! Newly assigned order literals are decoded through the shared meaning
//! table (and the per-thread volatile overlay) into bound tightenings on the
//! thread's variable storage; the lazy propagator is then driven to a local
//! fixpoint and its clauses are handed back for the host to assert. Every
//! call runs synchronously, and each decision level opened with
//! [`OrderPropagator::push_level`] is unwound by exactly one
//! [`OrderPropagator::undo`].

use std::collections::HashMap;

use tracing::trace;

use crate::{
	config::Config,
	constraint::ReifiedLinearConstraint,
	propagate::linear_lazy::LinearLiteralPropagator,
	solver::{Lit, SatEngine},
	storage::{Variable, VariableCreator},
	view::{View, ViewIterator},
	Clause, SumVal,
};

#[derive(Debug)]
/// Outcome of a final-assignment check.
pub enum CheckResult {
	/// Every variable is pinned and every constraint satisfied.
	Consistent,
	/// A variable is not pinned yet; the returned fresh literal splits its
	/// remaining range and must be decided by the host.
	Split(Lit),
	/// A constraint is violated; the clause is false under the current
	/// assignment.
	Conflict(Clause),
}

#[derive(Debug)]
/// Per-thread bridge between the host engine and the lazy propagator.
pub struct OrderPropagator<'a> {
	/// The shared, frozen variable state.
	vc: &'a VariableCreator,
	/// The thread's lazy propagator and bound storage.
	prop: LinearLiteralPropagator,
	/// Constraints to re-queue when a reification literal changes, keyed by
	/// Boolean variable.
	reif_watches: HashMap<u32, Vec<usize>>,
}

impl<'a> OrderPropagator<'a> {
	/// Create the bridge over the frozen state and the lazy remainder of
	/// the constraints.
	pub fn new(
		vc: &'a VariableCreator,
		config: Config,
		constraints: Vec<ReifiedLinearConstraint>,
	) -> Self {
		let mut prop = LinearLiteralPropagator::new(vc, config);
		let mut reif_watches: HashMap<u32, Vec<usize>> = HashMap::new();
		for (i, rl) in constraints.into_iter().enumerate() {
			reif_watches.entry(rl.v.var()).or_default().push(i);
			prop.add_imp(rl);
		}
		Self {
			vc,
			prop,
			reif_watches,
		}
	}

	/// The pinned value of a view under the current bounds.
	pub fn assignment(&self, view: View) -> SumVal {
		let x = self.prop.variable_storage().value(self.vc, view.v);
		view.multiply(x)
	}

	/// Whether a Boolean variable carries an order-literal meaning, shared
	/// or volatile.
	pub fn carries_meaning(&self, var: u32) -> bool {
		self.vc.meanings().contains_key(&var)
			|| self.prop.variable_storage().volatile_meaning(var).is_some()
	}

	/// Verify a full assignment: every variable pinned, every constraint
	/// satisfied.
	pub fn check<S: SatEngine>(&mut self, s: &mut S) -> CheckResult {
		for v in self.vc.variables() {
			if !self.prop.variable_storage().is_pinned(v) {
				let (lb, ub) = self.prop.variable_storage().positions(v);
				let mid = lb + (ub - lb) / 2;
				let it = ViewIterator::at(View::new(v), self.vc.domain(v), mid);
				let lit = self
					.prop
					.variable_storage_mut()
					.get_le_lit(s, self.vc, &it);
				trace!(var = v.index(), lit = %lit, "splitting unpinned variable");
				return CheckResult::Split(lit);
			}
		}
		for i in 0..self.prop.constraints().len() {
			self.prop.queue_constraint(i);
		}
		let clauses = self.prop.propagate(s, self.vc);
		for clause in clauses {
			if clause.iter().all(|l| s.is_false(*l)) {
				return CheckResult::Conflict(clause);
			}
		}
		CheckResult::Consistent
	}

	/// The values of the given views under a pinned assignment, for model
	/// output.
	pub fn extend_model(&self, shown: &[(View, String)]) -> Vec<(String, SumVal)> {
		shown
			.iter()
			.map(|(view, name)| (name.clone(), self.assignment(*view)))
			.collect()
	}

	/// React to a batch of newly assigned literals: tighten the bounds they
	/// encode and drive propagation to a fixpoint.
	///
	/// Returns the clauses to assert; an error carries the conflict clause
	/// for a bound collision.
	pub fn propagate<S: SatEngine>(
		&mut self,
		s: &mut S,
		changes: &[Lit],
	) -> Result<Vec<Clause>, Clause> {
		for &lit in changes {
			debug_assert!(s.is_true(lit));
			let mut meanings: Vec<(Variable, u64)> = self
				.vc
				.meanings()
				.get(&lit.var())
				.cloned()
				.unwrap_or_default();
			if let Some(m) = self.prop.variable_storage().volatile_meaning(lit.var()) {
				meanings.push(m);
			}
			for (v, pos) in meanings {
				self.apply_bound(s, lit, v, pos)?;
			}
			if let Some(watchers) = self.reif_watches.get(&lit.var()) {
				for &i in watchers {
					self.prop.queue_constraint(i);
				}
			}
		}
		Ok(self.prop.propagate(s, self.vc))
	}

	/// Open a new decision level.
	pub fn push_level(&mut self) {
		self.prop.add_level();
	}

	/// Unwind one decision level.
	pub fn undo(&mut self) {
		self.prop.remove_level();
	}

	/// The Boolean variables whose assignments the adapter must observe.
	pub fn watched_variables(&self) -> Vec<u32> {
		let mut vars: Vec<u32> = self.vc.meanings().keys().copied().collect();
		vars.extend(self.reif_watches.keys().copied());
		vars.sort_unstable();
		vars.dedup();
		vars
	}

	/// Tighten a variable bound from the trail literal carrying the meaning
	/// `v ≤ d_pos`.
	fn apply_bound<S: SatEngine>(
		&mut self,
		s: &mut S,
		lit: Lit,
		v: Variable,
		pos: u64,
	) -> Result<(), Clause> {
		let domain = self.vc.domain(v);
		let it = ViewIterator::at(View::new(v), domain, pos + 1);
		if !lit.is_negated() {
			// v ≤ d_pos: everything from pos + 1 upward is excluded.
			if self.prop.constrain_upper_bound(self.vc, &it).is_err() {
				let (lb, _) = self.prop.variable_storage().positions(v);
				let below = ViewIterator::at(View::new(v), domain, lb - 1);
				let witness = self
					.prop
					.variable_storage_mut()
					.get_le_lit(s, self.vc, &below);
				return Err(vec![!lit, witness]);
			}
		} else {
			// v > d_pos: everything below pos + 1 is excluded.
			if self.prop.constrain_lower_bound(self.vc, &it).is_err() {
				let (_, ub) = self.prop.variable_storage().positions(v);
				let at = ViewIterator::at(View::new(v), domain, ub);
				let witness = self
					.prop
					.variable_storage_mut()
					.get_le_lit(s, self.vc, &at);
				return Err(vec![!lit, !witness]);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		config::Config,
		constraint::{Direction, LinearConstraint, ReifiedLinearConstraint, Relation},
		domain::Domain,
		order_propagator::{CheckResult, OrderPropagator},
		solver::SatEngine,
		storage::VariableCreator,
		tests::TestEngine,
		view::{View, ViewIterator},
	};

	/// A fact `Σ views ≤ rhs`.
	fn fact(
		views: Vec<View>,
		rhs: i32,
		s: &TestEngine,
	) -> ReifiedLinearConstraint {
		let mut l = LinearConstraint::with_terms(views, Relation::Le, rhs);
		l.normalize();
		ReifiedLinearConstraint::new(l, s.true_lit(), Direction::Fwd)
	}

	#[test]
	fn test_trail_deltas_tighten_bounds() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let a = vc.create_variable(Domain::new(0, 9));
		let b = vc.create_variable(Domain::new(0, 9));
		let d = vc.domain(a).clone();
		// Materialize the order literal (a ≤ 4) so it can appear on the trail.
		let a_le4 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(a), &d, 4));

		// a + 2 <= b as a fact.
		let c = fact(vec![View::new(a), View::with(b, -1, 0)], -2, &s);
		let mut op = OrderPropagator::new(&vc, Config::lazy_solve(4), vec![c]);

		// a >= 5 pushes b >= 7, and b <= 9 bounds a by 7.
		op.push_level();
		s.assume(!a_le4);
		let clauses = op.propagate(&mut s, &[!a_le4]).unwrap();
		assert_eq!(op.prop.variable_storage().positions(a), (5, 7));
		assert_eq!(op.prop.variable_storage().positions(b), (7, 9));
		assert_eq!(clauses.len(), 2);

		op.undo();
		assert_eq!(op.prop.variable_storage().positions(b), (0, 9));
	}

	#[test]
	fn test_conflicting_bounds_return_nogood() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let a = vc.create_variable(Domain::new(0, 9));
		let d = vc.domain(a).clone();
		let a_le2 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(a), &d, 2));
		let a_le6 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(a), &d, 6));

		let mut op = OrderPropagator::new(&vc, Config::lazy_solve(4), Vec::new());
		op.push_level();
		s.assume(!a_le6);
		let _ = op.propagate(&mut s, &[!a_le6]).unwrap();
		// a ≤ 2 collides with a ≥ 7.
		s.assume(a_le2);
		let conflict = op.propagate(&mut s, &[a_le2]).unwrap_err();
		assert_eq!(conflict.len(), 2);
		assert!(conflict.iter().all(|l| s.is_false(*l)));
	}

	#[test]
	fn test_check_splits_then_verifies() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let a = vc.create_variable(Domain::new(0, 3));
		let d = vc.domain(a).clone();
		let mut op = OrderPropagator::new(&vc, Config::lazy_solve(4), Vec::new());

		// An unpinned variable asks for a split literal.
		let CheckResult::Split(split) = op.check(&mut s) else {
			panic!("expected a split literal");
		};
		assert!(s.is_unknown(split));

		// Pinning the variable passes the check.
		op.push_level();
		let le0 = op
			.prop
			.variable_storage_mut()
			.get_le_lit(&mut s, &vc, &ViewIterator::at(View::new(a), &d, 0));
		s.assume(le0);
		let _ = op.propagate(&mut s, &[le0]).unwrap();
		assert!(matches!(op.check(&mut s), CheckResult::Consistent));
		assert_eq!(
			op.extend_model(&[(View::with(a, 2, 1), "twice".to_owned())]),
			vec![("twice".to_owned(), 1)]
		);
	}

	#[test]
	fn test_check_rejects_violated_fact() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let a = vc.create_variable(Domain::new(0, 9));
		let d = vc.domain(a).clone();
		let a_le4 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(a), &d, 4));
		let a_le8 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(a), &d, 8));

		// A fact a <= 4, violated by pinning a to 9.
		let c = fact(vec![View::new(a)], 4, &s);
		let mut op = OrderPropagator::new(&vc, Config::lazy_solve(1), vec![c]);
		op.push_level();
		s.assume(!a_le8);
		let _ = op.propagate(&mut s, &[!a_le8]).unwrap();
		assert!(!s.is_true(a_le4));
		let CheckResult::Conflict(clause) = op.check(&mut s) else {
			panic!("expected a conflict");
		};
		assert!(clause.iter().all(|l| s.is_false(*l)));
	}
}
