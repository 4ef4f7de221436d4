//! Eager translation of constraints into clauses and cardinality
//! constraints over order and equality literals.
//!
//! The translator emits the order-encoding backbone (chain clauses between
//! consecutive thresholds and the equal-iff-between clauses), turns linear
//! implications whose estimated clause count is small enough into explicit
//! clauses, and encodes all-distinct and disjoint constraints through
//! per-value cardinality constraints.

use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::debug;

use crate::{
	config::Config,
	constraint::{
		LinearConstraint, ReifiedAllDistinct, ReifiedDisjoint, ReifiedDomainConstraint,
		ReifiedLinearConstraint,
	},
	solver::{Lit, SatEngine},
	storage::VariableCreator,
	view::{lower_bound, upper_bound},
	Clause, CoreError, IntVal, SumVal,
};

#[derive(Clone, Copy, Debug)]
/// Emits clauses and cardinality constraints for eagerly encoded
/// constraints.
pub struct Translator {
	/// The translation options in effect.
	config: Config,
}

impl Translator {
	/// Create a translator with the given options.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Emit the chain clauses `¬ℓ_i ∨ ℓ_j` between every pair of
	/// consecutive created order literals of every variable.
	pub fn create_order_clauses<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &VariableCreator,
	) -> Result<(), CoreError> {
		for v in vc.variables() {
			for ((_, l1), (_, l2)) in vc.order_literals(v).tuple_windows() {
				add(s, &[!l1, l2])?;
			}
		}
		Ok(())
	}

	/// Emit the clauses linking every created equality literal to the order
	/// literals surrounding it: `eq(v, d_p) ↔ (v ≤ d_p) ∧ ¬(v ≤ d_{p-1})`.
	pub fn create_equal_clauses<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
	) -> Result<(), CoreError> {
		for v in vc.variables() {
			let eq_lits: Vec<_> = vc.equal_literals(v).collect();
			for (p, e) in eq_lits {
				debug_assert!(p > 0);
				let below = vc.order_lit_at(s, v, p - 1);
				let at = vc.order_lit_at(s, v, p);
				add(s, &[!e, at])?;
				add(s, &[!e, !below])?;
				add(s, &[!at, below, e])?;
			}
		}
		Ok(())
	}

	/// The number of clauses a translation of the constraint would emit.
	pub fn estimated_clause_count(&self, vc: &VariableCreator, l: &LinearConstraint) -> u64 {
		if l.views().is_empty() {
			return 0;
		}
		let mut sorted = l.clone();
		sorted.sort_by_domain_size(vc);
		sorted.product_of_domains_except_last(vc)
	}

	/// Whether the constraint falls under the eager translation threshold.
	pub fn should_translate(&self, vc: &VariableCreator, l: &LinearConstraint) -> bool {
		if self.config.translate_constraints < 0 {
			return true;
		}
		self.estimated_clause_count(vc, l) <= self.config.translate_constraints as u64
	}

	/// Translate the implication `lit → lhs ≤ rhs` into clauses.
	///
	/// The emitted clauses enumerate the value choices of all views but the
	/// one with the largest domain; each choice induces an upper bound on
	/// the remaining view.
	pub fn translate_linear_implication<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		rl: &ReifiedLinearConstraint,
	) -> Result<(), CoreError> {
		debug_assert!(rl.l.normalized());
		let mut l = rl.l.clone();
		l.sort_by_domain_size(vc);
		debug!(constraint = %l, "translating linear implication");

		let mut prefix: Clause = Vec::new();
		if rl.v != s.true_lit() {
			prefix.push(!rl.v);
		}
		self.enumerate_clauses(s, vc, &l, 0, SumVal::from(l.rhs()), &mut prefix)
	}

	/// Translate a reified domain membership constraint.
	///
	/// The literal implies the disjunction of the in-domain equality
	/// literals; its negation implies each of their negations.
	pub fn translate_domain_constraint<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		rdc: &ReifiedDomainConstraint,
	) -> Result<(), CoreError> {
		let d = vc.domain(rdc.view.v).clone();
		let r = crate::view::Restrictor::new(rdc.view, &d);
		let mut member_eqs = Vec::new();
		let mut it = r.begin();
		while it != r.end() {
			let value = it.value();
			let in_domain = IntVal::try_from(value)
				.ok()
				.is_some_and(|x| rdc.domain.contains(x));
			if in_domain {
				member_eqs.push(vc.get_equal_literal(s, &it));
			}
			it.advance(1);
		}

		if rdc.direction.fwd() {
			let mut clause = vec![!rdc.v];
			clause.extend(member_eqs.iter().copied());
			add(s, &clause)?;
		}
		if rdc.direction.back() {
			for eq in member_eqs {
				add(s, &[rdc.v, !eq])?;
			}
		}
		Ok(())
	}

	/// Translate an all-distinct constraint into per-value cardinality
	/// constraints: at most one view takes each value, guarded by the
	/// constraint's literal.
	pub fn translate_distinct_cardinality<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		distinct: &ReifiedAllDistinct,
	) -> Result<(), CoreError> {
		let mut by_value: BTreeMap<SumVal, Vec<usize>> = BTreeMap::new();
		for (i, view) in distinct.views().iter().enumerate() {
			for value in vc.view_domain(*view).iter() {
				by_value.entry(value).or_default().push(i);
			}
		}
		for (value, holders) in by_value {
			if holders.len() < 2 {
				continue;
			}
			let mut wlits = Vec::with_capacity(holders.len());
			for i in holders {
				let view = distinct.views()[i];
				let d = vc.domain(view.v).clone();
				let r = crate::view::Restrictor::new(view, &d);
				let it = lower_bound(&r.begin(), &r.end(), value);
				debug_assert!(!it.at_end() && it.value() == value);
				wlits.push((vc.get_equal_literal(s, &it), 1));
			}
			if !s.add_cardinality(distinct.v, 1, &wlits) {
				return Err(CoreError::Unsatisfiable);
			}
		}
		Ok(())
	}

	/// Translate a disjoint constraint: for every value, at most one group
	/// occupies it, guarded by the constraint's literal.
	pub fn translate_disjoint<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		disjoint: &ReifiedDisjoint,
	) -> Result<(), CoreError> {
		let mut by_value: BTreeMap<SumVal, Vec<usize>> = BTreeMap::new();
		for (g, group) in disjoint.groups.iter().enumerate() {
			for view in group {
				for value in vc.view_domain(*view).iter() {
					let holders = by_value.entry(value).or_default();
					if holders.last() != Some(&g) {
						holders.push(g);
					}
				}
			}
		}
		for (value, groups) in by_value {
			if groups.len() < 2 {
				continue;
			}
			let mut wlits = Vec::with_capacity(groups.len());
			for g in groups {
				wlits.push((self.group_member_lit(s, vc, &disjoint.groups[g], value)?, 1));
			}
			if !s.add_cardinality(disjoint.v, 1, &wlits) {
				return Err(CoreError::Unsatisfiable);
			}
		}
		Ok(())
	}

	/// Recursively enumerate the value choices of all views but the last
	/// and emit the induced bound clause for each choice.
	fn enumerate_clauses<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		l: &LinearConstraint,
		j: usize,
		remaining: SumVal,
		prefix: &mut Clause,
	) -> Result<(), CoreError> {
		let views = l.views();
		if j + 1 == views.len() {
			// The last (largest-domain) view receives the induced bound.
			let d = vc.domain(views[j].v).clone();
			let r = crate::view::Restrictor::new(views[j], &d);
			if remaining >= r.upper() {
				// The bound is vacuous, the clause is satisfied.
				return Ok(());
			}
			if remaining < r.lower() {
				return add(s, prefix);
			}
			let mut it = upper_bound(&r.begin(), &r.end(), remaining);
			it.advance(-1);
			let bound_lit = vc.get_le_literal(s, &it);
			prefix.push(bound_lit);
			let res = add(s, prefix);
			let _ = prefix.pop();
			return res;
		}

		let d = vc.domain(views[j].v).clone();
		let r = crate::view::Restrictor::new(views[j], &d);
		let mut it = r.begin();
		while it != r.end() {
			let value = it.value();
			let pushed = if it.num_element() > 0 {
				let mut below = it.clone();
				below.advance(-1);
				prefix.push(vc.get_le_literal(s, &below));
				true
			} else {
				false
			};
			self.enumerate_clauses(s, vc, l, j + 1, remaining - value, prefix)?;
			if pushed {
				let _ = prefix.pop();
			}
			it.advance(1);
		}
		Ok(())
	}

	/// The literal meaning "some view of the group takes `value`".
	fn group_member_lit<S: SatEngine>(
		&self,
		s: &mut S,
		vc: &mut VariableCreator,
		group: &[crate::view::View],
		value: SumVal,
	) -> Result<Lit, CoreError> {
		let mut eqs = Vec::new();
		for view in group {
			let d = vc.domain(view.v).clone();
			let r = crate::view::Restrictor::new(*view, &d);
			let it = lower_bound(&r.begin(), &r.end(), value);
			if !it.at_end() && it.value() == value {
				eqs.push(vc.get_equal_literal(s, &it));
			}
		}
		match eqs.len() {
			0 => Ok(s.false_lit()),
			1 => Ok(eqs[0]),
			_ => {
				let m = s.new_literal(true);
				let mut definition = vec![!m];
				for eq in &eqs {
					add(s, &[!*eq, m])?;
					definition.push(*eq);
				}
				add(s, &definition)?;
				Ok(m)
			}
		}
	}
}

/// Assert a clause, mapping engine-side refutation to an error.
fn add<S: SatEngine>(s: &mut S, clause: &[Lit]) -> Result<(), CoreError> {
	if !s.add_clause(clause) {
		return Err(CoreError::Unsatisfiable);
	}
	Ok(())
}
