//! Equality processing: detection of `k·a = k'·b + c` chains among the
//! collected constraints, class merging, and substitution of class
//! representatives into the remaining constraints.
//!
//! Every class member `m` is related to its representative `top` by an edge
//! `first·m = second·top + constant` with `first > 0` and the three numbers
//! coprime. Substituting a member into a constraint scales the whole
//! constraint by `first` and rewrites the term over `top`; domains of the
//! two variables of a detected equality are made mutually consistent with
//! the domain arithmetic of [`crate::domain::Domain`].

use std::collections::HashMap;

use tracing::debug;

use crate::{
	constraint::{LinearConstraint, ReifiedLinearConstraint, Relation},
	helpers::gcd,
	solver::SatEngine,
	storage::{Variable, VariableCreator},
	view::View,
	CoreError, Config, IntVal, SumVal,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The affine relation `first·member = second·top + constant`.
pub struct Edge {
	/// Coefficient of the member variable, always positive.
	pub first: SumVal,
	/// Coefficient of the representative.
	pub second: SumVal,
	/// Additive constant.
	pub constant: SumVal,
}

#[derive(Debug, Default)]
/// Union of equality classes over the collected variables.
pub struct EqualityProcessor {
	/// Maps each non-representative member to its representative and edge.
	rep: HashMap<Variable, (Variable, Edge)>,
	/// Members of each representative's class, excluding the representative.
	members: HashMap<Variable, Vec<Variable>>,
}

impl Edge {
	/// Normalize the edge: positive `first`, coprime components.
	fn normalized(mut self) -> Self {
		let g = gcd(gcd(self.first, self.second), self.constant).max(1);
		self.first /= g;
		self.second /= g;
		self.constant /= g;
		if self.first < 0 {
			self.first = -self.first;
			self.second = -self.second;
			self.constant = -self.constant;
		}
		self
	}
}

impl EqualityProcessor {
	/// Create an empty processor.
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether the variable has been replaced by a representative.
	pub fn is_replaced(&self, v: Variable) -> bool {
		self.rep.contains_key(&v)
	}

	/// The representative and edge of a variable, if it was replaced.
	pub fn representative(&self, v: Variable) -> Option<(Variable, Edge)> {
		self.rep.get(&v).copied()
	}

	/// Scan the collected constraints for two-variable equalities holding
	/// as facts, merge their classes, and substitute representatives into
	/// every remaining constraint. Consumed equalities are removed.
	pub fn process<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &mut VariableCreator,
		config: &Config,
		constraints: &mut Vec<ReifiedLinearConstraint>,
	) -> Result<(), CoreError> {
		let mut kept = Vec::with_capacity(constraints.len());
		for rl in constraints.drain(..) {
			debug_assert!(rl.l.normalized());
			let is_equality = rl.l.relation() == Relation::Eq
				&& rl.l.views().len() == 2
				&& s.is_true(rl.v)
				&& rl.direction.fwd();
			if is_equality {
				self.add_equality(vc, config, &rl.l)?;
			} else {
				kept.push(rl);
			}
		}
		for rl in &mut kept {
			self.substitute(&mut rl.l)?;
			rl.l.normalize();
		}
		*constraints = kept;
		Ok(())
	}

	/// Record the equality `a1·x + a2·y = rhs` between two variables.
	pub fn add_equality(
		&mut self,
		vc: &mut VariableCreator,
		config: &Config,
		l: &LinearConstraint,
	) -> Result<(), CoreError> {
		debug_assert_eq!(l.views().len(), 2);
		let (x, y) = (l.views()[0], l.views()[1]);
		debug_assert!(x.c == 0 && y.c == 0);
		let (k1, k2) = (SumVal::from(x.a), SumVal::from(y.a));
		let rhs = SumVal::from(l.rhs());

		// Resolve both sides to their current representatives:
		// fa·x = sa·ta + ca and fb·y = sb·tb + cb.
		let (ta, ea) = self.resolve(x.v);
		let (tb, eb) = self.resolve(y.v);

		if ta == tb {
			// A cycle: combining both paths leaves at most one value for
			// the shared representative.
			let coeff = k1 * eb.first * ea.second + k2 * ea.first * eb.second;
			let constant = rhs * ea.first * eb.first
				- k1 * eb.first * ea.constant
				- k2 * ea.first * eb.constant;
			if coeff == 0 {
				if constant == 0 {
					return Ok(());
				}
				return Err(CoreError::Unsatisfiable);
			}
			if constant % coeff != 0 {
				return Err(CoreError::Unsatisfiable);
			}
			let value = constant / coeff;
			if value < SumVal::from(IntVal::MIN) || value > SumVal::from(IntVal::MAX) {
				return Err(CoreError::Unsatisfiable);
			}
			debug!(top = ta.index(), value, "equality cycle pins representative");
			vc.domain_mut(ta)
				.intersect_bounds(value as IntVal, value as IntVal)
				.map_err(|_| CoreError::Unsatisfiable)?;
			return Ok(());
		}

		// Derive tb in terms of ta:
		// (k2·fa·sb)·tb = (-k1·fb·sa)·ta + (rhs·fa·fb - k1·fb·ca - k2·fa·cb).
		let edge = Edge {
			first: k2 * ea.first * eb.second,
			second: -k1 * eb.first * ea.second,
			constant: rhs * ea.first * eb.first
				- k1 * eb.first * ea.constant
				- k2 * ea.first * eb.constant,
		}
		.normalized();
		check_edge(&edge)?;
		debug!(
			member = tb.index(),
			top = ta.index(),
			?edge,
			"merging equality classes"
		);

		// Make the domains of the two representatives mutually consistent:
		// tb = (second·ta + constant) / first and the reverse direction.
		let mut ta_dom = vc.domain(ta).clone();
		ta_dom.times(edge.second as IntVal, config.dom_size);
		ta_dom.shift(edge.constant as IntVal);
		let _ = ta_dom.divide(edge.first as IntVal);
		if ta_dom.overflow() {
			return Err(CoreError::VariableOutOfRange);
		}
		vc.domain_mut(tb)
			.intersect(&ta_dom)
			.map_err(|_| CoreError::Unsatisfiable)?;
		let mut tb_dom = vc.domain(tb).clone();
		tb_dom.times(edge.first as IntVal, config.dom_size);
		tb_dom.shift(-edge.constant as IntVal);
		let _ = tb_dom.divide(edge.second as IntVal);
		if tb_dom.overflow() {
			return Err(CoreError::VariableOutOfRange);
		}
		vc.domain_mut(ta)
			.intersect(&tb_dom)
			.map_err(|_| CoreError::Unsatisfiable)?;

		// Move tb's class under ta.
		let moved = self.members.remove(&tb).unwrap_or_default();
		for m in moved {
			let (_, em) = self.rep[&m];
			// fm·m = sm·tb + cm and first·tb = second·ta + constant.
			let new = Edge {
				first: em.first * edge.first,
				second: em.second * edge.second,
				constant: em.second * edge.constant + em.constant * edge.first,
			}
			.normalized();
			check_edge(&new)?;
			let _ = self.rep.insert(m, (ta, new));
			self.members.entry(ta).or_default().push(m);
		}
		let _ = self.rep.insert(tb, (ta, edge));
		self.members.entry(ta).or_default().push(tb);
		Ok(())
	}

	/// Rewrite every replaced variable in the constraint to its
	/// representative, scaling the constraint as needed.
	pub fn substitute(&self, l: &mut LinearConstraint) -> Result<(), CoreError> {
		for i in 0..l.views().len() {
			let view = l.views()[i];
			let Some((top, edge)) = self.representative(view.v) else {
				continue;
			};
			// first·v = second·top + constant: scale the constraint by
			// `first`, then rewrite this term.
			if edge.first != 1 {
				let factor = checked_val(edge.first)?;
				l.times(factor);
			}
			let view = l.views()[i];
			let a = SumVal::from(view.a) / edge.first;
			let new = View::with(
				top,
				checked_val(a * edge.second)?,
				checked_val(SumVal::from(view.c) + a * edge.constant)?,
			);
			l.views_mut()[i] = new;
		}
		Ok(())
	}

	/// Substitute a single view, scaling only the view itself.
	///
	/// Only permitted when the member's edge has `first == 1` (always true
	/// after domains were made consistent for identity-coefficient chains);
	/// other views must go through [`Self::substitute`].
	pub fn substitute_view(&self, view: View) -> Result<View, View> {
		match self.representative(view.v) {
			Some((top, edge)) if edge.first == 1 => {
				let a = SumVal::from(view.a);
				Ok(View::with(
					top,
					(a * edge.second) as IntVal,
					(SumVal::from(view.c) + a * edge.constant) as IntVal,
				))
			}
			Some(_) => Err(view),
			None => Ok(view),
		}
	}
}

/// Reject edges whose coefficients left the representable range.
fn check_edge(edge: &Edge) -> Result<(), CoreError> {
	let limit = SumVal::from(IntVal::MAX);
	if edge.first.abs() > limit || edge.second.abs() > limit || edge.constant.abs() > limit {
		return Err(CoreError::VariableOutOfRange);
	}
	Ok(())
}

/// Narrow a 64-bit intermediate back to a value coefficient.
fn checked_val(v: SumVal) -> Result<IntVal, CoreError> {
	IntVal::try_from(v).map_err(|_| CoreError::VariableOutOfRange)
}

impl EqualityProcessor {
	/// The representative and accumulated edge of a variable; identity when
	/// the variable is its own representative.
	fn resolve(&self, v: Variable) -> (Variable, Edge) {
		match self.rep.get(&v) {
			Some((top, edge)) => (*top, *edge),
			None => (
				v,
				Edge {
					first: 1,
					second: 1,
					constant: 0,
				},
			),
		}
	}
}
