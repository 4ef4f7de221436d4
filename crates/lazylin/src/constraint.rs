//! Linear constraints over affine views, and their reified variants.
//!
//! A [`LinearConstraint`] is a sum of views compared against an integer
//! right-hand side. Normalization merges like terms, folds view offsets into
//! the right-hand side, divides by the gcd of the coefficients (flooring the
//! right-hand side for the `≤` family), and canonicalizes the relation so
//! that propagation only ever deals with `≤` and `=`/`≠`.

use std::fmt;

use itertools::Itertools;

use crate::{
	domain::Domain,
	helpers::{div_floor, gcd},
	solver::Lit,
	storage::VariableCreator,
	view::View,
	IntVal, SumVal,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Comparison relation of a linear constraint.
pub enum Relation {
	/// Strictly less than.
	Lt,
	/// Less than or equal.
	Le,
	/// Strictly greater than.
	Gt,
	/// Greater than or equal.
	Ge,
	/// Equal.
	Eq,
	/// Not equal.
	Ne,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Which implications hold between a reification literal and its constraint.
pub enum Direction {
	/// The literal implies the constraint.
	Fwd,
	/// The constraint implies the literal.
	Back,
	/// The literal is equivalent to the constraint.
	Eq,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// A linear constraint `Σ aⱼ·vⱼ + cⱼ  rel  rhs`.
pub struct LinearConstraint {
	/// The affine terms of the left-hand side.
	views: Vec<View>,
	/// The right-hand side constant.
	rhs: IntVal,
	/// The comparison relation.
	relation: Relation,
	/// Whether the constraint is in normal form.
	normalized: bool,
}

#[derive(Clone, Debug)]
/// A linear constraint paired with a reification literal.
pub struct ReifiedLinearConstraint {
	/// The linear constraint.
	pub l: LinearConstraint,
	/// The reification literal.
	pub v: Lit,
	/// The implication direction between literal and constraint.
	pub direction: Direction,
}

#[derive(Clone, Debug)]
/// A literal tied to membership of a view's value in a domain.
pub struct ReifiedDomainConstraint {
	/// The constrained view.
	pub view: View,
	/// The member values.
	pub domain: Domain,
	/// The reification literal.
	pub v: Lit,
	/// The implication direction between literal and membership.
	pub direction: Direction,
}

#[derive(Clone, Debug)]
/// A literal tied to pairwise distinctness of a set of views.
pub struct ReifiedAllDistinct {
	/// The views that must take pairwise different values.
	views: Vec<View>,
	/// The reification literal.
	pub v: Lit,
	/// The implication direction between literal and distinctness.
	pub direction: Direction,
}

#[derive(Clone, Debug)]
/// A literal tied to the value sets of view groups being pairwise disjoint.
pub struct ReifiedDisjoint {
	/// The groups whose occupied values must not intersect.
	pub groups: Vec<Vec<View>>,
	/// The reification literal.
	pub v: Lit,
	/// The implication direction between literal and disjointness.
	pub direction: Direction,
}

impl Relation {
	/// The relation holding when this one does not.
	pub fn negated(self) -> Relation {
		match self {
			Relation::Lt => Relation::Ge,
			Relation::Le => Relation::Gt,
			Relation::Gt => Relation::Le,
			Relation::Ge => Relation::Lt,
			Relation::Eq => Relation::Ne,
			Relation::Ne => Relation::Eq,
		}
	}

	/// The relation holding after both sides are multiplied by -1.
	pub fn mirrored(self) -> Relation {
		match self {
			Relation::Lt => Relation::Gt,
			Relation::Le => Relation::Ge,
			Relation::Gt => Relation::Lt,
			Relation::Ge => Relation::Le,
			Relation::Eq => Relation::Eq,
			Relation::Ne => Relation::Ne,
		}
	}
}

impl Direction {
	/// Whether the literal-implies-constraint half holds.
	pub fn fwd(self) -> bool {
		matches!(self, Direction::Fwd | Direction::Eq)
	}

	/// Whether the constraint-implies-literal half holds.
	pub fn back(self) -> bool {
		matches!(self, Direction::Back | Direction::Eq)
	}

	/// Swap the two implication halves.
	pub fn flipped(self) -> Direction {
		match self {
			Direction::Fwd => Direction::Back,
			Direction::Back => Direction::Fwd,
			Direction::Eq => Direction::Eq,
		}
	}

	/// Combine two directions; both sets of implications hold.
	pub fn union(self, other: Direction) -> Direction {
		if self == other {
			self
		} else {
			Direction::Eq
		}
	}
}

impl LinearConstraint {
	/// Create an empty constraint with the given relation.
	pub fn new(relation: Relation) -> Self {
		Self {
			views: Vec::new(),
			rhs: 0,
			relation,
			normalized: false,
		}
	}

	/// Create a constraint from its parts.
	pub fn with_terms(views: Vec<View>, relation: Relation, rhs: IntVal) -> Self {
		Self {
			views,
			rhs,
			relation,
			normalized: false,
		}
	}

	/// Append a term to the left-hand side.
	pub fn add_term(&mut self, v: View) {
		self.views.push(v);
		self.normalized = false;
	}

	/// Add a constant to the right-hand side.
	pub fn add_rhs(&mut self, c: IntVal) {
		self.rhs += c;
		self.normalized = false;
	}

	/// Divide the coefficients and the right-hand side by their gcd.
	///
	/// All views must carry a zero offset. Returns the divisor.
	pub fn factorize(&mut self) -> IntVal {
		debug_assert!(self.views.iter().all(|v| v.c == 0));
		let mut g = SumVal::from(self.rhs);
		for v in &self.views {
			g = gcd(g, SumVal::from(v.a));
		}
		if g > 1 {
			for v in &mut self.views {
				v.a /= g as IntVal;
			}
			self.rhs /= g as IntVal;
		}
		g.max(1) as IntVal
	}

	/// Multiply both sides by -1, mirroring the relation.
	pub fn invert(&mut self) {
		for v in &mut self.views {
			*v = -*v;
		}
		self.rhs = -self.rhs;
		self.relation = self.relation.mirrored();
		self.normalized = false;
	}

	/// Bring the constraint into normal form: like terms merged, offsets
	/// folded into the right-hand side, zero coefficients dropped, the
	/// relation canonicalized to `≤` (or `=`/`≠`), and the gcd of the
	/// coefficients divided out.
	pub fn normalize(&mut self) {
		if self.normalized {
			return;
		}
		// Fold offsets into the right-hand side and merge like terms.
		let mut rhs = SumVal::from(self.rhs);
		for v in &mut self.views {
			rhs -= SumVal::from(v.c);
			v.c = 0;
		}
		self.views.sort_unstable_by_key(|v| v.v);
		let mut merged: Vec<View> = Vec::with_capacity(self.views.len());
		for (v, chunk) in &self.views.iter().chunk_by(|view| view.v) {
			let a: SumVal = chunk.map(|view| SumVal::from(view.a)).sum();
			if a != 0 {
				merged.push(View::with(v, a as IntVal, 0));
			}
		}
		self.views = merged;

		// Canonicalize the relation.
		match self.relation {
			Relation::Lt => {
				rhs -= 1;
				self.relation = Relation::Le;
			}
			Relation::Gt => {
				rhs += 1;
				self.relation = Relation::Ge;
			}
			_ => {}
		}
		if self.relation == Relation::Ge {
			for v in &mut self.views {
				*v = -*v;
			}
			rhs = -rhs;
			self.relation = Relation::Le;
		}

		// Divide out the gcd of the coefficients.
		let mut g = 0;
		for v in &self.views {
			g = gcd(g, SumVal::from(v.a));
		}
		if g > 1 {
			match self.relation {
				Relation::Le => {
					for v in &mut self.views {
						v.a /= g as IntVal;
					}
					rhs = div_floor(rhs, g);
				}
				Relation::Eq | Relation::Ne if rhs % g == 0 => {
					for v in &mut self.views {
						v.a /= g as IntVal;
					}
					rhs /= g;
				}
				_ => {}
			}
		}
		self.rhs = rhs.clamp(SumVal::from(IntVal::MIN), SumVal::from(IntVal::MAX)) as IntVal;
		self.normalized = true;
	}

	/// Whether the constraint is in normal form.
	pub fn normalized(&self) -> bool {
		self.normalized
	}

	/// The product of the domain sizes of all views but the last.
	///
	/// The constraint must be sorted and non-empty.
	pub fn product_of_domains_except_last(&self, vc: &VariableCreator) -> u64 {
		debug_assert!(!self.views.is_empty());
		self.views[..self.views.len() - 1]
			.iter()
			.fold(1u64, |acc, v| acc.saturating_mul(vc.domain_size(*v)))
	}

	/// Whether the product of the domain sizes of all views but the last is
	/// at most `x`; `x < 0` means unbounded.
	pub fn product_of_domains_except_last_le(&self, vc: &VariableCreator, x: i64) -> bool {
		if x < 0 {
			return true;
		}
		let mut product: u64 = 1;
		for v in &self.views[..self.views.len() - 1] {
			product = product.saturating_mul(vc.domain_size(*v));
			if product > x as u64 {
				return false;
			}
		}
		true
	}

	/// The comparison relation.
	pub fn relation(&self) -> Relation {
		self.relation
	}

	/// Replace the negation of the relation, keeping both sides.
	pub fn reverse(&mut self) {
		self.relation = self.relation.negated();
		self.normalized = false;
	}

	/// The right-hand side constant.
	pub fn rhs(&self) -> IntVal {
		self.rhs
	}

	/// Set the comparison relation.
	pub fn set_relation(&mut self, r: Relation) {
		self.relation = r;
		self.normalized = false;
	}

	/// Sort the terms by increasing domain size, ties by decreasing absolute
	/// coefficient.
	///
	/// The constraint must be normalized.
	pub fn sort_by_domain_size(&mut self, vc: &VariableCreator) {
		debug_assert!(self.normalized);
		self.views.sort_by(|x, y| {
			let a = vc.domain_size(*x);
			let b = vc.domain_size(*y);
			a.cmp(&b).then(y.a.abs().cmp(&x.a.abs()))
		});
	}

	/// Multiply both sides by a positive factor.
	pub fn times(&mut self, x: IntVal) {
		debug_assert!(x > 0);
		for v in &mut self.views {
			*v = *v * x;
		}
		self.rhs *= x;
		self.normalized = false;
	}

	/// The terms of the left-hand side.
	pub fn views(&self) -> &[View] {
		&self.views
	}

	/// Mutable access to the terms, dropping the normal form.
	pub fn views_mut(&mut self) -> &mut Vec<View> {
		self.normalized = false;
		&mut self.views
	}
}

impl fmt::Display for LinearConstraint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, v) in self.views.iter().enumerate() {
			if i > 0 {
				write!(f, " + ")?;
			}
			write!(f, "{}*v{}", v.a, usize::from(v.v))?;
			if v.c != 0 {
				write!(f, "+{}", v.c)?;
			}
		}
		let rel = match self.relation {
			Relation::Lt => "<",
			Relation::Le => "<=",
			Relation::Gt => ">",
			Relation::Ge => ">=",
			Relation::Eq => "==",
			Relation::Ne => "!=",
		};
		write!(f, " {rel} {}", self.rhs)
	}
}

impl ReifiedLinearConstraint {
	/// Create a reified constraint.
	pub fn new(l: LinearConstraint, v: Lit, direction: Direction) -> Self {
		Self { l, v, direction }
	}

	/// Normalize the underlying constraint. A `≠` relation is replaced by
	/// `=` on the negated literal with the implication halves swapped.
	pub fn normalize(&mut self) {
		if self.l.relation() == Relation::Ne {
			self.v = !self.v;
			self.l.set_relation(Relation::Eq);
			self.direction = self.direction.flipped();
		}
		self.l.normalize();
	}
}

impl ReifiedAllDistinct {
	/// Create an all-distinct constraint; duplicate views are dropped.
	pub fn new(mut views: Vec<View>, v: Lit, direction: Direction) -> Self {
		views.sort_unstable();
		views.dedup();
		Self {
			views,
			v,
			direction,
		}
	}

	/// The views that must take pairwise different values.
	pub fn views(&self) -> &[View] {
		&self.views
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		constraint::{Direction, LinearConstraint, Relation},
		storage::Variable,
		view::View,
	};

	/// Shorthand for a term `a·v_i`.
	fn term(i: usize, a: i32) -> View {
		View::with(Variable::from_usize(i), a, 0)
	}

	#[test]
	fn test_normalize_merges_and_divides() {
		let mut c = LinearConstraint::with_terms(
			vec![term(0, 2), term(1, 4), term(0, 2), term(2, 0)],
			Relation::Le,
			7,
		);
		c.normalize();
		// 4·v0 + 4·v1 <= 7 divides by the gcd, flooring the right-hand side.
		assert_eq!(c.views(), &[term(0, 1), term(1, 1)]);
		assert_eq!(c.relation(), Relation::Le);
		assert_eq!(c.rhs(), 1);

		// Normalization is idempotent.
		let snapshot = c.clone();
		c.normalize();
		assert_eq!(c, snapshot);
	}

	#[test]
	fn test_normalize_canonicalizes_relation() {
		let mut c = LinearConstraint::with_terms(vec![term(0, 1)], Relation::Lt, 5);
		c.normalize();
		assert_eq!((c.relation(), c.rhs()), (Relation::Le, 4));

		let mut c = LinearConstraint::with_terms(vec![term(0, 1)], Relation::Ge, 5);
		c.normalize();
		assert_eq!(c.views(), &[term(0, -1)]);
		assert_eq!((c.relation(), c.rhs()), (Relation::Le, -5));

		let mut c = LinearConstraint::with_terms(vec![term(0, 3)], Relation::Gt, 5);
		c.normalize();
		assert_eq!(c.views(), &[term(0, -1)]);
		assert_eq!((c.relation(), c.rhs()), (Relation::Le, -2));
	}

	#[test]
	fn test_normalize_folds_offsets() {
		let mut c = LinearConstraint::with_terms(
			vec![View::with(Variable::from_usize(0), 1, 3)],
			Relation::Eq,
			5,
		);
		c.normalize();
		assert_eq!(c.views(), &[term(0, 1)]);
		assert_eq!(c.rhs(), 2);
	}

	#[test]
	fn test_eq_gcd_preserved_when_indivisible() {
		// 2·v0 = 5 must not be divided; divisibility decides satisfiability.
		let mut c = LinearConstraint::with_terms(vec![term(0, 2)], Relation::Eq, 5);
		c.normalize();
		assert_eq!(c.views(), &[term(0, 2)]);
		assert_eq!(c.rhs(), 5);
	}

	#[test]
	fn test_reverse_invert_factorize() {
		let mut c = LinearConstraint::with_terms(vec![term(0, 2)], Relation::Le, 4);
		c.reverse();
		assert_eq!(c.relation(), Relation::Gt);
		c.reverse();
		c.invert();
		assert_eq!(c.views(), &[term(0, -2)]);
		assert_eq!((c.relation(), c.rhs()), (Relation::Ge, -4));

		let mut c = LinearConstraint::with_terms(vec![term(0, 6), term(1, -9)], Relation::Eq, 12);
		assert_eq!(c.factorize(), 3);
		assert_eq!(c.views(), &[term(0, 2), term(1, -3)]);
		assert_eq!(c.rhs(), 4);
	}

	#[test]
	fn test_direction_algebra() {
		assert!(Direction::Eq.fwd() && Direction::Eq.back());
		assert!(Direction::Fwd.fwd() && !Direction::Fwd.back());
		assert_eq!(Direction::Fwd.union(Direction::Back), Direction::Eq);
		assert_eq!(Direction::Fwd.flipped(), Direction::Back);
		assert_eq!(Direction::Eq.flipped(), Direction::Eq);
	}
}
