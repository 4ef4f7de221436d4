//! The contract of the host SAT engine that the core cooperates with.
//!
//! The engine owns all Boolean literals: the core stores raw [`Lit`] handles
//! plus a monotone threshold index, and re-acquires truth values from the
//! host on demand. Assignment state is never cached across `propagate`
//! calls without an explicit `undo`.

use std::{fmt, num::NonZeroI32, ops::Not};

use crate::SumVal;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// A handle to a Boolean literal owned by the host SAT engine.
///
/// Handles are signed: negation flips the sign, and two handles refer to the
/// same Boolean variable exactly when [`Lit::var`] agrees.
pub struct Lit(NonZeroI32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The truth value of a literal under the engine's current assignment.
pub enum TruthValue {
	/// The literal is assigned true.
	True,
	/// The literal is assigned false.
	False,
	/// The literal is unassigned.
	Unknown,
}

impl Lit {
	/// Reconstruct a handle from its raw signed representation.
	pub fn from_raw(raw: NonZeroI32) -> Self {
		Lit(raw)
	}

	/// Whether this is the negative phase of its variable.
	pub fn is_negated(self) -> bool {
		self.0.get() < 0
	}

	/// The raw signed representation of the handle.
	pub fn raw(self) -> NonZeroI32 {
		self.0
	}

	/// The Boolean variable the handle refers to.
	pub fn var(self) -> u32 {
		self.0.get().unsigned_abs()
	}
}

impl fmt::Display for Lit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.get())
	}
}

impl Not for Lit {
	type Output = Lit;

	fn not(self) -> Self::Output {
		Lit(NonZeroI32::new(-self.0.get()).expect("negation of a non-zero value is non-zero"))
	}
}

/// The capabilities the core consumes from the host SAT engine.
///
/// A clause or cardinality assertion returning `false` means the engine
/// found the addition immediately unsatisfiable; callers abort cleanly.
pub trait SatEngine {
	/// Assert an at-most-`bound` constraint over the weighted literals,
	/// guarded by `lit` (i.e. `lit → Σ weights of true literals ≤ bound`).
	fn add_cardinality(&mut self, lit: Lit, bound: SumVal, lits: &[(Lit, SumVal)]) -> bool;

	/// Assert a clause.
	fn add_clause(&mut self, lits: &[Lit]) -> bool;

	/// Contribute `weight` under `lit` to the lexicographic minimize
	/// objective at the given priority level.
	fn add_minimize(&mut self, lit: Lit, weight: SumVal, level: u32);

	/// The fixed literal representing falsity.
	fn false_lit(&self) -> Lit {
		!self.true_lit()
	}

	/// Request that the literal not be eliminated by the host.
	fn freeze(&mut self, lit: Lit);

	/// Signal a fatal numeric overflow to the host.
	fn intermediate_variable_out_of_range(&mut self);

	/// Whether the literal is false under the current assignment.
	fn is_false(&self, lit: Lit) -> bool;

	/// Whether the literal is true under the current assignment.
	fn is_true(&self, lit: Lit) -> bool;

	/// Whether the literal is unassigned.
	fn is_unknown(&self, lit: Lit) -> bool;

	/// Allocate a fresh Boolean literal; `frozen` requests that the host
	/// keep it from being eliminated.
	fn new_literal(&mut self, frozen: bool) -> Lit;

	/// The fixed literal representing truth.
	fn true_lit(&self) -> Lit;

	/// The truth value of the literal under the current assignment.
	fn truth_value(&self, lit: Lit) -> TruthValue {
		if self.is_true(lit) {
			TruthValue::True
		} else if self.is_false(lit) {
			TruthValue::False
		} else {
			TruthValue::Unknown
		}
	}
}
