//! Configuration of the normalization pipeline and the lazy propagators.
//!
//! Configurations are ordinary values handed to [`crate::Normalizer`]; the
//! presets used throughout the test suite are plain constructors, not
//! process-wide state.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Tuning knobs for translation and propagation.
pub struct Config {
	/// Translate a constraint eagerly if its estimated clause count is at
	/// most this value; `-1` translates every constraint.
	pub translate_constraints: i64,
	/// Translate all-distinct with cardinality constraints instead of
	/// pairwise inequalities.
	pub alldistinct_card: bool,
	/// Materialize at least this many order literals per variable during
	/// finalization; `-1` creates one per threshold.
	pub min_lits_per_var: i64,
	/// Cap on the point-set cardinality kept exact when a domain is
	/// multiplied; larger products are over-approximated.
	pub dom_size: u64,
	/// Lazy propagation strength, 1..4.
	///
	/// Strength 1 only infers the truth of constraint literals; 2 adds bound
	/// tightening through newly forcing order literals; 3 adds the look-ahead
	/// over the current minima and maxima of all views. Strength 4 is
	/// accepted and behaves like 3 on the shipped test corpus.
	pub prop_strength: u32,
	/// Restrict inferences to the forward direction; diagnostics only.
	pub dontcare: bool,
	/// Rewrite a disjoint constraint whose groups are all singletons into a
	/// single all-distinct.
	pub disjoint_to_distinct: bool,
	/// Detect equality chains and substitute class representatives.
	pub equality_processing: bool,
}

impl Config {
	/// Lazy search configuration with the given propagation strength.
	pub fn lazy_solve(prop_strength: u32) -> Self {
		Self {
			translate_constraints: 1000,
			min_lits_per_var: 1000,
			prop_strength,
			..Self::default()
		}
	}

	/// Create every order literal up front but translate no constraints.
	pub fn non_lazy_solve() -> Self {
		Self {
			translate_constraints: 0,
			min_lits_per_var: -1,
			..Self::default()
		}
	}

	/// Translate every constraint into clauses.
	pub fn translate() -> Self {
		Self {
			translate_constraints: -1,
			min_lits_per_var: 1000,
			..Self::default()
		}
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			translate_constraints: 1000,
			alldistinct_card: false,
			min_lits_per_var: 1000,
			dom_size: 10000,
			prop_strength: 4,
			dontcare: false,
			disjoint_to_distinct: true,
			equality_processing: true,
		}
	}
}
