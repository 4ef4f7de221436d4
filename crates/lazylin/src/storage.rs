//! Ownership of variable domains and order literals.
//!
//! The [`VariableCreator`] owns every variable's original domain together
//! with the table mapping `(variable, threshold)` to the Boolean literal
//! encoding `v ≤ d_i`. Tables are indexed by *original* domain positions and
//! only ever grow (invariants I1–I3): the literal at the final threshold is
//! the engine's fixed true literal, present literals are monotone on the
//! domain, and no literal is ever dropped. Domains may only shrink while a
//! variable has no literals yet; afterwards bounds are narrowed through a
//! [`VariableStorage`].
//!
//! A [`VariableStorage`] layers the current search bounds, as positions into
//! the original domains, over the shared creator with a per-decision-level
//! undo log; a [`VolatileVariableStorage`] additionally holds the order
//! literals a lazy propagator creates during search, which never migrate
//! into the shared table.

use std::collections::HashMap;

use delegate::delegate;
use index_vec::IndexVec;

use crate::{
	domain::{Domain, WideDomain},
	solver::{Lit, SatEngine},
	view::{Restrictor, View, ViewIterator},
	EmptyDomain, IntVal,
};

index_vec::define_index_type! {
	/// Identifies an integer variable in the [`VariableCreator`].
	pub struct Variable = u32;
}

/// Resolution of a view-space `≤` threshold against the underlying
/// variable's literal table.
enum LeLookup {
	/// The threshold is a tautology (`v ≤ max(dom v)`).
	AlwaysTrue,
	/// The literal at this original domain position, as stored.
	Plain(u64),
	/// The negation of the literal at this original domain position.
	Negated(u64),
}

#[derive(Debug, Default)]
/// Owner of variable domains and the permanent order/equality literal
/// tables.
pub struct VariableCreator {
	/// Original domain per variable.
	domains: IndexVec<Variable, Domain>,
	/// Order literal per original domain position; the vector stays empty
	/// until the first literal for the variable is created. The final
	/// position is never stored (it is the fixed true literal).
	order_lits: IndexVec<Variable, Vec<Option<Lit>>>,
	/// Equality literal per original domain position, created on demand.
	equal_lits: IndexVec<Variable, HashMap<u64, Lit>>,
	/// Maps a Boolean variable to the order-literal meanings it carries:
	/// `(v, pos)` meaning the positive phase encodes `v ≤ d_pos`.
	meanings: HashMap<u32, Vec<(Variable, u64)>>,
}

#[derive(Clone, Debug, Default)]
/// Current search bounds per variable, as positions into the original
/// domains, with a per-level undo log.
pub struct VariableStorage {
	/// Inclusive `(lower, upper)` positions into the original domain.
	bounds: IndexVec<Variable, (u64, u64)>,
	/// Undo-log length at the start of each open level.
	levels: Vec<usize>,
	/// Undo entries `(variable, old_lower, old_upper)`.
	undo: Vec<(Variable, u64, u64)>,
}

#[derive(Debug, Default)]
/// Per-thread variable storage extended with the volatile order literals a
/// lazy propagator creates during search.
pub struct VolatileVariableStorage {
	/// The plain bound storage.
	storage: VariableStorage,
	/// Volatile order literals, keyed by original domain position.
	volatile_le: IndexVec<Variable, HashMap<u64, Lit>>,
	/// Meanings of the volatile literals, for the adapter's trail decoding.
	volatile_meanings: HashMap<u32, (Variable, u64)>,
}

impl VariableCreator {
	/// Create a variable with the given initial domain.
	pub fn create_variable(&mut self, domain: Domain) -> Variable {
		let v = self.domains.push(domain);
		let e = self.order_lits.push(Vec::new());
		debug_assert_eq!(v, e);
		let e = self.equal_lits.push(HashMap::new());
		debug_assert_eq!(v, e);
		v
	}

	/// Create an identity view over a fresh variable with the given domain.
	pub fn create_view(&mut self, domain: Domain) -> View {
		View::new(self.create_variable(domain))
	}

	/// Restrict a variable's domain to its intersection with `domain`.
	///
	/// Only permitted before any literal for the variable exists; the
	/// literal tables are indexed by the domain positions at creation time.
	pub fn constrain_domain(&mut self, v: Variable, domain: &Domain) -> Result<(), EmptyDomain> {
		debug_assert!(self.order_lits[v].is_empty() && self.equal_lits[v].is_empty());
		self.domains[v].intersect(domain)
	}

	/// The original domain of a variable.
	pub fn domain(&self, v: Variable) -> &Domain {
		&self.domains[v]
	}

	/// Mutable access to a variable's domain, for pre-literal restriction.
	pub fn domain_mut(&mut self, v: Variable) -> &mut Domain {
		debug_assert!(self.order_lits[v].is_empty() && self.equal_lits[v].is_empty());
		&mut self.domains[v]
	}

	/// The number of values a view ranges over.
	pub fn domain_size(&self, view: View) -> u64 {
		self.domains[view.v].size()
	}

	/// Access the literal encoding `view ≤ *it`, creating it if necessary.
	///
	/// The iterator must not be past the view's end.
	pub fn get_le_literal<S: SatEngine>(&mut self, s: &mut S, it: &ViewIterator<'_>) -> Lit {
		let view = it.view();
		let size = self.domains[view.v].size();
		match le_lookup(view, size, it.num_element()) {
			LeLookup::AlwaysTrue => s.true_lit(),
			LeLookup::Plain(p) => self.order_lit_at(s, view.v, p),
			LeLookup::Negated(p) => !self.order_lit_at(s, view.v, p),
		}
	}

	/// Access the literal encoding `view == *it`, creating it if necessary.
	///
	/// An iterator at the view's end yields the fixed false literal.
	pub fn get_equal_literal<S: SatEngine>(&mut self, s: &mut S, it: &ViewIterator<'_>) -> Lit {
		let view = it.view();
		let size = self.domains[view.v].size();
		if it.at_end() {
			return s.false_lit();
		}
		if size == 1 {
			return s.true_lit();
		}
		let p = eq_position(view, size, it.num_element());
		if p == 0 {
			// v == d_0 is exactly v ≤ d_0.
			return self.order_lit_at(s, view.v, 0);
		}
		if p == size - 1 {
			// v == d_{k-1} is exactly v > d_{k-2}.
			return !self.order_lit_at(s, view.v, size - 2);
		}
		if let Some(l) = self.equal_lits[view.v].get(&p) {
			return *l;
		}
		let l = s.new_literal(true);
		let _ = self.equal_lits[view.v].insert(p, l);
		l
	}

	/// Return the literal for `view ≤ *it` if it has already been created.
	pub fn find_le_literal<S: SatEngine>(&self, s: &S, it: &ViewIterator<'_>) -> Option<Lit> {
		let view = it.view();
		let size = self.domains[view.v].size();
		match le_lookup(view, size, it.num_element()) {
			LeLookup::AlwaysTrue => Some(s.true_lit()),
			LeLookup::Plain(p) => self.order_lit_raw(view.v, p),
			LeLookup::Negated(p) => self.order_lit_raw(view.v, p).map(|l| !l),
		}
	}

	/// Whether the literal for `view ≤ *it` has already been created.
	pub fn has_le_literal(&self, it: &ViewIterator<'_>) -> bool {
		let view = it.view();
		let size = self.domains[view.v].size();
		match le_lookup(view, size, it.num_element()) {
			LeLookup::AlwaysTrue => true,
			LeLookup::Plain(p) | LeLookup::Negated(p) => self.order_lit_raw(view.v, p).is_some(),
		}
	}

	/// The order-literal meanings carried by each Boolean variable, for
	/// watch registration and trail decoding.
	pub fn meanings(&self) -> &HashMap<u32, Vec<(Variable, u64)>> {
		&self.meanings
	}

	/// The number of variables created.
	pub fn num_variables(&self) -> usize {
		self.domains.len()
	}

	/// Iterate over the variables.
	pub fn variables(&self) -> impl Iterator<Item = Variable> {
		(0..self.domains.len()).map(Variable::from_usize)
	}

	/// Iterate over the created order literals of a variable, in increasing
	/// position order.
	pub fn order_literals(&self, v: Variable) -> impl Iterator<Item = (u64, Lit)> + '_ {
		self.order_lits[v]
			.iter()
			.enumerate()
			.filter_map(|(i, l)| l.map(|l| (i as u64, l)))
	}

	/// Iterate over the created equality literals of a variable, in
	/// increasing position order.
	pub fn equal_literals(&self, v: Variable) -> impl Iterator<Item = (u64, Lit)> {
		let mut lits: Vec<_> = self.equal_lits[v].iter().map(|(p, l)| (*p, *l)).collect();
		lits.sort_unstable();
		lits.into_iter()
	}

	/// Materialize order literals for a variable.
	///
	/// `count` literals are created at evenly spaced thresholds; a negative
	/// count creates a literal at every threshold.
	pub fn create_order_literals<S: SatEngine>(&mut self, s: &mut S, v: Variable, count: i64) {
		let size = self.domains[v].size();
		if size <= 1 {
			return;
		}
		let thresholds = size - 1;
		let wanted = if count < 0 {
			thresholds
		} else {
			thresholds.min(count as u64)
		};
		if wanted == 0 {
			return;
		}
		let step = (thresholds / wanted).max(1);
		let mut p = 0;
		while p < thresholds {
			let _ = self.order_lit_at(s, v, p);
			p += step;
		}
	}

	/// The restrictor covering a view's full original domain.
	pub fn restrictor(&self, view: View) -> Restrictor<'_> {
		Restrictor::new(view, &self.domains[view.v])
	}

	/// The 64-bit value set of a view.
	pub fn view_domain(&self, view: View) -> WideDomain {
		WideDomain::of_transformed(&self.domains[view.v], view.a, view.c)
	}

	/// The stored order literal at an original domain position, creating and
	/// registering it if absent.
	pub(crate) fn order_lit_at<S: SatEngine>(&mut self, s: &mut S, v: Variable, pos: u64) -> Lit {
		let size = self.domains[v].size();
		debug_assert!(pos + 1 < size, "the final threshold is the true literal");
		if self.order_lits[v].is_empty() {
			self.order_lits[v].resize((size - 1) as usize, None);
		}
		if let Some(l) = self.order_lits[v][pos as usize] {
			return l;
		}
		let l = s.new_literal(true);
		debug_assert!(!l.is_negated());
		self.order_lits[v][pos as usize] = Some(l);
		self.meanings.entry(l.var()).or_default().push((v, pos));
		l
	}

	/// The stored order literal at an original domain position, if present.
	fn order_lit_raw(&self, v: Variable, pos: u64) -> Option<Lit> {
		self.order_lits[v].get(pos as usize).copied().flatten()
	}
}

impl VariableStorage {
	/// Create storage with every variable at its full original domain.
	pub fn new(vc: &VariableCreator) -> Self {
		let bounds = vc
			.domains
			.iter()
			.map(|d| (0, d.size().saturating_sub(1)))
			.collect();
		Self {
			bounds,
			levels: Vec::new(),
			undo: Vec::new(),
		}
	}

	/// Open a new decision level.
	pub fn add_level(&mut self) {
		self.levels.push(self.undo.len());
	}

	/// Exclude the values of `view` at and above the iterator's position.
	///
	/// The iterator points at the first element no longer allowed.
	pub fn constrain_upper_bound(
		&mut self,
		vc: &VariableCreator,
		it: &ViewIterator<'_>,
	) -> Result<(), EmptyDomain> {
		let view = it.view();
		let size = vc.domains[view.v].size();
		let vp_end = it.num_element();
		let (lb, ub) = self.bounds[view.v];
		if !view.reversed() {
			if vp_end == 0 || vp_end - 1 < lb {
				return Err(EmptyDomain);
			}
			let new_ub = vp_end - 1;
			if new_ub < ub {
				self.record(view.v, lb, ub);
				self.bounds[view.v].1 = new_ub;
			}
		} else {
			let new_lb = size - vp_end;
			if new_lb > ub {
				return Err(EmptyDomain);
			}
			if new_lb > lb {
				self.record(view.v, lb, ub);
				self.bounds[view.v].0 = new_lb;
			}
		}
		Ok(())
	}

	/// Exclude the values of `view` below the iterator's position.
	///
	/// The iterator points at the first element still allowed.
	pub fn constrain_lower_bound(
		&mut self,
		vc: &VariableCreator,
		it: &ViewIterator<'_>,
	) -> Result<(), EmptyDomain> {
		let view = it.view();
		let size = vc.domains[view.v].size();
		let vp_begin = it.num_element();
		let (lb, ub) = self.bounds[view.v];
		if !view.reversed() {
			if vp_begin > ub {
				return Err(EmptyDomain);
			}
			if vp_begin > lb {
				self.record(view.v, lb, ub);
				self.bounds[view.v].0 = vp_begin;
			}
		} else {
			if vp_begin == size || size - 1 - vp_begin < lb {
				return Err(EmptyDomain);
			}
			let new_ub = size - 1 - vp_begin;
			if new_ub < ub {
				self.record(view.v, lb, ub);
				self.bounds[view.v].1 = new_ub;
			}
		}
		Ok(())
	}

	/// The restrictor over the currently active portion of a view's domain.
	///
	/// Element positions refer to the original domain.
	pub fn current_restrictor<'a>(&self, vc: &'a VariableCreator, view: View) -> Restrictor<'a> {
		let (lb, ub) = self.bounds[view.v];
		let domain = &vc.domains[view.v];
		let identity = Restrictor::from_iters(
			ViewIterator::at(View::new(view.v), domain, lb),
			ViewIterator::at(View::new(view.v), domain, ub + 1),
		);
		Restrictor::compose(view, &identity)
	}

	/// Grow the storage to cover variables created after it.
	pub fn grow_to(&mut self, vc: &VariableCreator) {
		while self.bounds.len() < vc.domains.len() {
			let d = &vc.domains[Variable::from_usize(self.bounds.len())];
			let _ = self.bounds.push((0, d.size().saturating_sub(1)));
		}
	}

	/// Whether a variable is pinned to a single value.
	pub fn is_pinned(&self, v: Variable) -> bool {
		self.bounds[v].0 == self.bounds[v].1
	}

	/// The number of open decision levels.
	pub fn level_count(&self) -> usize {
		self.levels.len()
	}

	/// Inclusive bound positions of a variable, into its original domain.
	pub fn positions(&self, v: Variable) -> (u64, u64) {
		self.bounds[v]
	}

	/// Close the top decision level, restoring the bounds it changed.
	pub fn remove_level(&mut self) {
		let mark = self.levels.pop().expect("no open level to remove");
		while self.undo.len() > mark {
			let (v, lb, ub) = self.undo.pop().expect("undo log length checked");
			self.bounds[v] = (lb, ub);
		}
	}

	/// The pinned value of a variable.
	pub fn value(&self, vc: &VariableCreator, v: Variable) -> IntVal {
		debug_assert!(self.is_pinned(v));
		vc.domains[v].iter_at(self.bounds[v].0).value()
	}

	/// Trail a bound change; changes below the first level are permanent.
	fn record(&mut self, v: Variable, lb: u64, ub: u64) {
		if !self.levels.is_empty() {
			self.undo.push((v, lb, ub));
		}
	}
}

impl VolatileVariableStorage {
	/// Create volatile storage over the shared creator.
	pub fn new(vc: &VariableCreator) -> Self {
		let volatile_le = vc.domains.iter().map(|_| HashMap::new()).collect();
		Self {
			storage: VariableStorage::new(vc),
			volatile_le,
			volatile_meanings: HashMap::new(),
		}
	}

	delegate! {
		to self.storage {
			/// Open a new decision level.
			pub fn add_level(&mut self);
			/// Exclude the values of `view` at and above the iterator's position.
			pub fn constrain_upper_bound(
				&mut self,
				vc: &VariableCreator,
				it: &ViewIterator<'_>,
			) -> Result<(), EmptyDomain>;
			/// Exclude the values of `view` below the iterator's position.
			pub fn constrain_lower_bound(
				&mut self,
				vc: &VariableCreator,
				it: &ViewIterator<'_>,
			) -> Result<(), EmptyDomain>;
			/// The restrictor over the currently active portion of a view's domain.
			pub fn current_restrictor<'a>(&self, vc: &'a VariableCreator, view: View) -> Restrictor<'a>;
			/// Whether a variable is pinned to a single value.
			pub fn is_pinned(&self, v: Variable) -> bool;
			/// The number of open decision levels.
			pub fn level_count(&self) -> usize;
			/// Inclusive bound positions of a variable, into its original domain.
			pub fn positions(&self, v: Variable) -> (u64, u64);
			/// Close the top decision level, restoring the bounds it changed.
			pub fn remove_level(&mut self);
			/// The pinned value of a variable.
			pub fn value(&self, vc: &VariableCreator, v: Variable) -> IntVal;
		}
	}

	/// Access the literal encoding `view ≤ *it`, consulting the shared table
	/// first and falling back to the volatile overlay, creating the literal
	/// there if necessary.
	pub fn get_le_lit<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
		it: &ViewIterator<'_>,
	) -> Lit {
		let view = it.view();
		let size = vc.domains[view.v].size();
		match le_lookup(view, size, it.num_element()) {
			LeLookup::AlwaysTrue => s.true_lit(),
			LeLookup::Plain(p) => self.volatile_lit_at(s, vc, view.v, p),
			LeLookup::Negated(p) => !self.volatile_lit_at(s, vc, view.v, p),
		}
	}

	/// The meaning of a volatile literal created during search, if any.
	pub fn volatile_meaning(&self, var: u32) -> Option<(Variable, u64)> {
		self.volatile_meanings.get(&var).copied()
	}

	/// The order literal at an original domain position, preferring the
	/// shared table over the volatile overlay.
	///
	/// A fresh literal is immediately linked into the monotonicity chain of
	/// its nearest created neighbours.
	fn volatile_lit_at<S: SatEngine>(
		&mut self,
		s: &mut S,
		vc: &VariableCreator,
		v: Variable,
		pos: u64,
	) -> Lit {
		if let Some(l) = vc.order_lit_raw(v, pos) {
			return l;
		}
		if let Some(l) = self.volatile_le[v].get(&pos) {
			return *l;
		}
		let l = s.new_literal(true);
		let _ = self.volatile_le[v].insert(pos, l);
		let _ = self.volatile_meanings.insert(l.var(), (v, pos));

		let mut prev: Option<(u64, Lit)> = None;
		let mut next: Option<(u64, Lit)> = None;
		let neighbours = vc
			.order_literals(v)
			.chain(self.volatile_le[v].iter().map(|(p, l)| (*p, *l)));
		for (p, cand) in neighbours {
			if p < pos && prev.map_or(true, |(q, _)| p > q) {
				prev = Some((p, cand));
			}
			if p > pos && next.map_or(true, |(q, _)| p < q) {
				next = Some((p, cand));
			}
		}
		if let Some((_, prev)) = prev {
			let _ = s.add_clause(&[!prev, l]);
		}
		if let Some((_, next)) = next {
			let _ = s.add_clause(&[!l, next]);
		}
		l
	}
}

/// Resolve a view-space `≤` threshold to the underlying literal table.
fn le_lookup(view: View, size: u64, vp: u64) -> LeLookup {
	debug_assert!(vp < size, "iterator past the view's end");
	if !view.reversed() {
		if vp + 1 == size {
			LeLookup::AlwaysTrue
		} else {
			LeLookup::Plain(vp)
		}
	} else {
		let p = size - 1 - vp;
		if p == 0 {
			LeLookup::AlwaysTrue
		} else {
			LeLookup::Negated(p - 1)
		}
	}
}

/// Map a view-space position to the underlying original domain position.
fn eq_position(view: View, size: u64, vp: u64) -> u64 {
	if view.reversed() {
		size - 1 - vp
	} else {
		vp
	}
}

#[cfg(test)]
mod tests {
	use crate::{
		domain::Domain,
		solver::SatEngine,
		storage::{VariableCreator, VariableStorage},
		tests::TestEngine,
		view::{View, ViewIterator},
	};

	#[test]
	fn test_le_literal_table() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let v = vc.create_variable(Domain::new(1, 4));
		let d = vc.domain(v).clone();

		let l1 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 0));
		let l2 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 1));
		assert_ne!(l1, l2);
		// Same threshold resolves to the same literal.
		assert_eq!(
			vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 0)),
			l1
		);
		// The final threshold is the fixed true literal.
		assert_eq!(
			vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 3)),
			s.true_lit()
		);

		// The reversed view maps onto the same table: -v ≤ -4 is v ≥ 4,
		// i.e. the negation of v ≤ 3.
		let neg = View::with(v, -1, 0);
		let l3 = vc.get_le_literal(&mut s, &ViewIterator::at(neg, &d, 0));
		let l4 = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 2));
		assert_eq!(l3, !l4);
		// -v ≤ -1 is a tautology.
		assert_eq!(
			vc.get_le_literal(&mut s, &ViewIterator::at(neg, &d, 3)),
			s.true_lit()
		);

		// Lookup without creation observes exactly the created thresholds.
		assert!(vc.has_le_literal(&ViewIterator::at(View::new(v), &d, 0)));
		assert_eq!(
			vc.find_le_literal(&s, &ViewIterator::at(View::new(v), &d, 1)),
			Some(l2)
		);
		let mut vc2 = VariableCreator::default();
		let w = vc2.create_variable(Domain::new(1, 4));
		let d2 = vc2.domain(w).clone();
		assert!(!vc2.has_le_literal(&ViewIterator::at(View::new(w), &d2, 1)));
		assert_eq!(
			vc2.find_le_literal(&s, &ViewIterator::at(View::new(w), &d2, 1)),
			None
		);
	}

	#[test]
	fn test_equal_literal_edges() {
		let mut s = TestEngine::default();
		let mut vc = VariableCreator::default();
		let v = vc.create_variable(Domain::new(1, 4));
		let d = vc.domain(v).clone();

		// Equality at the edges reuses order literals.
		let eq_first = vc.get_equal_literal(&mut s, &ViewIterator::at(View::new(v), &d, 0));
		let le_first = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 0));
		assert_eq!(eq_first, le_first);
		let eq_last = vc.get_equal_literal(&mut s, &ViewIterator::at(View::new(v), &d, 3));
		let le_penultimate = vc.get_le_literal(&mut s, &ViewIterator::at(View::new(v), &d, 2));
		assert_eq!(eq_last, !le_penultimate);

		// Interior equalities get their own literal, stable across calls.
		let eq_mid = vc.get_equal_literal(&mut s, &ViewIterator::at(View::new(v), &d, 1));
		assert_ne!(eq_mid, eq_first);
		assert_eq!(
			vc.get_equal_literal(&mut s, &ViewIterator::at(View::new(v), &d, 1)),
			eq_mid
		);

		// Past-the-end equality is false.
		let end = ViewIterator::end(View::new(v), &d);
		assert_eq!(vc.get_equal_literal(&mut s, &end), s.false_lit());
	}

	#[test]
	fn test_storage_bounds_and_undo() {
		let mut vc = VariableCreator::default();
		let v = vc.create_variable(Domain::new(0, 9));
		let mut vs = VariableStorage::new(&vc);
		let view = View::new(v);
		let d = vc.domain(v);

		assert_eq!(vs.positions(v), (0, 9));
		vs.add_level();
		assert!(vs
			.constrain_upper_bound(&vc, &ViewIterator::at(view, d, 7))
			.is_ok());
		assert!(vs
			.constrain_lower_bound(&vc, &ViewIterator::at(view, d, 2))
			.is_ok());
		assert_eq!(vs.positions(v), (2, 6));
		let r = vs.current_restrictor(&vc, view);
		assert_eq!((r.lower(), r.upper()), (2, 6));

		vs.add_level();
		assert!(vs
			.constrain_upper_bound(&vc, &ViewIterator::at(view, d, 3))
			.is_ok());
		assert_eq!(vs.positions(v), (2, 2));
		assert!(vs.is_pinned(v));
		assert_eq!(vs.value(&vc, v), 2);

		// Emptying the bounds is reported, not recorded.
		assert!(vs
			.constrain_upper_bound(&vc, &ViewIterator::at(view, d, 1))
			.is_err());

		vs.remove_level();
		assert_eq!(vs.positions(v), (2, 6));
		vs.remove_level();
		assert_eq!(vs.positions(v), (0, 9));
	}

	#[test]
	fn test_reversed_bound_constraints() {
		let mut vc = VariableCreator::default();
		let v = vc.create_variable(Domain::new(0, 9));
		let mut vs = VariableStorage::new(&vc);
		let view = View::with(v, -1, 0);

		// Restricting the view's upper bound raises the variable's lower
		// bound: keeping -v ≤ -4 means v ≥ 4.
		vs.add_level();
		let r = vs.current_restrictor(&vc, view);
		let it = crate::view::upper_bound(&r.begin(), &r.end(), -4);
		assert!(vs.constrain_upper_bound(&vc, &it).is_ok());
		assert_eq!(vs.positions(v), (4, 9));

		let r = vs.current_restrictor(&vc, view);
		assert_eq!((r.lower(), r.upper()), (-9, -4));
	}
}
