//! Shared test utilities: a scripted SAT engine with unit propagation and
//! an exhaustive search harness that enumerates the models of a prepared
//! problem through the propagator contract.

use std::collections::BTreeSet;

use crate::{
	normalizer::Normalizer,
	order_propagator::{CheckResult, OrderPropagator},
	solver::{Lit, SatEngine},
	view::View,
	Clause, SumVal,
};

#[derive(Debug)]
/// A minimal SAT engine for tests: stores clauses and cardinality
/// constraints, assigns literals on demand, and propagates units.
pub(crate) struct TestEngine {
	/// Assignment per variable: `0` unknown, `1` true, `-1` false. Variable
	/// 1 is the fixed true literal.
	assigns: Vec<i8>,
	/// The stored clauses.
	clauses: Vec<Clause>,
	/// At-most-bound constraints `(guard, bound, weighted literals)`.
	cards: Vec<(Lit, SumVal, Vec<(Lit, SumVal)>)>,
	/// Assigned variables in assignment order.
	trail: Vec<u32>,
	/// Trail lengths at open decision levels.
	marks: Vec<usize>,
	/// Recorded minimize contributions `(lit, weight, level)`.
	pub(crate) minimize: Vec<(Lit, SumVal, u32)>,
	/// Whether a root-level conflict was found.
	unsat: bool,
	/// Whether a fatal overflow was signalled.
	out_of_range: bool,
}

impl Default for TestEngine {
	fn default() -> Self {
		Self {
			// Variable 1 is permanently true.
			assigns: vec![0, 1],
			clauses: Vec::new(),
			cards: Vec::new(),
			trail: Vec::new(),
			marks: Vec::new(),
			minimize: Vec::new(),
			unsat: false,
			out_of_range: false,
		}
	}
}

impl TestEngine {
	/// Assign a literal; it must currently be unknown.
	pub(crate) fn assume(&mut self, lit: Lit) {
		debug_assert_eq!(self.assigns[lit.var() as usize], 0);
		self.assigns[lit.var() as usize] = if lit.is_negated() { -1 } else { 1 };
		self.trail.push(lit.var());
	}

	/// Undo every assignment made after the mark.
	pub(crate) fn backtrack_to(&mut self, mark: usize) {
		while self.trail.len() > mark {
			let v = self.trail.pop().expect("trail length checked");
			self.assigns[v as usize] = 0;
		}
	}

	/// The current trail length.
	pub(crate) fn mark(&self) -> usize {
		self.trail.len()
	}

	/// The number of allocated variables.
	pub(crate) fn num_vars(&self) -> u32 {
		self.assigns.len() as u32 - 1
	}

	/// Close the innermost decision level.
	pub(crate) fn pop_level(&mut self) {
		let _ = self.marks.pop();
	}

	/// Open a decision level.
	pub(crate) fn push_level(&mut self) {
		self.marks.push(self.trail.len());
	}

	/// Propagate clauses and cardinality constraints to a fixpoint.
	///
	/// Returns false on conflict.
	pub(crate) fn propagate_units(&mut self) -> bool {
		loop {
			let mut changed = false;
			for i in 0..self.clauses.len() {
				let mut unassigned = None;
				let mut satisfied = false;
				let mut open = 0;
				for &l in &self.clauses[i] {
					match self.value(l) {
						1 => {
							satisfied = true;
							break;
						}
						0 => {
							open += 1;
							unassigned = Some(l);
						}
						_ => {}
					}
				}
				if satisfied {
					continue;
				}
				match open {
					0 => return false,
					1 => {
						self.assume(unassigned.expect("a single open literal remains"));
						changed = true;
					}
					_ => {}
				}
			}
			for i in 0..self.cards.len() {
				let (guard, bound, ref lits) = self.cards[i];
				let lits = lits.clone();
				let sum: SumVal = lits
					.iter()
					.filter(|(l, _)| self.value(*l) == 1)
					.map(|(_, w)| *w)
					.sum();
				match self.value(guard) {
					1 => {
						if sum > bound {
							return false;
						}
						if sum == bound {
							for (l, w) in lits {
								debug_assert!(w > 0);
								if self.value(l) == 0 {
									self.assume(!l);
									changed = true;
								}
							}
						}
					}
					0 => {
						if sum > bound {
							self.assume(!guard);
							changed = true;
						}
					}
					_ => {}
				}
			}
			if !changed {
				return true;
			}
		}
	}

	/// The truth value of a literal: `1` true, `-1` false, `0` unknown.
	fn value(&self, lit: Lit) -> i8 {
		let v = self.assigns[lit.var() as usize];
		if lit.is_negated() {
			-v
		} else {
			v
		}
	}
}

impl SatEngine for TestEngine {
	fn add_cardinality(&mut self, lit: Lit, bound: SumVal, lits: &[(Lit, SumVal)]) -> bool {
		self.cards.push((lit, bound, lits.to_vec()));
		true
	}

	fn add_clause(&mut self, lits: &[Lit]) -> bool {
		if self.unsat {
			return false;
		}
		self.clauses.push(lits.to_vec());
		if !self.propagate_units() && self.marks.is_empty() {
			self.unsat = true;
			return false;
		}
		true
	}

	fn add_minimize(&mut self, lit: Lit, weight: SumVal, level: u32) {
		self.minimize.push((lit, weight, level));
	}

	fn freeze(&mut self, _lit: Lit) {}

	fn intermediate_variable_out_of_range(&mut self) {
		self.out_of_range = true;
	}

	fn is_false(&self, lit: Lit) -> bool {
		self.value(lit) == -1
	}

	fn is_true(&self, lit: Lit) -> bool {
		self.value(lit) == 1
	}

	fn is_unknown(&self, lit: Lit) -> bool {
		self.value(lit) == 0
	}

	fn new_literal(&mut self, _frozen: bool) -> Lit {
		let var = self.assigns.len() as u32;
		self.assigns.push(0);
		Lit::from_raw(std::num::NonZeroI32::new(var as i32).expect("variable ids start at 1"))
	}

	fn true_lit(&self) -> Lit {
		Lit::from_raw(std::num::NonZeroI32::new(1).expect("1 is non-zero"))
	}
}

/// Prepare, finalize, and exhaustively enumerate the models of a problem,
/// projected onto the given views (plus the truth of the extra literals).
///
/// Returns `None` when the problem is refuted during normalization.
pub(crate) fn solve_models(
	s: &mut TestEngine,
	n: &mut Normalizer,
	project: &[View],
	extra: &[Lit],
) -> Option<BTreeSet<Vec<SumVal>>> {
	if n.prepare(s).is_err() || n.finalize(s).is_err() {
		return None;
	}
	let config = *n.config();
	let mut op = OrderPropagator::new(n.variable_creator(), config, n.constraints().to_vec());
	let mut models = BTreeSet::new();
	search(s, &mut op, project, extra, 0, &mut models);
	Some(models)
}

/// Exhaustive DPLL over the engine's variables, driving the propagator at
/// every step; models are recorded as projected value tuples.
fn search(
	s: &mut TestEngine,
	op: &mut OrderPropagator<'_>,
	project: &[View],
	extra: &[Lit],
	cursor: usize,
	models: &mut BTreeSet<Vec<SumVal>>,
) {
	let mut cursor = cursor;
	// Drive engine units and integer propagation to a joint fixpoint.
	loop {
		if !s.propagate_units() {
			return;
		}
		if s.trail.len() == cursor {
			break;
		}
		let batch: Vec<Lit> = s.trail[cursor..]
			.iter()
			.map(|&v| {
				let lit = Lit::from_raw(std::num::NonZeroI32::new(v as i32).expect("valid var"));
				if s.assigns[v as usize] == 1 {
					lit
				} else {
					!lit
				}
			})
			.collect();
		cursor = s.trail.len();
		match op.propagate(s, &batch) {
			Err(conflict) => {
				let _ = s.add_clause(&conflict);
				return;
			}
			Ok(clauses) => {
				for c in clauses {
					let _ = s.add_clause(&c);
				}
			}
		}
	}

	if let Some(var) = next_decision(s, op) {
		for phase in [true, false] {
			let mark = s.mark();
			s.push_level();
			op.push_level();
			let lit = Lit::from_raw(
				std::num::NonZeroI32::new(var as i32).expect("variable ids start at 1"),
			);
			s.assume(if phase { lit } else { !lit });
			search(s, op, project, extra, mark, models);
			op.undo();
			s.pop_level();
			s.backtrack_to(mark);
		}
		return;
	}

	match op.check(s) {
		CheckResult::Consistent => {
			let mut tuple: Vec<SumVal> = project.iter().map(|v| op.assignment(*v)).collect();
			tuple.extend(extra.iter().map(|l| SumVal::from(s.is_true(*l))));
			let _ = models.insert(tuple);
		}
		CheckResult::Split(_) => {
			// A fresh literal was created; decide it and continue.
			search(s, op, project, extra, cursor, models);
		}
		CheckResult::Conflict(_) => {}
	}
}

/// The next unassigned variable: order-literal bearers first, auxiliary
/// variables only once every meaningful variable is assigned.
fn next_decision(s: &TestEngine, op: &OrderPropagator<'_>) -> Option<u32> {
	let mut fallback = None;
	for var in 2..=s.num_vars() {
		if s.assigns[var as usize] != 0 {
			continue;
		}
		if op.carries_meaning(var) {
			return Some(var);
		}
		if fallback.is_none() {
			fallback = Some(var);
		}
	}
	fallback
}

mod scenarios {
	use std::collections::BTreeSet;

	use crate::{
		config::Config,
		constraint::{
			Direction, LinearConstraint, ReifiedAllDistinct, ReifiedDisjoint,
			ReifiedDomainConstraint, ReifiedLinearConstraint, Relation,
		},
		domain::Domain,
		normalizer::Normalizer,
		solver::SatEngine,
		tests::{solve_models, TestEngine},
		view::View,
		SumVal,
	};

	/// A reified linear constraint from parts.
	fn rlc(
		views: Vec<View>,
		rel: Relation,
		rhs: i32,
		v: crate::solver::Lit,
		direction: Direction,
	) -> ReifiedLinearConstraint {
		ReifiedLinearConstraint::new(LinearConstraint::with_terms(views, rel, rhs), v, direction)
	}

	#[test]
	fn test_send_more_money() {
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config::lazy_solve(4));
		let t = s.true_lit();

		let letters: Vec<View> = (0..8).map(|_| n.create_view(Domain::new(0, 9))).collect();
		let (se, e, nn, d) = (letters[0], letters[1], letters[2], letters[3]);
		let (m, o, r, y) = (letters[4], letters[5], letters[6], letters[7]);
		// send + more = money, with non-zero leading digits.
		let mut terms = vec![
			se * 1000,
			e * 100,
			nn * 10,
			d * 1,
			m * 1000,
			o * 100,
			r * 10,
			e * 1,
		];
		terms.extend([m * -10000, o * -1000, nn * -100, e * -10, y * -1]);
		n.add_constraint(rlc(terms, Relation::Eq, 0, t, Direction::Fwd));
		n.add_constraint(rlc(vec![se], Relation::Ge, 1, t, Direction::Fwd));
		n.add_constraint(rlc(vec![m], Relation::Ge, 1, t, Direction::Fwd));
		n.add_distinct(ReifiedAllDistinct::new(letters.clone(), t, Direction::Fwd));

		let models = solve_models(&mut s, &mut n, &letters, &[]).unwrap();
		let expected: BTreeSet<Vec<SumVal>> =
			BTreeSet::from([vec![9, 5, 6, 7, 1, 0, 8, 2]]);
		assert_eq!(models, expected);
	}

	#[test]
	fn test_six_queens_disjoint() {
		assert_eq!(queens(6).len(), 4);
	}

	#[test]
	#[ignore = "exhaustive enumeration of all 724 boards is slow"]
	fn test_ten_queens_disjoint() {
		assert_eq!(queens(10).len(), 724);
	}

	#[test]
	fn test_pigeonhole_permutations() {
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config {
			alldistinct_card: true,
			..Config::lazy_solve(4)
		});
		let t = s.true_lit();
		let vars: Vec<View> = (0..4).map(|_| n.create_view(Domain::new(1, 4))).collect();
		n.add_distinct(ReifiedAllDistinct::new(vars.clone(), t, Direction::Fwd));
		let models = solve_models(&mut s, &mut n, &vars, &[]).unwrap();
		assert_eq!(models.len(), 24);
	}

	#[test]
	fn test_non_lazy_binary_sum() {
		// Full order encoding, nothing translated: the lazy propagator does
		// all the pruning.
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config::non_lazy_solve());
		let t = s.true_lit();
		let x = n.create_view(Domain::new(0, 2));
		let y = n.create_view(Domain::new(0, 2));
		n.add_constraint(rlc(vec![x, y], Relation::Le, 2, t, Direction::Fwd));
		let models = solve_models(&mut s, &mut n, &[x, y], &[]).unwrap();
		assert_eq!(models.len(), 6);
	}

	#[test]
	fn test_pigeonhole_overfull_is_unsat() {
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config::lazy_solve(4));
		let t = s.true_lit();
		let vars: Vec<View> = (0..3).map(|_| n.create_view(Domain::new(0, 1))).collect();
		n.add_distinct(ReifiedAllDistinct::new(vars, t, Direction::Fwd));
		assert!(n.prepare(&mut s).is_err());
	}

	#[test]
	fn test_reified_domain_membership_counts() {
		// v in 1..10 with a reified membership in {5, 7}.
		let membership = |direction: Direction| {
			let mut s = TestEngine::default();
			let mut n = Normalizer::new(Config::translate());
			let v = n.create_view(Domain::new(1, 10));
			let lit = s.new_literal(true);
			let mut member = Domain::singleton(5);
			member.unify_bounds(7, 7);
			n.add_domain_constraint(ReifiedDomainConstraint {
				view: v,
				domain: member,
				v: lit,
				direction,
			});
			solve_models(&mut s, &mut n, &[v], &[lit]).unwrap().len()
		};
		// Equivalence pins the literal for every value of v.
		assert_eq!(membership(Direction::Eq), 10);
		// The forward half leaves the literal free inside the membership
		// set: 2·2 pairs inside plus 8 outside.
		assert_eq!(membership(Direction::Fwd), 12);
	}

	#[test]
	fn test_large_coefficient_equation() {
		// 100·a + 123456·c = 1234560 over wide domains; the residue class
		// of c modulo 25 admits exactly 13 solutions in 0..310. The low
		// thresholds keep the equation lazy, so the bounds of `a` are pinned
		// entirely by propagation over literals created during search.
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config {
			translate_constraints: 100,
			min_lits_per_var: 9,
			..Config::lazy_solve(4)
		});
		let t = s.true_lit();
		let c = n.create_view(Domain::new(0, 310));
		let a = n.create_view(Domain::new(-400_000, 400_000));
		n.add_constraint(rlc(
			vec![a * 100, c * 123456],
			Relation::Eq,
			1_234_560,
			t,
			Direction::Fwd,
		));
		let models = solve_models(&mut s, &mut n, &[a, c], &[]).unwrap();
		assert_eq!(models.len(), 13);
		assert!(models
			.iter()
			.all(|m| 100 * m[0] + 123456 * m[1] == 1_234_560));
		assert!(!n.variable_creator().domain(a.v).overflow());
		assert!(!s.out_of_range);
	}

	/// Enumerate the boards of the n-queens problem, encoded as three
	/// disjoint constraints over singleton groups.
	fn queens(size: i32) -> BTreeSet<Vec<SumVal>> {
		let mut s = TestEngine::default();
		let mut n = Normalizer::new(Config {
			alldistinct_card: true,
			..Config::lazy_solve(4)
		});
		let t = s.true_lit();
		let q: Vec<View> = (0..size)
			.map(|_| n.create_view(Domain::new(0, size - 1)))
			.collect();
		for offset in [0, 1, -1] {
			let groups: Vec<Vec<View>> = q
				.iter()
				.enumerate()
				.map(|(i, v)| vec![*v + offset * i as i32])
				.collect();
			n.add_disjoint(ReifiedDisjoint {
				groups,
				v: t,
				direction: Direction::Fwd,
			});
		}
		solve_models(&mut s, &mut n, &q, &[]).unwrap()
	}
}
