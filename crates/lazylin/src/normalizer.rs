//! The offline normalization pipeline.
//!
//! Constraints are collected, simplified against the engine's fixed
//! literals, reduced by equality processing, decomposed into reified `≤`
//! implications, propagated to a fixpoint, and finally either translated
//! into clauses or kept for lazy propagation during search. The phases run
//! strictly in this order: variable domains may only shrink while no order
//! literal exists, and every literal table is indexed by the domain
//! positions frozen at the end of the domain-calculation phases.

use tracing::{debug, info_span};

use crate::{
	config::Config,
	constraint::{
		Direction, LinearConstraint, ReifiedAllDistinct, ReifiedDisjoint, ReifiedDomainConstraint,
		ReifiedLinearConstraint, Relation,
	},
	domain::Domain,
	equality::EqualityProcessor,
	helpers::{div_ceil, div_floor},
	propagate::linear::LinearPropagator,
	solver::{Lit, SatEngine},
	storage::VariableCreator,
	translate::Translator,
	view::{lower_bound, View},
	Clause, CoreError, IntVal, SumVal,
};

#[derive(Debug)]
/// Drives normalization and owns the shared variable state.
///
/// After [`Self::prepare`] and [`Self::finalize`] succeed, the creator and
/// the remaining lazy constraints are frozen and may be shared by any number
/// of search threads.
pub struct Normalizer {
	/// The shared variable state.
	vc: VariableCreator,
	/// The configuration in effect.
	config: Config,
	/// Collected reified linear constraints, consumed by `prepare`.
	linear: Vec<ReifiedLinearConstraint>,
	/// Collected reified domain constraints.
	domains: Vec<ReifiedDomainConstraint>,
	/// Collected reified all-distinct constraints.
	distincts: Vec<ReifiedAllDistinct>,
	/// Collected reified disjoint constraints.
	disjoints: Vec<ReifiedDisjoint>,
	/// Views to minimize, with their priority levels.
	minimize: Vec<(View, u32)>,
	/// Equality classes detected during preparation.
	equality: EqualityProcessor,
	/// The eager propagator, alive between `prepare` and `finalize`.
	propagator: LinearPropagator,
	/// Implications kept for lazy propagation, filled by `finalize`.
	lazy: Vec<ReifiedLinearConstraint>,
	/// Whether `prepare` has completed.
	prepared: bool,
}

impl Normalizer {
	/// Create a normalizer with the given configuration.
	pub fn new(config: Config) -> Self {
		Self {
			vc: VariableCreator::default(),
			config,
			linear: Vec::new(),
			domains: Vec::new(),
			distincts: Vec::new(),
			disjoints: Vec::new(),
			minimize: Vec::new(),
			equality: EqualityProcessor::new(),
			propagator: LinearPropagator::default(),
			lazy: Vec::new(),
			prepared: false,
		}
	}

	/// Add a reified linear constraint.
	pub fn add_constraint(&mut self, rl: ReifiedLinearConstraint) {
		debug_assert!(!self.prepared);
		self.linear.push(rl);
	}

	/// Add a reified domain membership constraint.
	pub fn add_domain_constraint(&mut self, rdc: ReifiedDomainConstraint) {
		debug_assert!(!self.prepared);
		self.domains.push(rdc);
	}

	/// Add a reified all-distinct constraint.
	pub fn add_distinct(&mut self, d: ReifiedAllDistinct) {
		debug_assert!(!self.prepared);
		self.distincts.push(d);
	}

	/// Add a reified disjoint constraint.
	pub fn add_disjoint(&mut self, d: ReifiedDisjoint) {
		debug_assert!(!self.prepared);
		self.disjoints.push(d);
	}

	/// Minimize a view at the given priority level.
	pub fn add_minimize(&mut self, view: View, level: u32) {
		self.minimize.push((view, level));
	}

	/// Whether the eager propagation queue is drained.
	pub fn at_fixpoint(&self) -> bool {
		self.propagator.at_fixpoint()
	}

	/// The configuration in effect.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The implications kept for lazy propagation; valid after
	/// [`Self::finalize`]. Every entry is a forward implication.
	pub fn constraints(&self) -> &[ReifiedLinearConstraint] {
		debug_assert!(self.lazy.iter().all(|rl| rl.direction.fwd()));
		&self.lazy
	}

	/// Create an identity view over a fresh variable with the given domain.
	pub fn create_view(&mut self, domain: Domain) -> View {
		debug_assert!(!self.prepared);
		self.vc.create_view(domain)
	}

	/// Create an identity view over the full representable domain.
	pub fn create_view_full(&mut self) -> View {
		self.create_view(Domain::full())
	}

	/// An over-approximation of the Boolean variables finalization will
	/// allocate.
	pub fn estimate_variables(&self) -> u64 {
		let per_var: u64 = self
			.vc
			.variables()
			.map(|v| {
				let thresholds = self.vc.domain(v).size().saturating_sub(1);
				if self.config.min_lits_per_var < 0 {
					2 * thresholds
				} else {
					2 * thresholds.min(self.config.min_lits_per_var as u64)
				}
			})
			.sum();
		let pairs: u64 = self
			.distincts
			.iter()
			.map(|d| {
				let n = d.views().len() as u64;
				n * n.saturating_sub(1)
			})
			.sum();
		per_var + pairs
	}

	/// The equality literal for `view == value`, creating it if needed.
	pub fn get_equal_lit<S: SatEngine>(&mut self, s: &mut S, view: View, value: IntVal) -> Lit {
		let mut l =
			LinearConstraint::with_terms(vec![view], Relation::Eq, value);
		l.normalize();
		self.lit_from_unary(s, &l)
	}

	/// The literal equivalent to a normalized constraint with at most one
	/// view, resolved against the order and equality literal tables.
	pub fn lit_from_unary<S: SatEngine>(&mut self, s: &mut S, l: &LinearConstraint) -> Lit {
		debug_assert!(l.normalized());
		debug_assert!(l.views().len() <= 1);
		let rhs = SumVal::from(l.rhs());
		if l.views().is_empty() {
			let truth = match l.relation() {
				Relation::Le => 0 <= rhs,
				Relation::Lt => 0 < rhs,
				Relation::Ge => 0 >= rhs,
				Relation::Gt => 0 > rhs,
				Relation::Eq => 0 == rhs,
				Relation::Ne => 0 != rhs,
			};
			return if truth { s.true_lit() } else { s.false_lit() };
		}

		let view = l.views()[0];
		let domain = self.vc.domain(view.v).clone();
		let r = crate::view::Restrictor::new(view, &domain);
		let it = lower_bound(&r.begin(), &r.end(), rhs);
		match l.relation() {
			Relation::Eq | Relation::Ne => {
				let it = if !it.at_end() && it.value() == rhs {
					it
				} else {
					r.end()
				};
				let eq = self.vc.get_equal_literal(s, &it);
				// Not-equal resolves to the negated equality literal.
				if l.relation() == Relation::Ne {
					!eq
				} else {
					eq
				}
			}
			Relation::Le => {
				if it.at_end() {
					// Every value satisfies the bound.
					s.true_lit()
				} else if it.value() == rhs {
					self.vc.get_le_literal(s, &it)
				} else if it.num_element() == 0 {
					s.false_lit()
				} else {
					let mut below = it;
					below.advance(-1);
					self.vc.get_le_literal(s, &below)
				}
			}
			_ => unreachable!("normalized constraints compare with ≤, = or ≠"),
		}
	}

	/// Run the preparation phases: simple domain derivation to a fixpoint,
	/// equality processing, decomposition, and eager propagation.
	pub fn prepare<S: SatEngine>(&mut self, s: &mut S) -> Result<(), CoreError> {
		let span = info_span!("prepare");
		let _e = span.enter();
		debug_assert!(!self.prepared);

		for rl in &mut self.linear {
			rl.normalize();
		}
		self.calculate_domains(s)?;
		if self.config.equality_processing {
			self.equality
				.process(s, &mut self.vc, &self.config, &mut self.linear)?;
			self.substitute_collected()?;
			self.calculate_domains(s)?;
		}
		self.decompose_disjoints();
		self.decompose_distincts(s)?;

		self.propagator = LinearPropagator::new(&self.vc);
		let collected = std::mem::take(&mut self.linear);
		for rl in collected {
			self.convert_linear(s, rl)?;
		}
		self.propagator.propagate(s, &self.vc)?;
		self.prepared = true;
		Ok(())
	}

	/// Re-run eager propagation to a fixpoint.
	pub fn propagate<S: SatEngine>(&mut self, s: &mut S) -> Result<(), CoreError> {
		self.propagator.propagate(s, &self.vc)
	}

	/// Run the final phases: the encoding decision per constraint, the
	/// translation of the remaining constraints, order-literal
	/// materialization, backbone clauses, and the minimize objective.
	pub fn finalize<S: SatEngine>(&mut self, s: &mut S) -> Result<(), CoreError> {
		let span = info_span!("finalize");
		let _e = span.enter();
		debug_assert!(self.prepared);
		let translator = Translator::new(self.config);

		// Per-constraint encoding decision.
		let implications = self.propagator.remove_constraints();
		for rl in implications {
			if s.is_false(rl.v) {
				continue;
			}
			if translator.should_translate(&self.vc, &rl.l) {
				translator.translate_linear_implication(s, &mut self.vc, &rl)?;
			} else {
				self.lazy.push(rl);
			}
		}

		for rdc in std::mem::take(&mut self.domains) {
			translator.translate_domain_constraint(s, &mut self.vc, &rdc)?;
		}
		for d in std::mem::take(&mut self.distincts) {
			translator.translate_distinct_cardinality(s, &mut self.vc, &d)?;
		}
		for d in std::mem::take(&mut self.disjoints) {
			translator.translate_disjoint(s, &mut self.vc, &d)?;
		}

		// Materialize order literals and assert the bounds found eagerly.
		if self.config.min_lits_per_var != 0 {
			for v in self.vc.variables().collect::<Vec<_>>() {
				self.vc
					.create_order_literals(s, v, self.config.min_lits_per_var);
			}
		}
		let vs = self.propagator.variable_storage().clone();
		for v in self.vc.variables().collect::<Vec<_>>() {
			let (lb, ub) = vs.positions(v);
			let size = self.vc.domain(v).size();
			if lb > 0 {
				let lit = self.vc.order_lit_at(s, v, lb - 1);
				if !s.add_clause(&[!lit]) {
					return Err(CoreError::Unsatisfiable);
				}
			}
			if ub + 1 < size {
				let lit = self.vc.order_lit_at(s, v, ub);
				if !s.add_clause(&[lit]) {
					return Err(CoreError::Unsatisfiable);
				}
			}
		}

		translator.create_order_clauses(s, &self.vc)?;
		translator.create_equal_clauses(s, &mut self.vc)?;
		self.translate_minimize(s);
		Ok(())
	}

	/// The bound positions a variable reached during eager propagation,
	/// inclusive, into its original domain.
	pub fn pre_search_bounds(&self, v: crate::storage::Variable) -> (u64, u64) {
		self.propagator.variable_storage().positions(v)
	}

	/// The shared variable state.
	pub fn variable_creator(&self) -> &VariableCreator {
		&self.vc
	}

	/// Mutable access to the shared variable state.
	pub fn variable_creator_mut(&mut self) -> &mut VariableCreator {
		&mut self.vc
	}

	/// Repeatedly derive domain restrictions from unary-or-nullary
	/// constraints whose literals are already decided, until nothing
	/// changes.
	fn calculate_domains<S: SatEngine>(&mut self, s: &mut S) -> Result<(), CoreError> {
		loop {
			let mut changed = false;

			let domains = std::mem::take(&mut self.domains);
			for rdc in domains {
				if self.derive_domain_constraint(s, &rdc)? {
					changed = true;
				} else {
					self.domains.push(rdc);
				}
			}

			let linear = std::mem::take(&mut self.linear);
			for rl in linear {
				if rl.l.views().len() <= 1 && self.derive_unary(s, &rl)? {
					changed = true;
				} else {
					self.linear.push(rl);
				}
			}

			if !changed {
				return Ok(());
			}
		}
	}

	/// Decompose every reified linear constraint into forward `≤`
	/// implications on the eager propagator.
	fn convert_linear<S: SatEngine>(
		&mut self,
		s: &mut S,
		mut rl: ReifiedLinearConstraint,
	) -> Result<(), CoreError> {
		rl.normalize();
		if rl.l.views().len() <= 1 {
			// Unary constraints collapse onto order and equality literals.
			let u = self.lit_from_unary(s, &rl.l);
			if rl.direction.fwd() && !s.add_clause(&[!rl.v, u]) {
				return Err(CoreError::Unsatisfiable);
			}
			if rl.direction.back() && !self.config.dontcare && !s.add_clause(&[!u, rl.v]) {
				return Err(CoreError::Unsatisfiable);
			}
			return Ok(());
		}

		match rl.l.relation() {
			Relation::Le => {
				if rl.direction.fwd() {
					self.propagator
						.add_imp(ReifiedLinearConstraint::new(rl.l.clone(), rl.v, Direction::Fwd));
				}
				if rl.direction.back() && !self.config.dontcare {
					// ¬lit → lhs > rhs, expressed as a mirrored strict bound.
					self.propagator.add_imp(ReifiedLinearConstraint::new(
						negated_strict(&rl.l),
						!rl.v,
						Direction::Fwd,
					));
				}
			}
			Relation::Eq => {
				if rl.direction.fwd() {
					let mut le = rl.l.clone();
					le.set_relation(Relation::Le);
					le.normalize();
					self.propagator
						.add_imp(ReifiedLinearConstraint::new(le, rl.v, Direction::Fwd));
					self.propagator.add_imp(ReifiedLinearConstraint::new(
						mirrored(&rl.l),
						rl.v,
						Direction::Fwd,
					));
				}
				if rl.direction.back() && !self.config.dontcare {
					// ¬lit → lhs ≠ rhs, split over two fresh halves.
					let below = s.new_literal(true);
					let above = s.new_literal(true);
					let mut less = rl.l.clone();
					less.set_relation(Relation::Le);
					less.add_rhs(-1);
					less.normalize();
					self.propagator
						.add_imp(ReifiedLinearConstraint::new(less, below, Direction::Fwd));
					self.propagator.add_imp(ReifiedLinearConstraint::new(
						negated_strict(&rl.l),
						above,
						Direction::Fwd,
					));
					if !s.add_clause(&[rl.v, below, above]) {
						return Err(CoreError::Unsatisfiable);
					}
				}
			}
			_ => unreachable!("normalized constraints compare with ≤ or ="),
		}
		Ok(())
	}

	/// Turn disjoint constraints over singleton groups into all-distinct.
	fn decompose_disjoints(&mut self) {
		if !self.config.disjoint_to_distinct {
			return;
		}
		let disjoints = std::mem::take(&mut self.disjoints);
		for d in disjoints {
			if d.groups.iter().all(|g| g.len() == 1) {
				let views = d.groups.iter().map(|g| g[0]).collect();
				self.distincts
					.push(ReifiedAllDistinct::new(views, d.v, d.direction));
			} else {
				self.disjoints.push(d);
			}
		}
	}

	/// Decompose all-distinct constraints into pairwise disequalities,
	/// unless they are kept whole for cardinality translation. A constraint
	/// over more views than values is refuted outright.
	fn decompose_distincts<S: SatEngine>(&mut self, s: &mut S) -> Result<(), CoreError> {
		let distincts = std::mem::take(&mut self.distincts);
		for d in distincts {
			// Pigeonhole check against the union of the view domains.
			let mut union = crate::domain::WideDomain::new(1, 0);
			for view in d.views() {
				union.unify(&self.vc.view_domain(*view));
			}
			if (union.size() as usize) < d.views().len() {
				debug!(views = d.views().len(), values = union.size(), "all-distinct refuted");
				if d.direction.fwd() && !s.add_clause(&[!d.v]) {
					return Err(CoreError::Unsatisfiable);
				}
				continue;
			}

			if self.config.alldistinct_card && !d.direction.back() {
				self.distincts.push(d);
				continue;
			}

			let fact = s.is_true(d.v) && d.direction.fwd();
			let mut pair_lits = Vec::new();
			for i in 0..d.views().len() {
				for j in i + 1..d.views().len() {
					let l = LinearConstraint::with_terms(
						vec![d.views()[i], -d.views()[j]],
						Relation::Ne,
						0,
					);
					if fact {
						self.linear
							.push(ReifiedLinearConstraint::new(l, s.true_lit(), Direction::Fwd));
					} else {
						let p = s.new_literal(true);
						pair_lits.push(p);
						self.linear
							.push(ReifiedLinearConstraint::new(l, p, Direction::Eq));
					}
				}
			}
			if !fact {
				if d.direction.fwd() {
					for p in &pair_lits {
						if !s.add_clause(&[!d.v, *p]) {
							return Err(CoreError::Unsatisfiable);
						}
					}
				}
				if d.direction.back() {
					let mut clause: Clause = vec![d.v];
					clause.extend(pair_lits.iter().map(|p| !*p));
					if !s.add_clause(&clause) {
						return Err(CoreError::Unsatisfiable);
					}
				}
			}
		}
		Ok(())
	}

	/// Apply a decided domain constraint to its variable, returning whether
	/// it was consumed.
	fn derive_domain_constraint<S: SatEngine>(
		&mut self,
		s: &mut S,
		rdc: &ReifiedDomainConstraint,
	) -> Result<bool, CoreError> {
		let view = rdc.view;
		if s.is_true(rdc.v) && rdc.direction.fwd() {
			let allowed = transformed_member_domain(&rdc.domain, view);
			self.vc
				.constrain_domain(view.v, &allowed)
				.map_err(|_| CoreError::Unsatisfiable)?;
			return Ok(true);
		}
		if s.is_false(rdc.v) && rdc.direction.back() {
			let removed = transformed_member_domain(&rdc.domain, view);
			self.vc
				.domain_mut(view.v)
				.remove_domain(&removed)
				.map_err(|_| CoreError::Unsatisfiable)?;
			return Ok(true);
		}
		Ok(false)
	}

	/// Apply a decided unary-or-nullary linear constraint to its variable,
	/// returning whether it was consumed.
	fn derive_unary<S: SatEngine>(
		&mut self,
		s: &mut S,
		rl: &ReifiedLinearConstraint,
	) -> Result<bool, CoreError> {
		debug_assert!(rl.l.normalized());
		let rhs = SumVal::from(rl.l.rhs());

		if rl.l.views().is_empty() {
			let truth = match rl.l.relation() {
				Relation::Le => 0 <= rhs,
				Relation::Eq => 0 == rhs,
				_ => unreachable!("normalized constraints compare with ≤ or ="),
			};
			let unit = match (truth, rl.direction) {
				(false, d) if d.fwd() => Some(!rl.v),
				(true, d) if d.back() => Some(rl.v),
				_ => None,
			};
			if let Some(unit) = unit {
				if !s.add_clause(&[unit]) {
					return Err(CoreError::Unsatisfiable);
				}
			}
			return Ok(true);
		}

		let view = rl.l.views()[0];
		let a = SumVal::from(view.a);
		if s.is_true(rl.v) && rl.direction.fwd() {
			let d = self.vc.domain_mut(view.v);
			match rl.l.relation() {
				Relation::Le => {
					// a·v ≤ rhs bounds v on the side of the coefficient.
					if a > 0 {
						d.intersect_bounds(IntVal::MIN, div_floor(rhs, a) as IntVal)
					} else {
						d.intersect_bounds(div_ceil(rhs, a) as IntVal, IntVal::MAX)
					}
				}
				Relation::Eq => {
					if rhs % a != 0 {
						return Err(CoreError::Unsatisfiable);
					}
					let x = (rhs / a) as IntVal;
					d.intersect_bounds(x, x)
				}
				_ => unreachable!("normalized constraints compare with ≤ or ="),
			}
			.map_err(|_| CoreError::Unsatisfiable)?;
			return Ok(true);
		}
		if s.is_false(rl.v) && rl.direction.back() {
			let d = self.vc.domain_mut(view.v);
			match rl.l.relation() {
				Relation::Le => {
					// ¬(a·v ≤ rhs): the bound flips strictly.
					if a > 0 {
						d.intersect_bounds(div_floor(rhs, a) as IntVal + 1, IntVal::MAX)
					} else {
						d.intersect_bounds(IntVal::MIN, div_ceil(rhs, a) as IntVal - 1)
					}
					.map_err(|_| CoreError::Unsatisfiable)?;
				}
				Relation::Eq => {
					if rhs % a == 0 {
						d.remove((rhs / a) as IntVal)
							.map_err(|_| CoreError::Unsatisfiable)?;
					}
				}
				_ => unreachable!("normalized constraints compare with ≤ or ="),
			}
			return Ok(true);
		}
		Ok(false)
	}

	/// Substitute equality-class representatives into the non-linear
	/// constraint collections.
	fn substitute_collected(&mut self) -> Result<(), CoreError> {
		for rdc in &mut self.domains {
			if let Ok(view) = self.equality.substitute_view(rdc.view) {
				rdc.view = view;
			}
		}
		let distincts = std::mem::take(&mut self.distincts);
		for d in distincts {
			let views = d
				.views()
				.iter()
				.map(|v| self.equality.substitute_view(*v).unwrap_or(*v))
				.collect();
			self.distincts
				.push(ReifiedAllDistinct::new(views, d.v, d.direction));
		}
		for d in &mut self.disjoints {
			for group in &mut d.groups {
				for view in group.iter_mut() {
					*view = self.equality.substitute_view(*view).unwrap_or(*view);
				}
			}
		}
		for (view, _) in &mut self.minimize {
			*view = self.equality.substitute_view(*view).unwrap_or(*view);
		}
		Ok(())
	}

	/// Encode the minimize objective: the base weight of each view plus a
	/// weighted literal per threshold transition.
	fn translate_minimize<S: SatEngine>(&mut self, s: &mut S) {
		for (view, level) in std::mem::take(&mut self.minimize) {
			let domain = self.vc.domain(view.v).clone();
			let r = crate::view::Restrictor::new(view, &domain);
			if r.is_empty() {
				continue;
			}
			let true_lit = s.true_lit();
			s.add_minimize(true_lit, r.lower(), level);
			let mut it = r.begin();
			let mut prev = it.value();
			it.advance(1);
			while it != r.end() {
				let step = it.value() - prev;
				let mut below = it.clone();
				below.advance(-1);
				let lit = self.vc.get_le_literal(s, &below);
				// Exceeding the threshold costs the distance to the next value.
				s.add_minimize(!lit, step, level);
				prev = it.value();
				it.advance(1);
			}
		}
	}
}

/// The mirrored constraint `-lhs ≤ -rhs`, normalized.
fn mirrored(l: &LinearConstraint) -> LinearConstraint {
	let views = l.views().iter().map(|v| -*v).collect();
	let mut m = LinearConstraint::with_terms(views, Relation::Le, -l.rhs());
	m.normalize();
	m
}

/// The strict mirrored constraint `-lhs ≤ -rhs - 1`, normalized: the
/// negation of `lhs ≤ rhs`.
fn negated_strict(l: &LinearConstraint) -> LinearConstraint {
	let views = l.views().iter().map(|v| -*v).collect();
	let mut m = LinearConstraint::with_terms(views, Relation::Le, -l.rhs() - 1);
	m.normalize();
	m
}

/// The variable values whose view image lies in `domain`: `(domain − c) / a`
/// with inexact quotients dropped.
fn transformed_member_domain(domain: &Domain, view: View) -> Domain {
	let mut d = domain.clone();
	d.shift(-view.c);
	let _ = d.divide(view.a);
	d
}
