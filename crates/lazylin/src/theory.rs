//! The ground theory-atom input surface.
//!
//! The parser collaborator delivers constraints as a stream of tagged
//! records over numeric view identifiers; the [`TheoryBuilder`] lifts them
//! into the internal constraint types and feeds a [`Normalizer`]. Domains
//! arrive as [`RangeList`] values and are validated against the
//! representable 32-bit value range at this boundary.

use std::collections::HashMap;

use rangelist::RangeList;

use crate::{
	config::Config,
	constraint::{
		Direction, LinearConstraint, ReifiedAllDistinct, ReifiedDisjoint, ReifiedDomainConstraint,
		ReifiedLinearConstraint, Relation,
	},
	domain::Domain,
	normalizer::Normalizer,
	solver::Lit,
	view::View,
	CoreError, IntVal, SumVal,
};

#[derive(Clone, Debug)]
/// A ground record delivered by the theory parser.
pub enum TheoryRecord {
	/// A linear sum constraint `Σ coeffs·views rel rhs`, reified.
	Sum {
		/// Coefficient and view identifier per term.
		terms: Vec<(IntVal, u32)>,
		/// The comparison relation.
		rel: Relation,
		/// The right-hand side.
		rhs: IntVal,
		/// The reification literal.
		lit: Lit,
		/// The implication direction.
		direction: Direction,
	},
	/// A domain membership constraint, reified.
	Dom {
		/// The constrained view.
		view: u32,
		/// The member values.
		ranges: RangeList<SumVal>,
		/// The reification literal.
		lit: Lit,
		/// The implication direction.
		direction: Direction,
	},
	/// An all-distinct constraint over views, reified.
	Distinct {
		/// The views that must differ pairwise.
		views: Vec<u32>,
		/// The reification literal.
		lit: Lit,
		/// The implication direction.
		direction: Direction,
	},
	/// A disjoint constraint over groups of views, reified.
	Disjoint {
		/// The groups whose occupied values must not intersect.
		groups: Vec<Vec<u32>>,
		/// The reification literal.
		lit: Lit,
		/// The implication direction.
		direction: Direction,
	},
	/// Minimize a view at a priority level.
	Minimize {
		/// The view to minimize.
		view: u32,
		/// The priority level.
		level: u32,
	},
	/// Name a view for model output.
	Show {
		/// The view to show.
		view: u32,
		/// The output name.
		name: String,
	},
}

#[derive(Debug)]
/// Lifts theory records into a [`Normalizer`].
pub struct TheoryBuilder {
	/// The normalizer being fed.
	normalizer: Normalizer,
	/// Views by their external identifier, created on first reference.
	views: HashMap<u32, View>,
	/// Views named for model output.
	shown: Vec<(View, String)>,
}

impl TheoryBuilder {
	/// Create a builder over a fresh normalizer.
	pub fn new(config: Config) -> Self {
		Self {
			normalizer: Normalizer::new(config),
			views: HashMap::new(),
			shown: Vec::new(),
		}
	}

	/// Lift one record into the normalizer.
	pub fn add(&mut self, record: TheoryRecord) -> Result<(), CoreError> {
		match record {
			TheoryRecord::Sum {
				terms,
				rel,
				rhs,
				lit,
				direction,
			} => {
				let mut l = LinearConstraint::new(rel);
				for (coeff, id) in terms {
					if coeff == 0 {
						continue;
					}
					l.add_term(self.view(id) * coeff);
				}
				l.add_rhs(rhs);
				self.normalizer
					.add_constraint(ReifiedLinearConstraint::new(l, lit, direction));
			}
			TheoryRecord::Dom {
				view,
				ranges,
				lit,
				direction,
			} => {
				let domain = domain_from_ranges(&ranges)?;
				let view = self.view(view);
				self.normalizer.add_domain_constraint(ReifiedDomainConstraint {
					view,
					domain,
					v: lit,
					direction,
				});
			}
			TheoryRecord::Distinct {
				views,
				lit,
				direction,
			} => {
				let views = views.into_iter().map(|id| self.view(id)).collect();
				self.normalizer
					.add_distinct(ReifiedAllDistinct::new(views, lit, direction));
			}
			TheoryRecord::Disjoint {
				groups,
				lit,
				direction,
			} => {
				let groups = groups
					.into_iter()
					.map(|g| g.into_iter().map(|id| self.view(id)).collect())
					.collect();
				self.normalizer.add_disjoint(ReifiedDisjoint {
					groups,
					v: lit,
					direction,
				});
			}
			TheoryRecord::Minimize { view, level } => {
				let view = self.view(view);
				self.normalizer.add_minimize(view, level);
			}
			TheoryRecord::Show { view, name } => {
				let view = self.view(view);
				self.shown.push((view, name));
			}
		}
		Ok(())
	}

	/// Hand over the fed normalizer and the named views.
	pub fn finish(self) -> (Normalizer, Vec<(View, String)>) {
		(self.normalizer, self.shown)
	}

	/// Direct access to the normalizer being fed.
	pub fn normalizer_mut(&mut self) -> &mut Normalizer {
		&mut self.normalizer
	}

	/// The view registered under an identifier, created over the full
	/// representable domain on first reference.
	fn view(&mut self, id: u32) -> View {
		if let Some(view) = self.views.get(&id) {
			return *view;
		}
		let view = self.normalizer.create_view_full();
		let _ = self.views.insert(id, view);
		view
	}
}

/// Convert an input range list into a domain, validating the 32-bit value
/// range.
fn domain_from_ranges(ranges: &RangeList<SumVal>) -> Result<Domain, CoreError> {
	let mut domain = Domain::new(1, 0);
	for r in ranges.iter() {
		let (l, u) = (*r.start(), *r.end());
		if l < SumVal::from(Domain::MIN) || u > SumVal::from(Domain::MAX) {
			return Err(CoreError::VariableOutOfRange);
		}
		domain.unify_bounds(l as IntVal, u as IntVal);
	}
	Ok(domain)
}

#[cfg(test)]
mod tests {
	use rangelist::RangeList;

	use crate::{
		config::Config,
		constraint::{Direction, Relation},
		solver::SatEngine,
		tests::TestEngine,
		theory::{TheoryBuilder, TheoryRecord},
		CoreError,
	};

	#[test]
	fn test_records_feed_normalizer() {
		let mut s = TestEngine::default();
		let mut b = TheoryBuilder::new(Config::default());
		let t = s.true_lit();
		b.add(TheoryRecord::Dom {
			view: 0,
			ranges: RangeList::from(1..=9),
			lit: t,
			direction: Direction::Eq,
		})
		.unwrap();
		b.add(TheoryRecord::Sum {
			terms: vec![(1, 0), (1, 1)],
			rel: Relation::Le,
			rhs: 4,
			lit: t,
			direction: Direction::Fwd,
		})
		.unwrap();
		b.add(TheoryRecord::Dom {
			view: 1,
			ranges: RangeList::from(0..=9),
			lit: t,
			direction: Direction::Eq,
		})
		.unwrap();
		b.add(TheoryRecord::Show {
			view: 0,
			name: "x".to_owned(),
		})
		.unwrap();

		let (mut n, shown) = b.finish();
		assert!(n.prepare(&mut s).is_ok());
		assert_eq!(shown.len(), 1);
		// x ranges over 1..9 but the sum bounds it by 4: positions 0..=3 of
		// the original domain survive eager propagation.
		let x = shown[0].0;
		let d = n.variable_creator().domain(x.v);
		assert_eq!((d.lower(), d.upper()), (1, 9));
		assert_eq!(n.pre_search_bounds(x.v), (0, 3));
	}

	#[test]
	fn test_out_of_range_domain_is_rejected() {
		let mut b = TheoryBuilder::new(Config::default());
		let t = crate::solver::Lit::from_raw(std::num::NonZeroI32::new(1).unwrap());
		let res = b.add(TheoryRecord::Dom {
			view: 0,
			ranges: RangeList::from(0..=i64::MAX - 2),
			lit: t,
			direction: Direction::Eq,
		});
		assert_eq!(res, Err(CoreError::VariableOutOfRange));
	}
}
