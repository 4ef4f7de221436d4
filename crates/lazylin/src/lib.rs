//! # Lazylin - An Order-Encoding Integer Constraint Core
//!
//! Lazylin extends a CDCL-style Boolean search engine with integer variables
//! constrained by linear, domain-membership, all-distinct, and disjoint
//! constraints. Constraints are either translated into clauses and weight
//! constraints up front, when the translation is estimated to be small, or
//! kept as lazy propagators that tighten integer bounds along the Boolean
//! trail and answer violations with nogoods over order literals.
//!
//! The host search engine is not part of this crate: it is consumed through
//! the [`SatEngine`] trait, and the core exposes its half of the cooperation
//! as the [`OrderPropagator`] contract (`init` / `propagate` / `check` /
//! `undo`).

pub mod config;
pub mod constraint;
pub mod domain;
pub mod equality;
pub(crate) mod helpers;
pub mod normalizer;
pub mod order_propagator;
pub mod propagate;
pub mod solver;
pub mod storage;
#[cfg(test)]
pub(crate) mod tests;
pub mod theory;
pub mod translate;
pub mod view;

use std::num::NonZeroI32;

use thiserror::Error;

pub use crate::{
	config::Config,
	constraint::{Direction, LinearConstraint, Relation},
	normalizer::Normalizer,
	order_propagator::OrderPropagator,
	solver::{Lit, SatEngine},
	storage::{Variable, VariableCreator},
	view::View,
};

/// Type used for the values of integer variables.
///
/// Values are further bounded by [`domain::Domain::MIN`] and
/// [`domain::Domain::MAX`] so that pairwise addition of two in-range values
/// cannot overflow a 32-bit accumulator.
pub type IntVal = i32;

/// Type used for intermediate sums over variable values.
///
/// All accumulating arithmetic in the crate is performed at this width.
pub type SumVal = i64;

/// Type used for coefficients that must not be zero.
pub type NonZeroIntVal = NonZeroI32;

/// Type alias for a disjunction of literals (clause), used for internal type
/// documentation.
pub type Clause = Vec<Lit>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Error)]
#[error("domain became empty")]
/// Error signalling that a domain operation left no remaining values.
///
/// This is the sole signal of emptiness: it is a normal, recoverable outcome,
/// typically answered by falsifying the enclosing reification literal.
pub struct EmptyDomain;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
/// Fatal error conditions surfaced by the core.
pub enum CoreError {
	#[error("the problem is unsatisfiable")]
	/// The problem was refuted during normalization; no search is started.
	Unsatisfiable,
	#[error("an intermediate variable exceeded the representable value range")]
	/// A domain operation or view construction exceeded the representable
	/// 32-bit value range.
	VariableOutOfRange,
}
