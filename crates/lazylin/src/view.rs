//! Affine views of integer variables and the iterators used to traverse
//! their value sets.
//!
//! A [`View`] re-expresses a variable `v` as `a·v + c` without copying its
//! domain. A [`ViewIterator`] walks the values of a view in increasing
//! order, traversing the underlying domain backwards when the coefficient is
//! negative. A [`Restrictor`] is a pair of view iterators delineating the
//! currently active portion of a view's domain; its element positions always
//! refer to the full original domain, even when the active portion has
//! shrunk.

use std::ops::{Add, Mul, Neg};

use crate::{
	domain::{Domain, DomainIter},
	storage::Variable,
	IntVal, SumVal,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// An affine re-expression `a·v + c` of an integer variable `v`.
pub struct View {
	/// The underlying variable.
	pub v: Variable,
	/// The multiplicative coefficient.
	pub a: IntVal,
	/// The additive offset.
	pub c: IntVal,
}

#[derive(Clone, Debug)]
/// A random-access cursor over the values of a [`View`], in increasing value
/// order.
pub struct ViewIterator<'a> {
	/// The view whose values are traversed.
	view: View,
	/// Cursor into the underlying domain. For reversed views this cursor
	/// starts at the domain's end position and moves backwards, so the
	/// element it refers to is the one *before* the cursor.
	it: DomainIter<'a>,
	/// Position from the view's begin, irrespective of reversal.
	index: u64,
}

#[derive(Clone, Debug)]
/// The currently active portion of a view's domain, delineated by two view
/// iterators.
pub struct Restrictor<'a> {
	/// Iterator at the first active element.
	lower: ViewIterator<'a>,
	/// Iterator one past the last active element.
	upper: ViewIterator<'a>,
}

impl View {
	/// Create the identity view of a variable.
	pub fn new(v: Variable) -> Self {
		Self { v, a: 1, c: 0 }
	}

	/// Create the view `a·v + c`.
	pub fn with(v: Variable, a: IntVal, c: IntVal) -> Self {
		Self { v, a, c }
	}

	/// Apply the view to a value of the underlying variable.
	pub fn multiply(&self, x: IntVal) -> SumVal {
		SumVal::from(self.a) * SumVal::from(x) + SumVal::from(self.c)
	}

	/// Whether the view traverses the underlying domain in reverse.
	pub fn reversed(&self) -> bool {
		self.a < 0
	}
}

impl Add<IntVal> for View {
	type Output = View;

	fn add(self, rhs: IntVal) -> Self::Output {
		View {
			v: self.v,
			a: self.a,
			c: self.c + rhs,
		}
	}
}

impl Mul<IntVal> for View {
	type Output = View;

	fn mul(self, rhs: IntVal) -> Self::Output {
		View {
			v: self.v,
			a: self.a * rhs,
			c: self.c * rhs,
		}
	}
}

impl Neg for View {
	type Output = View;

	fn neg(self) -> Self::Output {
		self * -1
	}
}

impl<'a> ViewIterator<'a> {
	/// Cursor at the first (smallest) value of the view over `domain`.
	pub fn begin(view: View, domain: &'a Domain) -> Self {
		let it = if view.reversed() {
			domain.iter_end()
		} else {
			domain.iter()
		};
		Self { view, it, index: 0 }
	}

	/// Cursor one past the last value of the view over `domain`.
	pub fn end(view: View, domain: &'a Domain) -> Self {
		let it = if view.reversed() {
			domain.iter()
		} else {
			domain.iter_end()
		};
		Self {
			view,
			it,
			index: domain.size(),
		}
	}

	/// Cursor at the given position from the view's begin.
	pub fn at(view: View, domain: &'a Domain, index: u64) -> Self {
		let mut it = Self::begin(view, domain);
		it.advance(index as i64);
		it
	}

	/// Move the cursor `n` positions forward (or backward when negative).
	pub fn advance(&mut self, n: i64) {
		self.index = (self.index as i64 + n) as u64;
		if self.view.reversed() {
			self.it.advance(-n);
		} else {
			self.it.advance(n);
		}
	}

	/// Return true when the cursor is one past the last value.
	pub fn at_end(&self) -> bool {
		self.index == self.it.domain().size()
	}

	/// The number of positions from `self` to `other`.
	pub fn distance_to(&self, other: &ViewIterator<'_>) -> i64 {
		debug_assert_eq!(self.view, other.view);
		other.index as i64 - self.index as i64
	}

	/// The underlying domain.
	pub fn domain(&self) -> &'a Domain {
		self.it.domain()
	}

	/// Position from the view's begin, irrespective of reversal.
	pub fn num_element(&self) -> u64 {
		self.index
	}

	/// Convert to an iterator of the identity view `(a=1, c=0)` pointing at
	/// the same position in the underlying domain.
	pub fn to_var_iterator(&self) -> ViewIterator<'a> {
		let domain = self.it.domain();
		if !self.view.reversed() {
			return ViewIterator {
				view: View::new(self.view.v),
				it: domain.iter_at(self.index.min(domain.size())),
				index: self.index,
			};
		}
		let size = domain.size();
		if self.index == size {
			ViewIterator::end(View::new(self.view.v), domain)
		} else {
			let pos = size - 1 - self.index;
			ViewIterator {
				view: View::new(self.view.v),
				it: domain.iter_at(pos),
				index: pos,
			}
		}
	}

	/// The value at the cursor.
	///
	/// The cursor must not be at the end position.
	pub fn value(&self) -> SumVal {
		debug_assert!(!self.at_end());
		if self.view.reversed() {
			let mut prev = self.it.clone();
			prev.advance(-1);
			self.view.multiply(prev.value())
		} else {
			self.view.multiply(self.it.value())
		}
	}

	/// The view whose values are traversed.
	pub fn view(&self) -> View {
		self.view
	}
}

impl PartialEq for ViewIterator<'_> {
	fn eq(&self, other: &Self) -> bool {
		debug_assert_eq!(self.view, other.view);
		self.index == other.index
	}
}

impl Eq for ViewIterator<'_> {}

/// Return the first cursor in `[first, last)` whose value is not less than
/// `value`, or `last` if no such cursor exists. Works for reversed views.
pub fn lower_bound<'a>(
	first: &ViewIterator<'a>,
	last: &ViewIterator<'a>,
	value: SumVal,
) -> ViewIterator<'a> {
	let mut first = first.clone();
	let mut count = first.distance_to(last);
	debug_assert!(count >= 0);
	while count > 0 {
		let step = count / 2;
		let mut mid = first.clone();
		mid.advance(step);
		if mid.value() < value {
			mid.advance(1);
			first = mid;
			count -= step + 1;
		} else {
			count = step;
		}
	}
	first
}

/// Return the first cursor in `[first, last)` whose value is greater than
/// `value`, or `last` if no such cursor exists. Works for reversed views.
pub fn upper_bound<'a>(
	first: &ViewIterator<'a>,
	last: &ViewIterator<'a>,
	value: SumVal,
) -> ViewIterator<'a> {
	let mut first = first.clone();
	let mut count = first.distance_to(last);
	debug_assert!(count >= 0);
	while count > 0 {
		let step = count / 2;
		let mut mid = first.clone();
		mid.advance(step);
		if mid.value() <= value {
			mid.advance(1);
			first = mid;
			count -= step + 1;
		} else {
			count = step;
		}
	}
	first
}

impl<'a> Restrictor<'a> {
	/// The active portion covering the full domain of the view.
	pub fn new(view: View, domain: &'a Domain) -> Self {
		Self {
			lower: ViewIterator::begin(view, domain),
			upper: ViewIterator::end(view, domain),
		}
	}

	/// Re-express an identity-view restrictor under `view`, keeping the same
	/// active portion of the underlying domain.
	///
	/// The incoming restrictor must carry an identity view on the same
	/// variable.
	pub fn compose(view: View, r: &Restrictor<'a>) -> Self {
		debug_assert_eq!(r.lower.view().v, view.v);
		debug_assert_eq!(r.lower.view().a, 1);
		debug_assert_eq!(r.lower.view().c, 0);
		let domain = r.lower.domain();
		if !view.reversed() {
			return Self {
				lower: ViewIterator {
					view,
					it: domain.iter_at(r.lower.index),
					index: r.lower.index,
				},
				upper: ViewIterator {
					view,
					it: domain.iter_at(r.upper.index),
					index: r.upper.index,
				},
			};
		}
		let size = domain.size();
		Self {
			lower: ViewIterator {
				view,
				it: domain.iter_at(r.upper.index),
				index: size - r.upper.index,
			},
			upper: ViewIterator {
				view,
				it: domain.iter_at(r.lower.index),
				index: size - r.lower.index,
			},
		}
	}

	/// Build a restrictor from an explicit iterator pair.
	pub fn from_iters(lower: ViewIterator<'a>, upper: ViewIterator<'a>) -> Self {
		Self { lower, upper }
	}

	/// Iterator at the first active element.
	pub fn begin(&self) -> ViewIterator<'a> {
		self.lower.clone()
	}

	/// Iterator one past the last active element.
	pub fn end(&self) -> ViewIterator<'a> {
		self.upper.clone()
	}

	/// Return true if no elements are active.
	pub fn is_empty(&self) -> bool {
		self.lower == self.upper
	}

	/// Compare two restrictors over the same underlying view.
	pub fn is_subset_eq_of(&self, other: &Restrictor<'_>) -> bool {
		debug_assert_eq!(self.lower.view(), other.lower.view());
		self.lower.index >= other.lower.index && self.upper.index <= other.upper.index
	}

	/// The smallest active value.
	pub fn lower(&self) -> SumVal {
		self.lower.value()
	}

	/// The number of active elements.
	pub fn size(&self) -> u64 {
		self.lower.distance_to(&self.upper) as u64
	}

	/// The largest active value.
	pub fn upper(&self) -> SumVal {
		let mut it = self.upper.clone();
		it.advance(-1);
		it.value()
	}
}
