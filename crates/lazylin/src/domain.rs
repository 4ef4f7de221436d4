//! Finite integer domains represented as ordered, non-overlapping,
//! non-touching ranges.
//!
//! A [`Domain`] stores 32-bit values bounded by [`Domain::MIN`] and
//! [`Domain::MAX`]; the headroom guarantees that the pairwise sum of two
//! in-range values fits a 32-bit accumulator. Operations that would exceed
//! the bounds set the overflow flag and clamp the affected endpoints, which
//! keeps the element set an over-approximation; callers must check
//! [`Domain::overflow`] before trusting the result and treat the flag as
//! fatal. A [`WideDomain`] is the 64-bit companion type used for the value
//! sets of affine views.

use std::{cell::Cell, fmt};

use crate::{
	helpers::{div_ceil, div_floor, gcd},
	EmptyDomain, IntVal, SumVal,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A contiguous set of integers `{l, …, u}` with `l <= u`.
pub struct Range {
	/// The smallest value of the range.
	pub l: IntVal,
	/// The largest value of the range.
	pub u: IntVal,
}

#[derive(Clone, Debug)]
/// A finite set of integers stored as a strictly increasing sequence of
/// ranges, where successive ranges neither overlap nor touch.
pub struct Domain {
	/// The ranges making up the domain.
	ranges: Vec<Range>,
	/// Cached number of elements, valid unless `modified` is set.
	size: Cell<u64>,
	/// Whether the size cache needs to be recomputed.
	modified: Cell<bool>,
	/// Set when an operation exceeded the representable value range.
	overflow: bool,
}

#[derive(Clone, Copy, Debug)]
/// A random-access cursor into the element sequence of a [`Domain`].
///
/// Positions are counted over elements, not ranges: advancing past a range
/// boundary rolls over into the next range. The cursor one past the last
/// element is the end position.
pub struct DomainIter<'a> {
	/// The domain being traversed.
	domain: &'a Domain,
	/// Index of the current range.
	index: usize,
	/// Offset of the current element from the current range's lower bound.
	steps: u64,
	/// Global element position, `domain.size()` at the end position.
	pos: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A contiguous set of 64-bit integers.
pub struct WideRange {
	/// The smallest value of the range.
	pub l: SumVal,
	/// The largest value of the range.
	pub u: SumVal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// The 64-bit companion of [`Domain`], holding the value set of an affine
/// view `a·v + c`. Construction cannot overflow; only simple queries and
/// unification are supported.
pub struct WideDomain {
	/// The ranges making up the domain.
	ranges: Vec<WideRange>,
}

impl Range {
	/// The number of values in the range.
	pub fn size(&self) -> u64 {
		(SumVal::from(self.u) - SumVal::from(self.l) + 1) as u64
	}
}

impl Domain {
	/// Largest representable value of a domain element.
	pub const MAX: IntVal = IntVal::MAX / 2 - 1;
	/// Smallest representable value of a domain element.
	pub const MIN: IntVal = IntVal::MIN / 2 + 2;

	/// Create the maximal domain `MIN..=MAX`.
	pub fn full() -> Self {
		Self::new(Self::MIN, Self::MAX)
	}

	/// Create the domain `lower..=upper`, empty when `lower > upper`.
	pub fn new(lower: IntVal, upper: IntVal) -> Self {
		let ranges = if lower <= upper {
			vec![Range { l: lower, u: upper }]
		} else {
			Vec::new()
		};
		Self {
			ranges,
			size: Cell::new(0),
			modified: Cell::new(true),
			overflow: false,
		}
	}

	/// Create a domain holding the single value `x`.
	pub fn singleton(x: IntVal) -> Self {
		Self::new(x, x)
	}

	/// Pairwise addition of a constant, shifting every element.
	pub fn shift(&mut self, x: IntVal) {
		if x == 0 {
			return;
		}
		let mut overflow = self.overflow;
		for r in &mut self.ranges {
			r.l = clamp_val(SumVal::from(r.l) + SumVal::from(x), &mut overflow);
			r.u = clamp_val(SumVal::from(r.u) + SumVal::from(x), &mut overflow);
		}
		self.overflow = overflow;
		self.modified.set(true);
	}

	/// Pairwise addition of another domain: the result holds `{a + b}` for
	/// every `a` in `self` and `b` in `other`, collapsed to disjoint ranges.
	pub fn add(&mut self, other: &Domain) {
		if self.is_empty() || other.is_empty() {
			self.ranges.clear();
			self.modified.set(true);
			return;
		}
		let mut overflow = self.overflow || other.overflow;
		let mut sums: Vec<(SumVal, SumVal)> = Vec::with_capacity(self.ranges.len() * other.ranges.len());
		for a in &self.ranges {
			for b in &other.ranges {
				sums.push((
					SumVal::from(a.l) + SumVal::from(b.l),
					SumVal::from(a.u) + SumVal::from(b.u),
				));
			}
		}
		sums.sort_unstable();
		self.ranges.clear();
		for (l, u) in sums {
			let l = clamp_val(l, &mut overflow);
			let u = clamp_val(u, &mut overflow);
			match self.ranges.last_mut() {
				Some(last) if SumVal::from(last.u) + 1 >= SumVal::from(l) => {
					last.u = last.u.max(u);
				}
				_ => self.ranges.push(Range { l, u }),
			}
		}
		self.overflow = overflow;
		self.modified.set(true);
	}

	/// Return true if `x` is an element of the domain.
	pub fn contains(&self, x: IntVal) -> bool {
		let i = self.ranges.partition_point(|r| r.u < x);
		i < self.ranges.len() && self.ranges[i].l <= x
	}

	/// Return true if every element of `other` is an element of the domain.
	pub fn contains_domain(&self, other: &Domain) -> bool {
		other.ranges.iter().all(|o| {
			let i = self.ranges.partition_point(|r| r.u < o.l);
			i < self.ranges.len() && self.ranges[i].l <= o.l && o.u <= self.ranges[i].u
		})
	}

	/// Retain only the values `i` that satisfy `(times·i + c) mod div == 0`.
	pub fn constrain_modulo(
		&mut self,
		times: IntVal,
		c: IntVal,
		div: IntVal,
	) -> Result<(), EmptyDomain> {
		debug_assert_ne!(div, 0);
		let div = SumVal::from(div).abs();
		if div == 1 {
			return Ok(());
		}
		let times = SumVal::from(times);
		let c = SumVal::from(c);
		let g = gcd(times, div);
		if c.rem_euclid(g) != 0 {
			self.ranges.clear();
			self.modified.set(true);
			return Err(EmptyDomain);
		}
		// Solve (times/g)·i ≡ -c/g (mod div/g); times/g and div/g are coprime.
		let step = div / g;
		if step == 1 {
			return Ok(());
		}
		let t = (times / g).rem_euclid(step);
		let rhs = (-c / g).rem_euclid(step);
		let root = (mod_inverse(t, step) * rhs).rem_euclid(step);

		let old = std::mem::take(&mut self.ranges);
		for r in old {
			let mut v = SumVal::from(r.l) + (root - SumVal::from(r.l)).rem_euclid(step);
			while v <= SumVal::from(r.u) {
				self.ranges.push(Range {
					l: v as IntVal,
					u: v as IntVal,
				});
				v += step;
			}
		}
		self.modified.set(true);
		if self.is_empty() {
			Err(EmptyDomain)
		} else {
			Ok(())
		}
	}

	/// Divide every element by `n`, discarding the elements that `n` does not
	/// divide exactly.
	pub fn divide(&mut self, n: IntVal) -> Result<(), EmptyDomain> {
		debug_assert_ne!(n, 0);
		let mut n = SumVal::from(n);
		if n < 0 {
			self.reverse();
			n = -n;
		}
		if n == 1 {
			return self.check_empty();
		}
		let old = std::mem::take(&mut self.ranges);
		for r in old {
			let l = div_ceil(SumVal::from(r.l), n);
			let u = div_floor(SumVal::from(r.u), n);
			if l > u {
				continue;
			}
			match self.ranges.last_mut() {
				Some(last) if SumVal::from(last.u) + 1 >= l => last.u = last.u.max(u as IntVal),
				_ => self.ranges.push(Range {
					l: l as IntVal,
					u: u as IntVal,
				}),
			}
		}
		self.modified.set(true);
		self.check_empty()
	}

	/// Intersect with `other`.
	pub fn intersect(&mut self, other: &Domain) -> Result<(), EmptyDomain> {
		let mut out = Vec::new();
		let (mut i, mut j) = (0, 0);
		while i < self.ranges.len() && j < other.ranges.len() {
			let a = self.ranges[i];
			let b = other.ranges[j];
			let l = a.l.max(b.l);
			let u = a.u.min(b.u);
			if l <= u {
				out.push(Range { l, u });
			}
			if a.u < b.u {
				i += 1;
			} else {
				j += 1;
			}
		}
		self.ranges = out;
		self.modified.set(true);
		self.check_empty()
	}

	/// Intersect with the range `lower..=upper`.
	pub fn intersect_bounds(&mut self, lower: IntVal, upper: IntVal) -> Result<(), EmptyDomain> {
		if lower > upper {
			self.ranges.clear();
			self.modified.set(true);
			return Err(EmptyDomain);
		}
		self.ranges.retain(|r| r.u >= lower && r.l <= upper);
		if let Some(first) = self.ranges.first_mut() {
			first.l = first.l.max(lower);
		}
		if let Some(last) = self.ranges.last_mut() {
			last.u = last.u.min(upper);
		}
		self.modified.set(true);
		self.check_empty()
	}

	/// Return true if the domain has no elements.
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// Create a cursor at the first element.
	pub fn iter(&self) -> DomainIter<'_> {
		DomainIter {
			domain: self,
			index: 0,
			steps: 0,
			pos: 0,
		}
	}

	/// Create a cursor at the given global element position.
	pub fn iter_at(&self, pos: u64) -> DomainIter<'_> {
		let mut it = self.iter();
		it.advance(pos as i64);
		it
	}

	/// Create a cursor one past the last element.
	pub fn iter_end(&self) -> DomainIter<'_> {
		DomainIter {
			domain: self,
			index: self.ranges.len(),
			steps: 0,
			pos: self.size(),
		}
	}

	/// Return the smallest element.
	///
	/// The domain must not be empty.
	pub fn lower(&self) -> IntVal {
		debug_assert!(!self.is_empty());
		self.ranges.first().map_or(0, |r| r.l)
	}

	/// Whether an operation exceeded the representable value range.
	///
	/// Once set, the element set is only an over-approximation clamped to
	/// `MIN..=MAX`; the flag must be treated as fatal.
	pub fn overflow(&self) -> bool {
		self.overflow
	}

	/// The ranges making up the domain.
	pub fn ranges(&self) -> &[Range] {
		&self.ranges
	}

	/// Remove every element of `other` from the domain.
	pub fn remove_domain(&mut self, other: &Domain) -> Result<(), EmptyDomain> {
		for r in &other.ranges {
			// Chain regardless of intermediate emptiness; report it at the end.
			let _ = self.remove_bounds(r.l, r.u);
		}
		self.check_empty()
	}

	/// Remove the values `lower..=upper` from the domain.
	pub fn remove_bounds(&mut self, lower: IntVal, upper: IntVal) -> Result<(), EmptyDomain> {
		if lower > upper {
			return self.check_empty();
		}
		let old = std::mem::take(&mut self.ranges);
		for r in old {
			if r.u < lower || upper < r.l {
				self.ranges.push(r);
				continue;
			}
			if r.l < lower {
				self.ranges.push(Range {
					l: r.l,
					u: lower - 1,
				});
			}
			if upper < r.u {
				self.ranges.push(Range {
					l: upper + 1,
					u: r.u,
				});
			}
		}
		self.modified.set(true);
		self.check_empty()
	}

	/// Remove the single value `x` from the domain.
	pub fn remove(&mut self, x: IntVal) -> Result<(), EmptyDomain> {
		self.remove_bounds(x, x)
	}

	/// The number of elements; evaluated lazily and cached.
	pub fn size(&self) -> u64 {
		if self.modified.get() {
			self.modified.set(false);
			self.size
				.set(self.ranges.iter().map(Range::size).sum::<u64>());
		}
		self.size.get()
	}

	/// Multiply every element by `n`.
	///
	/// If the resulting point-set cardinality stays within `max_size` each
	/// element is materialized exactly; otherwise only the range endpoints
	/// are multiplied, over-approximating the result.
	pub fn times(&mut self, n: IntVal, max_size: u64) {
		debug_assert_ne!(n, 0);
		let mut n = SumVal::from(n);
		if n < 0 {
			self.reverse();
			n = -n;
		}
		if n == 1 {
			return;
		}
		let mut overflow = self.overflow;
		if self.size() <= max_size {
			let values: Vec<SumVal> = self.iter().map(|x| SumVal::from(x) * n).collect();
			self.ranges.clear();
			for v in values {
				let v = clamp_val(v, &mut overflow);
				match self.ranges.last_mut() {
					Some(last) if SumVal::from(last.u) + 1 >= SumVal::from(v) => {
						last.u = last.u.max(v);
					}
					_ => self.ranges.push(Range { l: v, u: v }),
				}
			}
		} else {
			for r in &mut self.ranges {
				r.l = clamp_val(SumVal::from(r.l) * n, &mut overflow);
				r.u = clamp_val(SumVal::from(r.u) * n, &mut overflow);
			}
		}
		self.overflow = overflow;
		self.modified.set(true);
	}

	/// Add the values `lower..=upper` to the domain.
	pub fn unify_bounds(&mut self, lower: IntVal, upper: IntVal) {
		if lower > upper {
			return;
		}
		let mut out = Vec::with_capacity(self.ranges.len() + 1);
		let mut cur = Range { l: lower, u: upper };
		let mut placed = false;
		for &r in &self.ranges {
			if SumVal::from(r.u) + 1 < SumVal::from(cur.l) {
				out.push(r);
			} else if placed || SumVal::from(cur.u) + 1 < SumVal::from(r.l) {
				if !placed {
					out.push(cur);
					placed = true;
				}
				out.push(r);
			} else {
				cur.l = cur.l.min(r.l);
				cur.u = cur.u.max(r.u);
			}
		}
		if !placed {
			out.push(cur);
		}
		self.ranges = out;
		self.modified.set(true);
	}

	/// Add every element of `other` to the domain.
	pub fn unify(&mut self, other: &Domain) {
		for r in &other.ranges {
			self.unify_bounds(r.l, r.u);
		}
		self.overflow |= other.overflow;
	}

	/// Return the largest element.
	///
	/// The domain must not be empty.
	pub fn upper(&self) -> IntVal {
		debug_assert!(!self.is_empty());
		self.ranges.last().map_or(0, |r| r.u)
	}

	/// Report emptiness as a result.
	fn check_empty(&self) -> Result<(), EmptyDomain> {
		if self.is_empty() {
			Err(EmptyDomain)
		} else {
			Ok(())
		}
	}

	/// Multiply every element by -1, keeping the ranges in increasing order.
	fn reverse(&mut self) {
		self.ranges.reverse();
		for r in &mut self.ranges {
			(r.l, r.u) = (-r.u, -r.l);
		}
		self.modified.set(true);
	}
}

impl PartialEq for Domain {
	fn eq(&self, other: &Self) -> bool {
		self.ranges == other.ranges
	}
}

impl Eq for Domain {}

impl fmt::Display for Domain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, r) in self.ranges.iter().enumerate() {
			if i > 0 {
				write!(f, ",")?;
			}
			write!(f, "{}..{}", r.l, r.u)?;
		}
		Ok(())
	}
}

impl<'a> DomainIter<'a> {
	/// Move the cursor `n` elements forward (or backward when negative).
	pub fn advance(&mut self, n: i64) {
		if n == 0 {
			return;
		}
		if n > 0 {
			let mut left = n as u64;
			self.pos += left;
			while self.index < self.domain.ranges.len() {
				let remaining = self.domain.ranges[self.index].size() - self.steps;
				if left < remaining {
					self.steps += left;
					return;
				}
				left -= remaining;
				self.steps = 0;
				self.index += 1;
			}
			debug_assert_eq!(left, 0, "cursor advanced past the end position");
		} else {
			let mut left = n.unsigned_abs();
			debug_assert!(left <= self.pos);
			self.pos -= left;
			loop {
				if left <= self.steps {
					self.steps -= left;
					return;
				}
				left -= self.steps + 1;
				debug_assert!(self.index > 0);
				self.index -= 1;
				self.steps = self.domain.ranges[self.index].size() - 1;
				if left == 0 {
					return;
				}
			}
		}
	}

	/// Return true when the cursor is one past the last element.
	pub fn at_end(&self) -> bool {
		self.pos == self.domain.size()
	}

	/// The number of elements from `self` to `other` (negative when `other`
	/// precedes `self`). Both cursors must traverse the same domain.
	pub fn distance_to(&self, other: &DomainIter<'_>) -> i64 {
		other.pos as i64 - self.pos as i64
	}

	/// The domain the cursor traverses.
	pub fn domain(&self) -> &'a Domain {
		self.domain
	}

	/// Global element position of the cursor.
	pub fn position(&self) -> u64 {
		self.pos
	}

	/// The element at the cursor.
	///
	/// The cursor must not be at the end position.
	pub fn value(&self) -> IntVal {
		debug_assert!(self.index < self.domain.ranges.len());
		(SumVal::from(self.domain.ranges[self.index].l) + self.steps as SumVal) as IntVal
	}
}

impl Iterator for DomainIter<'_> {
	type Item = IntVal;

	fn next(&mut self) -> Option<Self::Item> {
		if self.at_end() {
			return None;
		}
		let v = self.value();
		self.advance(1);
		Some(v)
	}
}

impl PartialEq for DomainIter<'_> {
	fn eq(&self, other: &Self) -> bool {
		self.pos == other.pos
	}
}

impl Eq for DomainIter<'_> {}

impl WideDomain {
	/// Largest representable value of a wide domain element.
	pub const MAX_L: SumVal = SumVal::MAX - 1;
	/// Smallest representable value of a wide domain element.
	pub const MIN_L: SumVal = SumVal::MIN + 2;

	/// Create the wide domain `lower..=upper`, empty when `lower > upper`.
	pub fn new(lower: SumVal, upper: SumVal) -> Self {
		let ranges = if lower <= upper {
			vec![WideRange { l: lower, u: upper }]
		} else {
			Vec::new()
		};
		Self { ranges }
	}

	/// Create the value set of the affine expression `a·x + c` for `x`
	/// ranging over `domain`. Scales with `|a| > 1` materialize one point
	/// range per element.
	pub fn of_transformed(domain: &Domain, a: IntVal, c: IntVal) -> Self {
		let (a, c) = (SumVal::from(a), SumVal::from(c));
		if a == 0 {
			return Self::new(c, c);
		}
		let mut domain = domain.clone();
		let mut a = a;
		if a < 0 {
			domain.reverse();
			a = -a;
		}
		let mut ranges = Vec::new();
		if a == 1 {
			for r in domain.ranges() {
				ranges.push(WideRange {
					l: SumVal::from(r.l) + c,
					u: SumVal::from(r.u) + c,
				});
			}
		} else {
			for x in domain.iter() {
				let v = SumVal::from(x) * a + c;
				ranges.push(WideRange { l: v, u: v });
			}
		}
		Self { ranges }
	}

	/// Return true if `x` is an element of the domain.
	pub fn contains(&self, x: SumVal) -> bool {
		let i = self.ranges.partition_point(|r| r.u < x);
		i < self.ranges.len() && self.ranges[i].l <= x
	}

	/// Return true if the domain has no elements.
	pub fn is_empty(&self) -> bool {
		self.ranges.is_empty()
	}

	/// Iterate over the elements in increasing order.
	pub fn iter(&self) -> impl Iterator<Item = SumVal> + '_ {
		self.ranges.iter().flat_map(|r| r.l..=r.u)
	}

	/// Return the smallest element.
	///
	/// The domain must not be empty.
	pub fn lower(&self) -> SumVal {
		debug_assert!(!self.is_empty());
		self.ranges.first().map_or(0, |r| r.l)
	}

	/// The ranges making up the domain.
	pub fn ranges(&self) -> &[WideRange] {
		&self.ranges
	}

	/// The number of elements.
	pub fn size(&self) -> u64 {
		self.ranges
			.iter()
			.map(|r| (r.u - r.l + 1) as u64)
			.sum::<u64>()
	}

	/// Add the values `lower..=upper` to the domain.
	pub fn unify_bounds(&mut self, lower: SumVal, upper: SumVal) {
		if lower > upper {
			return;
		}
		let mut out = Vec::with_capacity(self.ranges.len() + 1);
		let mut cur = WideRange { l: lower, u: upper };
		let mut placed = false;
		for &r in &self.ranges {
			if r.u + 1 < cur.l {
				out.push(r);
			} else if placed || cur.u + 1 < r.l {
				if !placed {
					out.push(cur);
					placed = true;
				}
				out.push(r);
			} else {
				cur.l = cur.l.min(r.l);
				cur.u = cur.u.max(r.u);
			}
		}
		if !placed {
			out.push(cur);
		}
		self.ranges = out;
	}

	/// Add every element of `other` to the domain.
	pub fn unify(&mut self, other: &WideDomain) {
		for r in &other.ranges {
			self.unify_bounds(r.l, r.u);
		}
	}

	/// Return the largest element.
	///
	/// The domain must not be empty.
	pub fn upper(&self) -> SumVal {
		debug_assert!(!self.is_empty());
		self.ranges.last().map_or(0, |r| r.u)
	}
}

impl fmt::Display for WideDomain {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, r) in self.ranges.iter().enumerate() {
			if i > 0 {
				write!(f, ",")?;
			}
			write!(f, "{}..{}", r.l, r.u)?;
		}
		Ok(())
	}
}

/// Clamp a 64-bit intermediate to the representable 32-bit value range,
/// recording the overflow.
fn clamp_val(v: SumVal, overflow: &mut bool) -> IntVal {
	if v < SumVal::from(Domain::MIN) {
		*overflow = true;
		Domain::MIN
	} else if v > SumVal::from(Domain::MAX) {
		*overflow = true;
		Domain::MAX
	} else {
		v as IntVal
	}
}

/// Modular inverse of `a` modulo `m`, for coprime `a` and `m`.
fn mod_inverse(a: SumVal, m: SumVal) -> SumVal {
	let (mut old_r, mut r) = (a.rem_euclid(m), m);
	let (mut old_s, mut s) = (1, 0);
	while r != 0 {
		let q = old_r / r;
		(old_r, r) = (r, old_r - q * r);
		(old_s, s) = (s, old_s - q * s);
	}
	debug_assert_eq!(old_r, 1, "values must be coprime");
	old_s.rem_euclid(m)
}

#[cfg(test)]
mod tests {
	use expect_test::expect;

	use crate::domain::{Domain, Range, WideDomain};

	#[test]
	fn test_unify_and_iterate() {
		let mut d = Domain::new(0, 100);
		d.unify_bounds(200, 300);
		d.unify_bounds(-100, -50);
		assert_eq!(d.size(), 253);

		let begin = d.iter();
		assert_eq!(begin.clone().count(), 253);
		assert_eq!(begin.distance_to(&d.iter_end()), 253);
		assert_eq!(d.iter_at(50).value(), -50);
		assert_eq!(d.iter_at(51).value(), 0);
		assert_eq!(d.iter_at(76).value(), 25);
		assert_eq!(d.iter_at(252).value(), 300);

		let mut j = Domain::new(1, 1);
		j.unify_bounds(6, 8);
		j.unify_bounds(2, 5);
		assert_eq!(j.ranges(), &[Range { l: 1, u: 8 }]);
		assert!(d.contains_domain(&Domain::new(210, 250)));
		assert!(!d.contains_domain(&Domain::new(90, 110)));
	}

	#[test]
	fn test_iterator_advance() {
		let mut d = Domain::new(0, 3);
		d.unify_bounds(10, 12);
		let mut it = d.iter_at(5);
		assert_eq!(it.value(), 11);
		it.advance(-4);
		assert_eq!(it.value(), 1);
		it.advance(3);
		assert_eq!(it.value(), 10);
		it.advance(3);
		assert!(it.at_end());
		it.advance(-1);
		assert_eq!(it.value(), 12);
	}

	#[test]
	fn test_intersect_remove() {
		let mut f = Domain::new(0, 99);
		assert!(f.intersect_bounds(50, 70).is_ok());
		assert_eq!((f.lower(), f.upper()), (50, 70));
		assert!(f.intersect_bounds(65, 60).is_err());
		assert!(f.is_empty());

		let mut g = Domain::new(0, 99);
		assert!(g.remove_bounds(10, 19).is_ok());
		assert!(g.remove_bounds(50, 59).is_ok());
		assert!(g.remove_bounds(20, 29).is_ok());
		assert_eq!(g.size(), 70);
		assert!(g.remove_bounds(70, 79).is_ok());
		assert!(g.remove_bounds(65, 69).is_ok());
		assert_eq!(g.size(), 55);
		assert!(g.remove_bounds(7, 62).is_ok());
		assert_eq!(g.size(), 29);
		assert!(g.intersect_bounds(23, 72).is_ok());
		assert_eq!(g.size(), 2);
		g.unify_bounds(0, 99);
		assert_eq!(g.size(), 100);
	}

	#[test]
	fn test_times_materialized() {
		let mut h = Domain::new(-10, 5);
		h.times(5, 10000);
		assert_eq!(h.lower(), -50);
		assert_eq!(h.upper(), 25);
		assert_eq!(h.size(), 16);
		h.unify_bounds(50, 75);
		h.times(-3, 10000);
		assert_eq!(h.lower(), -225);
		assert_eq!(h.upper(), 150);
		assert!(!h.overflow());
	}

	#[test]
	fn test_times_coarsened() {
		let mut d = Domain::new(0, 9);
		d.times(3, 4);
		// Too many points to materialize, endpoints are multiplied instead.
		assert_eq!(d.ranges(), &[Range { l: 0, u: 27 }]);
		assert_eq!(d.size(), 28);
	}

	#[test]
	fn test_times_divide_round_trip() {
		let mut d = Domain::new(1, 4);
		d.unify_bounds(8, 9);
		let orig = d.clone();
		d.times(7, 1000);
		assert!(d.divide(7).is_ok());
		assert_eq!(d, orig);

		let mut d = orig.clone();
		d.times(-7, 1000);
		assert!(d.divide(-7).is_ok());
		assert_eq!(d, orig);
	}

	#[test]
	fn test_minkowski_addition() {
		let mut e = Domain::new(1, 100);
		e.add(&Domain::singleton(3));
		assert_eq!((e.lower(), e.upper()), (4, 103));
		assert_eq!(e.size(), 100);

		let mut a = Domain::new(0, 1);
		a.unify_bounds(10, 11);
		let mut b = Domain::new(0, 100);
		b.add(&a);
		assert_eq!((b.lower(), b.upper()), (0, 111));
		assert_eq!(b.size(), 112);

		// Addition is commutative.
		let mut c = a.clone();
		c.add(&Domain::new(0, 100));
		assert_eq!(b, c);
	}

	#[test]
	fn test_constrain_modulo() {
		// Values i with (2·i + 1) mod 3 == 0, i.e. i ≡ 1 (mod 3).
		let mut d = Domain::new(0, 10);
		assert!(d.constrain_modulo(2, 1, 3).is_ok());
		assert_eq!(d.iter().collect::<Vec<_>>(), vec![1, 4, 7, 10]);

		// No solution: (2·i) mod 4 == 1 has none.
		let mut d = Domain::new(0, 10);
		assert!(d.constrain_modulo(2, -1, 4).is_err());
	}

	#[test]
	fn test_size_cache_transparency() {
		let mut d = Domain::new(0, 9);
		assert_eq!(d.size(), 10);
		assert!(d.remove(5).is_ok());
		assert_eq!(d.size(), 9);
		assert_eq!(d.size(), 9);
	}

	#[test]
	fn test_overflow_flag() {
		let mut d = Domain::new(Domain::MAX - 1, Domain::MAX);
		d.shift(10);
		assert!(d.overflow());

		let mut d = Domain::new(0, 1000);
		d.times(Domain::MAX / 2, 10);
		assert!(d.overflow());
	}

	#[test]
	fn test_display() {
		let mut d = Domain::new(0, 3);
		d.unify_bounds(7, 7);
		d.unify_bounds(10, 12);
		expect!["0..3,7..7,10..12"].assert_eq(&d.to_string());
	}

	#[test]
	fn test_wide_domain_of_view() {
		let mut d = Domain::new(1, 3);
		d.unify_bounds(6, 7);
		let w = WideDomain::of_transformed(&d, 1, 10);
		expect!["11..13,16..17"].assert_eq(&w.to_string());

		let w = WideDomain::of_transformed(&d, 2, 0);
		assert_eq!(w.iter().collect::<Vec<_>>(), vec![2, 4, 6, 12, 14]);

		let w = WideDomain::of_transformed(&d, -1, 0);
		expect!["-7..-6,-3..-1"].assert_eq(&w.to_string());

		let w = WideDomain::of_transformed(&d, 0, 5);
		expect!["5..5"].assert_eq(&w.to_string());
	}
}
