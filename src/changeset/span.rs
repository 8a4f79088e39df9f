use std::fmt::Debug;

use crate::model::Slice;

/// A range of inserted content in the current document, tagged with the
/// metadata of the edit that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Span<D> {
    pub from: usize,
    pub to: usize,
    pub data: D,
}

impl<D> Span<D> {
    pub fn new(from: usize, to: usize, data: D) -> Self { Self { from, to, data } }

    pub fn len(&self) -> usize { self.to - self.from }

    pub fn is_empty(&self) -> bool { self.from >= self.to }

    /// Overlapping or directly adjacent.
    pub fn touches(&self, from: usize, to: usize) -> bool { self.from <= to && from <= self.to }
}

/// A range of the start document that is no longer present.
///
/// `from` and `to` are positions in the start document and never change;
/// `pos` is where the deletion sits in the current document.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedSpan<D> {
    pub from: usize,
    pub to: usize,
    pub pos: usize,
    pub slice: Slice,
    pub data: D,
}

impl<D> DeletedSpan<D> {
    pub fn len(&self) -> usize { self.to - self.from }

    pub fn is_empty(&self) -> bool { self.from >= self.to }
}

/// Removes `from..to` from every range in `ranges`, splitting ranges that
/// contain it.
pub(crate) fn subtract(ranges: Vec<(usize, usize)>, from: usize, to: usize) -> Vec<(usize, usize)> {
    ranges
        .into_iter()
        .flat_map(|(start, end)| {
            if end <= from || start >= to {
                return vec![(start, end)];
            }
            [(start, from), (to, end)]
                .into_iter()
                .filter(|(start, end)| start < end)
                .collect()
        })
        .collect()
}
