use super::Mappable;

/// Which side of a replaced range a position at its boundary sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// Identifies the range a position was deleted by and the offset into it,
/// so that a mirroring map can put the position back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverToken {
    index: usize,
    offset: usize,
}

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// The outcome of mapping a position, with information about deletions
/// around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    pub recover: Option<RecoverToken>,
    del_info: u8,
}

impl MapResult {
    pub(crate) fn new(pos: usize, del_info: u8, recover: Option<RecoverToken>) -> Self {
        Self {
            pos,
            recover,
            del_info,
        }
    }

    pub(crate) fn del_info(&self) -> u8 { self.del_info }

    /// The content on the side the position is associated with was deleted.
    pub fn deleted(&self) -> bool { self.del_info & DEL_SIDE > 0 }

    pub fn deleted_before(&self) -> bool { self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0 }

    pub fn deleted_after(&self) -> bool { self.del_info & (DEL_AFTER | DEL_ACROSS) > 0 }

    /// The position sat strictly inside a deleted range.
    pub fn deleted_across(&self) -> bool { self.del_info & DEL_ACROSS > 0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MapRange {
    start: usize,
    old_size: usize,
    new_size: usize,
}

/// How positions move through a single step: a sorted list of replaced
/// ranges, each given by its start, old size and new size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MapRange>,
    inverted: bool,
}

fn offset(pos: usize, diff: isize) -> usize { pos.saturating_add_signed(diff) }

impl StepMap {
    /// Builds a map from `(start, old_size, new_size)` triples in ascending
    /// order of `start`.
    #[must_use]
    pub fn new(ranges: &[(usize, usize, usize)]) -> Self {
        Self {
            ranges: ranges
                .iter()
                .filter(|(_, old_size, new_size)| *old_size > 0 || *new_size > 0)
                .map(|&(start, old_size, new_size)| MapRange {
                    start,
                    old_size,
                    new_size,
                })
                .collect(),
            inverted: false,
        }
    }

    /// A map that moves nothing.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.ranges.is_empty() }

    #[must_use]
    pub fn invert(&self) -> StepMap {
        Self {
            ranges: self.ranges.clone(),
            inverted: !self.inverted,
        }
    }

    fn sizes(&self, range: &MapRange) -> (usize, usize) {
        if self.inverted {
            (range.new_size, range.old_size)
        } else {
            (range.old_size, range.new_size)
        }
    }

    /// Where a position recorded by `token` ends up in this map's output.
    pub fn recover(&self, token: RecoverToken) -> usize {
        let diff: isize = if self.inverted {
            0
        } else {
            self.ranges[..token.index]
                .iter()
                .map(|range| range.new_size as isize - range.old_size as isize)
                .sum()
        };
        offset(self.ranges[token.index].start, diff) + token.offset
    }

    fn map_inner(&self, pos: usize, assoc: Assoc, simple: bool) -> MapResult {
        let mut diff: isize = 0;

        for (index, range) in self.ranges.iter().enumerate() {
            let start = if self.inverted {
                offset(range.start, -diff)
            } else {
                range.start
            };
            if start > pos {
                break;
            }

            let (old_size, new_size) = self.sizes(range);
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    Assoc::Before
                } else if pos == end {
                    Assoc::After
                } else {
                    assoc
                };
                let result = offset(start, diff)
                    + match side {
                        Assoc::Before => 0,
                        Assoc::After => new_size,
                    };
                if simple {
                    return MapResult::new(result, 0, None);
                }

                let boundary = match assoc {
                    Assoc::Before => start,
                    Assoc::After => end,
                };
                let recover = (pos != boundary).then_some(RecoverToken {
                    index,
                    offset: pos - start,
                });
                let mut del_info = if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                if pos != boundary {
                    del_info |= DEL_SIDE;
                }
                return MapResult::new(result, del_info, recover);
            }

            diff += new_size as isize - old_size as isize;
        }

        MapResult::new(offset(pos, diff), 0, None)
    }

    /// Whether the range that deleted the position identified by `token`
    /// covers `pos`.
    pub fn touches(&self, pos: usize, token: RecoverToken) -> bool {
        let mut diff: isize = 0;

        for (index, range) in self.ranges.iter().enumerate() {
            let start = if self.inverted {
                offset(range.start, -diff)
            } else {
                range.start
            };
            if start > pos {
                break;
            }
            let (old_size, new_size) = self.sizes(range);
            if pos <= start + old_size && index == token.index {
                return true;
            }
            diff += new_size as isize - old_size as isize;
        }

        false
    }

    /// Calls `f(old_start, old_end, new_start, new_end)` for every changed
    /// range.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, usize, usize),
    {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let (old_size, new_size) = self.sizes(range);
            let (old_start, new_start) = if self.inverted {
                (offset(range.start, -diff), range.start)
            } else {
                (range.start, offset(range.start, diff))
            };
            f(old_start, old_start + old_size, new_start, new_start + new_size);
            diff += new_size as isize - old_size as isize;
        }
    }
}

impl Mappable for StepMap {
    fn map(&self, pos: usize, assoc: Assoc) -> usize { self.map_inner(pos, assoc, true).pos }

    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult { self.map_inner(pos, assoc, false) }
}
