use std::collections::BTreeMap;

use super::{Assoc, MapResult, Mappable, StepMap};

/// An ordered pipeline of step maps.
///
/// Maps can be declared mirrors of each other: two maps where one is the
/// exact inverse of the other. A position deleted by the first map of a
/// mirrored pair is recovered by the second one instead of collapsing,
/// which keeps positions stable when steps are undone and redone during
/// rebasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
    mirrors: BTreeMap<usize, usize>,
}

impl Mapping {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self {
            maps,
            mirrors: BTreeMap::new(),
        }
    }

    pub fn maps(&self) -> &[StepMap] { &self.maps }

    pub fn len(&self) -> usize { self.maps.len() }

    pub fn is_empty(&self) -> bool { self.maps.is_empty() }

    /// The maps between `from` and `to` as a new mapping, keeping the mirror
    /// pairs that lie entirely inside the range.
    #[must_use]
    pub fn slice(&self, from: usize, to: usize) -> Mapping {
        let to = to.min(self.maps.len());
        let from = from.min(to);
        Self {
            maps: self.maps[from..to].to_vec(),
            mirrors: self
                .mirrors
                .iter()
                .filter(|(a, b)| (from..to).contains(*a) && (from..to).contains(*b))
                .map(|(a, b)| (a - from, b - from))
                .collect(),
        }
    }

    /// Appends a map, optionally marking it as the mirror of the map at
    /// index `mirror`.
    pub fn append_map(&mut self, map: StepMap, mirror: Option<usize>) {
        self.maps.push(map);
        if let Some(mirror) = mirror {
            self.set_mirror(self.maps.len() - 1, mirror);
        }
    }

    pub fn append_mapping(&mut self, mapping: &Mapping) {
        let start_size = self.maps.len();
        for (index, map) in mapping.maps.iter().enumerate() {
            let mirror = mapping
                .get_mirror(index)
                .filter(|mirror| *mirror < index)
                .map(|mirror| start_size + mirror);
            self.append_map(map.clone(), mirror);
        }
    }

    /// Appends the inverse of every map of `mapping`, last map first.
    pub fn append_mapping_inverted(&mut self, mapping: &Mapping) {
        let total_size = self.maps.len() + mapping.maps.len();
        for (index, map) in mapping.maps.iter().enumerate().rev() {
            let mirror = mapping
                .get_mirror(index)
                .filter(|mirror| *mirror > index)
                .map(|mirror| total_size - mirror - 1);
            self.append_map(map.invert(), mirror);
        }
    }

    #[must_use]
    pub fn invert(&self) -> Mapping {
        let mut inverse = Mapping::new();
        inverse.append_mapping_inverted(self);
        inverse
    }

    /// Declares the maps at `a` and `b` to be inverses of each other.
    pub fn set_mirror(&mut self, a: usize, b: usize) {
        self.mirrors.insert(a, b);
        self.mirrors.insert(b, a);
    }

    pub fn get_mirror(&self, index: usize) -> Option<usize> { self.mirrors.get(&index).copied() }

    fn map_inner(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut pos = pos;
        let mut del_info = 0;
        let mut index = 0;

        while index < self.maps.len() {
            let result = self.maps[index].map_result(pos, assoc);
            if let Some(token) = result.recover
                && let Some(mirror) = self.get_mirror(index)
                && mirror > index
                && mirror < self.maps.len()
            {
                pos = self.maps[mirror].recover(token);
                index = mirror + 1;
                continue;
            }

            del_info |= result.del_info();
            pos = result.pos;
            index += 1;
        }

        MapResult::new(pos, del_info, None)
    }
}

impl Mappable for Mapping {
    fn map(&self, pos: usize, assoc: Assoc) -> usize {
        if self.mirrors.is_empty() {
            self.maps
                .iter()
                .fold(pos, |pos, map| map.map(pos, assoc))
        } else {
            self.map_inner(pos, assoc).pos
        }
    }

    fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult { self.map_inner(pos, assoc) }
}
