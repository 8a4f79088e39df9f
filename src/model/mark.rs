use std::{
    fmt::{self, Debug},
    rc::Rc,
};

use super::{
    Attrs, ModelError,
    json::MarkJson,
    schema::{AttrSpec, compute_attrs},
};

#[derive(Debug)]
pub(crate) struct MarkTypeData {
    pub name: String,
    pub rank: usize,
    pub attrs: Vec<AttrSpec>,
    pub inclusive: bool,
}

/// A kind of inline formatting, like emphasis or links.
#[derive(Clone)]
pub struct MarkType(Rc<MarkTypeData>);

impl MarkType {
    pub(crate) fn from_data(data: MarkTypeData) -> Self { Self(Rc::new(data)) }

    pub fn name(&self) -> &str { &self.0.name }

    /// Position of the type in the schema; mark sets are sorted by it.
    pub fn rank(&self) -> usize { self.0.rank }

    pub fn is_inclusive(&self) -> bool { self.0.inclusive }

    pub fn create(&self, attrs: &Attrs) -> Result<Mark, ModelError> {
        Ok(Mark {
            mark_type: self.clone(),
            attrs: compute_attrs(&self.0.attrs, &self.0.name, attrs)?,
        })
    }

    /// A mark only excludes other marks of its own type.
    pub fn excludes(&self, other: &MarkType) -> bool { self == other }

    /// The mark of this type in `set`, if any.
    pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|mark| mark.mark_type == *self)
    }

    #[must_use]
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter()
            .filter(|mark| mark.mark_type != *self)
            .cloned()
            .collect()
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name }
}

impl Eq for MarkType {}

impl Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MarkType").field(&self.0.name).finish()
    }
}

/// A mark instance: a type plus its attribute values.
#[derive(Clone, PartialEq)]
pub struct Mark {
    mark_type: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub fn mark_type(&self) -> &MarkType { &self.mark_type }

    pub fn attrs(&self) -> &Attrs { &self.attrs }

    /// Adds the mark to a sorted set, replacing marks it excludes. Returns
    /// the set unchanged when it already contains this mark.
    #[must_use]
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        if self.is_in_set(set) {
            return set.to_vec();
        }

        let mut result: Vec<Mark> = set
            .iter()
            .filter(|other| !self.mark_type.excludes(&other.mark_type))
            .cloned()
            .collect();
        let index = result
            .iter()
            .position(|other| other.mark_type.rank() > self.mark_type.rank())
            .unwrap_or(result.len());
        result.insert(index, self.clone());
        result
    }

    #[must_use]
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|other| *other != self).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool { set.contains(self) }

    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool { a == b }

    /// Normalizes an arbitrary list of marks into a sorted set.
    #[must_use]
    pub fn set_from(marks: Vec<Mark>) -> Vec<Mark> {
        marks
            .into_iter()
            .fold(Vec::new(), |set, mark| mark.add_to_set(&set))
    }

    /// Whether the marks are sorted by rank with no excluded pairs.
    pub(crate) fn is_valid_set(marks: &[Mark]) -> bool {
        marks
            .windows(2)
            .all(|pair| pair[0].mark_type.rank() < pair[1].mark_type.rank())
    }

    pub fn to_json(&self) -> MarkJson {
        MarkJson {
            mark_type: self.mark_type.name().to_owned(),
            attrs: self.attrs.clone(),
        }
    }
}

impl Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.mark_type.name())
        } else {
            write!(f, "{}({:?})", self.mark_type.name(), self.attrs)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::test_helpers::schema;

    fn mark(name: &str) -> Mark { schema().mark(name, &Attrs::new()).unwrap() }

    fn link(href: &str) -> Mark {
        let attrs = json!({ "href": href }).as_object().cloned().unwrap();
        schema().mark("link", &attrs).unwrap()
    }

    #[test]
    fn test_sets_are_sorted_by_rank() {
        let set = Mark::set_from(vec![mark("code"), mark("em"), mark("strong")]);
        assert_eq!(format!("{set:?}"), "[em, strong, code]");
        assert!(Mark::is_valid_set(&set));

        let set = mark("em").remove_from_set(&set);
        assert_eq!(format!("{set:?}"), "[strong, code]");
        assert!(!mark("em").is_in_set(&set));
    }

    #[test]
    fn test_same_type_replaces() {
        let set = link("a").add_to_set(&[mark("em")]);
        let set = link("b").add_to_set(&set);

        assert_eq!(set.len(), 2);
        assert!(link("b").is_in_set(&set));
        assert!(!link("a").is_in_set(&set));
        assert_eq!(
            link("b").mark_type().is_in_set(&set).map(|mark| mark.attrs()["href"].clone()),
            Some(json!("b"))
        );
        assert!(!link("b").mark_type().is_inclusive());
    }
}
