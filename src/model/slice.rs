use std::fmt::{self, Debug};

use super::{Fragment, ModelError, Node, Schema, SliceJson};

/// A piece of document cut out of a larger tree. `open_start` and `open_end`
/// count how many ancestor levels were cut through at either side.
#[derive(Clone, Default, PartialEq)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    #[must_use]
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    #[must_use]
    pub fn empty() -> Self { Self::default() }

    pub fn content(&self) -> &Fragment { &self.content }

    pub fn open_start(&self) -> usize { self.open_start }

    pub fn open_end(&self) -> usize { self.open_end }

    /// Size the slice adds when inserted.
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    /// Inserts `fragment` at `pos` (relative to the slice), or `None` when
    /// the result would not fit the surrounding node.
    pub fn insert_at(&self, pos: usize, fragment: &Fragment) -> Option<Slice> {
        let content = insert_into(&self.content, pos + self.open_start, fragment, None)?;
        Some(Self::new(content, self.open_start, self.open_end))
    }

    /// Removes `from..to` (relative to the slice), which must not cross node
    /// boundaries.
    pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice, ModelError> {
        let content = remove_range(&self.content, from + self.open_start, to + self.open_start)?;
        Ok(Self::new(content, self.open_start, self.open_end))
    }

    /// `None` for the empty slice.
    pub fn to_json(&self) -> Option<SliceJson> {
        (self.content.size() > 0).then(|| SliceJson {
            content: self.content.to_json(),
            open_start: self.open_start,
            open_end: self.open_end,
        })
    }

    pub fn from_json(schema: &Schema, json: Option<&SliceJson>) -> Result<Slice, ModelError> {
        let Some(json) = json else {
            return Ok(Self::empty());
        };

        let content = json
            .content
            .iter()
            .map(|child| Node::from_json(schema, child))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(
            Fragment::from_vec(content),
            json.open_start,
            json.open_end,
        ))
    }
}

fn insert_into(
    content: &Fragment,
    dist: usize,
    insert: &Fragment,
    parent: Option<&Node>,
) -> Option<Fragment> {
    let (index, offset) = content.find_index(dist, false).ok()?;
    let child = content.maybe_child(index);

    if offset == dist || child.is_some_and(Node::is_text) {
        let result = content.cut(0, dist).append(insert).append(&content.cut(dist, content.size()));
        if let Some(parent) = parent
            && !parent.node_type().valid_content(&result)
        {
            return None;
        }
        return Some(result);
    }

    let child = child?;
    let inner = insert_into(child.content(), dist - offset - 1, insert, Some(child))?;
    Some(content.replace_child(index, child.copy(inner)))
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment, ModelError> {
    let (index, offset) = content.find_index(from, false)?;
    let (index_to, offset_to) = content.find_index(to, false)?;
    let child = content.maybe_child(index);

    if offset == from || child.is_some_and(Node::is_text) {
        if offset_to != to && !content.maybe_child(index_to).is_some_and(Node::is_text) {
            return Err(ModelError::Replace("Removing non-flat range".to_owned()));
        }
        return Ok(content.cut(0, from).append(&content.cut(to, content.size())));
    }

    let child = match child {
        Some(child) if index == index_to => child,
        _ => return Err(ModelError::Replace("Removing non-flat range".to_owned())),
    };
    let inner = remove_range(child.content(), from - offset - 1, to - offset - 1)?;
    Ok(content.replace_child(index, child.copy(inner)))
}

impl Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({},{})", self.content, self.open_start, self.open_end)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::test_helpers::{doc, p, schema, text};

    #[test]
    fn test_insert_at() {
        let slice = doc(vec![p("hello"), p("world")]).slice(3, 10).unwrap();

        let inserted = slice
            .insert_at(1, &Fragment::from_node(text("XY")))
            .unwrap();
        assert_eq!(format!("{inserted:?}"), r#"<paragraph("lXYlo"), paragraph("wo")>(1,1)"#);

        assert_eq!(slice.insert_at(1, &Fragment::from_node(p("XY"))), None);
        assert!(slice.insert_at(4, &Fragment::from_node(p("XY"))).is_some());
    }

    #[test]
    fn test_remove_between() {
        let slice = doc(vec![p("hello"), p("world")]).slice(3, 10).unwrap();

        let removed = slice.remove_between(0, 2).unwrap();
        assert_eq!(format!("{removed:?}"), r#"<paragraph("o"), paragraph("wo")>(1,1)"#);
        assert!(slice.remove_between(1, 5).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let slice = doc(vec![p("hello"), p("world")]).slice(3, 10).unwrap();
        let json = slice.to_json();

        assert_eq!(json.as_ref().map(|json| json.open_start), Some(1));
        assert_eq!(Slice::from_json(&schema(), json.as_ref()).unwrap(), slice);
        assert_eq!(Slice::empty().to_json(), None);
        assert_eq!(Slice::from_json(&schema(), None).unwrap(), Slice::empty());
    }
}
