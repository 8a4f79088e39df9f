//! Structural replace: splices a slice into a document between two resolved
//! positions, joining the open sides of the slice onto the nodes around the
//! gap and validating every node it rebuilds.

use super::{Fragment, ModelError, Node, ResolvedPos, Slice, fragment::push_joined};

pub(crate) fn replace(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice) -> Result<Node, ModelError> {
    if slice.open_start() > from.depth() {
        return Err(ModelError::Replace(
            "Inserted content deeper than insertion position".to_owned(),
        ));
    }
    if from.depth() - slice.open_start() + slice.open_end() != to.depth() {
        return Err(ModelError::Replace("Inconsistent open depths".to_owned()));
    }
    replace_outer(from, to, slice, 0)
}

fn replace_outer(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ModelError> {
    let index = from.index(depth);
    let node = from.node(depth);

    if index == to.index(depth) && depth < from.depth() - slice.open_start() {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }

    if slice.content().size() == 0 {
        return close(node, replace_two_way(from, to, depth)?);
    }

    if slice.open_start() == 0
        && slice.open_end() == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        let parent = from.parent();
        let content = parent.content();
        return close(
            parent,
            content
                .cut(0, from.parent_offset())
                .append(slice.content())
                .append(&content.cut(to.parent_offset(), content.size())),
        );
    }

    let (start, end) = prepare_slice_for_replace(slice, from)?;
    close(node, replace_three_way(from, &start, &end, to, depth)?)
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ModelError> {
    if sub.node_type().compatible_content(main.node_type()) {
        Ok(())
    } else {
        Err(ModelError::Replace(format!(
            "Cannot join {} onto {}",
            sub.node_type().name(),
            main.node_type().name()
        )))
    }
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> Result<Node, ModelError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node.clone())
}

/// Adds the children of the node at `depth` between `start` and `end` to
/// `target`. A missing bound means the start or end of the node.
fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let Some(node) = end.or(start).map(|pos| pos.node(depth)) else {
        return;
    };

    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |end| end.index(depth));

    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                push_joined(target, after);
            }
            start_index += 1;
        }
    }

    for index in start_index..end_index {
        push_joined(target, node.child(index).clone());
    }

    if let Some(end) = end
        && end.depth() == depth
        && end.text_offset() > 0
        && let Some(before) = end.node_before()
    {
        push_joined(target, before);
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ModelError> {
    node.node_type().check_content(&content)?;
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ModelError> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);

    match (&open_start, &open_end) {
        (Some(open_start), Some(open_end)) if start.index(depth) == end.index(depth) => {
            check_join(open_start, open_end)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            push_joined(&mut content, close(open_start, inner)?);
        }
        _ => {
            if let Some(open_start) = &open_start {
                let inner = replace_two_way(from, start, depth + 1)?;
                push_joined(&mut content, close(open_start, inner)?);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(open_end) = &open_end {
                let inner = replace_two_way(end, to, depth + 1)?;
                push_joined(&mut content, close(open_end, inner)?);
            }
        }
    }

    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(from: &ResolvedPos, to: &ResolvedPos, depth: usize) -> Result<Fragment, ModelError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let node = joinable(from, to, depth + 1)?;
        let inner = replace_two_way(from, to, depth + 1)?;
        push_joined(&mut content, close(&node, inner)?);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

/// Wraps the slice's content in copies of `along`'s ancestors so that its
/// open sides can be resolved like positions in a document.
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ModelError> {
    let extra = along.depth() - slice.open_start();
    let mut node = along.node(extra).copy(slice.content().clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_node(node));
    }

    let start = node.resolve(slice.open_start() + extra)?;
    let end = node.resolve(node.content_size() - slice.open_end() - extra)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::test_helpers::{doc, h, node, p, text};

    fn apply(document: &Node, from: usize, to: usize, slice: &Slice) -> Result<Node, ModelError> {
        document.replace(from, to, slice)
    }

    #[test]
    fn test_flat_insert() {
        let document = doc(vec![p("ac")]);
        let slice = Slice::new(Fragment::from_node(text("b")), 0, 0);

        assert_eq!(apply(&document, 2, 2, &slice).unwrap(), doc(vec![p("abc")]));
    }

    #[test]
    fn test_delete_across_nodes() {
        let document = doc(vec![p("one"), node("blockquote", vec![p("two")])]);

        assert_eq!(
            apply(&document, 4, 6, &Slice::empty()),
            Err(ModelError::Replace("Cannot join blockquote onto paragraph".to_owned()))
        );
        assert_eq!(
            apply(&document, 5, 12, &Slice::empty()).unwrap(),
            doc(vec![p("one")])
        );
    }

    #[test]
    fn test_join_textblocks_of_compatible_types() {
        let document = doc(vec![h(1, "head"), p("body")]);

        assert_eq!(
            apply(&document, 3, 9, &Slice::empty()).unwrap(),
            doc(vec![h(1, "hedy")])
        );
    }

    #[test]
    fn test_open_depth_errors() {
        let document = doc(vec![p("abc")]);
        let slice = doc(vec![p("x"), p("y")]).slice(2, 5).unwrap();

        assert_eq!(
            apply(&document, 0, 0, &slice),
            Err(ModelError::Replace(
                "Inserted content deeper than insertion position".to_owned()
            ))
        );
        assert_eq!(
            apply(&document, 1, 4, &Slice::new(slice.content().clone(), 1, 0)),
            Err(ModelError::Replace("Inconsistent open depths".to_owned()))
        );
    }

    #[test]
    fn test_invalid_content_is_rejected() {
        let document = doc(vec![p("abc")]);
        let slice = Slice::new(Fragment::from_node(text("loose")), 0, 0);

        assert_eq!(
            apply(&document, 0, 5, &slice),
            Err(ModelError::InvalidContent("doc".to_owned()))
        );
    }

    #[test]
    fn test_split_paragraph() {
        let document = doc(vec![p("abcd")]);
        let slice = doc(vec![p(""), p("")]).slice(1, 3).unwrap();

        assert_eq!(slice.open_start(), 1);
        assert_eq!(
            apply(&document, 3, 3, &slice).unwrap(),
            doc(vec![p("ab"), p("cd")])
        );
    }
}
