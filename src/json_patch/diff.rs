use std::rc::Rc;

use super::{Field, PatchOp, PatchValue, Pointer};
use crate::{
    model::{ElementJson, NodeJson, TextJson},
    utils::deadline::{Deadline, TimedOut},
};

/// Computes the operations turning `input` into `output`.
///
/// Nodes are compared field by field: type, attributes key by key, children
/// and marks. Children are aligned with a Levenshtein distance, preferring
/// removals over additions over replacements on ties, and replaced children
/// are diffed recursively. Operations come out in application order: each
/// path is valid once every earlier operation has been applied.
pub fn diff(input: &NodeJson, output: &NodeJson, deadline: &Deadline) -> Result<Vec<PatchOp>, TimedOut> {
    let mut operations = Vec::new();
    diff_node(input, output, &Pointer::root(), deadline, &mut operations)?;
    Ok(operations)
}

fn diff_node(
    input: &NodeJson,
    output: &NodeJson,
    pointer: &Pointer,
    deadline: &Deadline,
    operations: &mut Vec<PatchOp>,
) -> Result<(), TimedOut> {
    if input == output {
        return Ok(());
    }

    match (input, output) {
        (NodeJson::Element(input), NodeJson::Element(output)) => {
            diff_element(input, output, pointer, deadline, operations)
        }
        (NodeJson::Text(input), NodeJson::Text(output)) => {
            diff_text(input, output, pointer, operations);
            Ok(())
        }
        _ => {
            operations.push(PatchOp::Replace {
                path: pointer.clone(),
                value: PatchValue::Node(Rc::new(output.clone())),
            });
            Ok(())
        }
    }
}

fn diff_text(input: &TextJson, output: &TextJson, pointer: &Pointer, operations: &mut Vec<PatchOp>) {
    if input.node_type != output.node_type {
        operations.push(PatchOp::Replace {
            path: pointer.with_field(Field::Type),
            value: PatchValue::Type(output.node_type.clone()),
        });
    }
    if input.text != output.text {
        operations.push(PatchOp::Replace {
            path: pointer.with_field(Field::Text),
            value: PatchValue::Text(output.text.clone()),
        });
    }
    if input.marks != output.marks {
        operations.push(PatchOp::Replace {
            path: pointer.with_field(Field::Marks),
            value: PatchValue::Marks(output.marks.clone()),
        });
    }
}

fn diff_element(
    input: &ElementJson,
    output: &ElementJson,
    pointer: &Pointer,
    deadline: &Deadline,
    operations: &mut Vec<PatchOp>,
) -> Result<(), TimedOut> {
    if input.node_type != output.node_type {
        operations.push(PatchOp::Replace {
            path: pointer.with_field(Field::Type),
            value: PatchValue::Type(output.node_type.clone()),
        });
    }

    for key in input.attrs.keys().filter(|key| !output.attrs.contains_key(*key)) {
        operations.push(PatchOp::Remove {
            path: pointer.with_field(Field::Attr(key.clone())),
        });
    }
    for (key, value) in &output.attrs {
        match input.attrs.get(key) {
            None => operations.push(PatchOp::Add {
                path: pointer.with_field(Field::Attr(key.clone())),
                value: PatchValue::Attr(value.clone()),
            }),
            Some(old) if old != value => operations.push(PatchOp::Replace {
                path: pointer.with_field(Field::Attr(key.clone())),
                value: PatchValue::Attr(value.clone()),
            }),
            Some(_) => {}
        }
    }

    diff_children(&input.content, &output.content, pointer, deadline, operations)?;

    if input.marks != output.marks {
        operations.push(PatchOp::Replace {
            path: pointer.with_field(Field::Marks),
            value: PatchValue::Marks(output.marks.clone()),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Remove(usize),
    Add(usize, usize),
    Replace(usize, usize),
}

fn diff_children(
    input: &[Rc<NodeJson>],
    output: &[Rc<NodeJson>],
    pointer: &Pointer,
    deadline: &Deadline,
    operations: &mut Vec<PatchOp>,
) -> Result<(), TimedOut> {
    let width = output.len() + 1;
    let mut costs = vec![0_usize; (input.len() + 1) * width];
    for i in 0..=input.len() {
        deadline.check()?;
        for j in 0..=output.len() {
            costs[i * width + j] = if i == 0 {
                j
            } else if j == 0 {
                i
            } else if input[i - 1] == output[j - 1] {
                costs[(i - 1) * width + j - 1]
            } else {
                1 + costs[(i - 1) * width + j]
                    .min(costs[i * width + j - 1])
                    .min(costs[(i - 1) * width + j - 1])
            };
        }
    }

    let mut edits = Vec::new();
    let (mut i, mut j) = (input.len(), output.len());
    while i > 0 || j > 0 {
        if i == 0 {
            edits.push(Edit::Add(i, j - 1));
            j -= 1;
            continue;
        }
        if j == 0 {
            edits.push(Edit::Remove(i - 1));
            i -= 1;
            continue;
        }
        if input[i - 1] == output[j - 1] {
            i -= 1;
            j -= 1;
            continue;
        }

        let remove = costs[(i - 1) * width + j];
        let add = costs[i * width + j - 1];
        let replace = costs[(i - 1) * width + j - 1];
        let min = remove.min(add).min(replace);
        if remove == min {
            edits.push(Edit::Remove(i - 1));
            i -= 1;
        } else if add == min {
            edits.push(Edit::Add(i, j - 1));
            j -= 1;
        } else {
            edits.push(Edit::Replace(i - 1, j - 1));
            i -= 1;
            j -= 1;
        }
    }

    // `padding` tracks how far earlier operations moved the remaining input
    // children.
    let mut padding: isize = 0;
    for edit in edits.into_iter().rev() {
        match edit {
            Edit::Add(index, value) => {
                operations.push(PatchOp::Add {
                    path: pointer.child((index as isize + padding) as usize),
                    value: PatchValue::Node(output[value].clone()),
                });
                padding += 1;
            }
            Edit::Remove(index) => {
                operations.push(PatchOp::Remove {
                    path: pointer.child((index as isize + padding) as usize),
                });
                padding -= 1;
            }
            Edit::Replace(index, value) => {
                let child = pointer.child((index as isize + padding) as usize);
                diff_node(&input[index], &output[value], &child, deadline, operations)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::json_patch::apply_patch;

    fn node(value: serde_json::Value) -> NodeJson { serde_json::from_value(value).unwrap() }

    fn paths(operations: &[PatchOp]) -> Vec<String> {
        operations
            .iter()
            .map(|operation| {
                let op = match operation {
                    PatchOp::Add { .. } => "add",
                    PatchOp::Remove { .. } => "remove",
                    PatchOp::Replace { .. } => "replace",
                };
                format!("{op} {}", operation.path())
            })
            .collect()
    }

    fn paragraph(text: &str) -> serde_json::Value {
        json!({ "type": "paragraph", "content": [{ "type": "text", "text": text }] })
    }

    #[test]
    fn test_equal_documents() {
        let doc = node(json!({ "type": "doc", "content": [paragraph("a")] }));
        assert!(diff(&doc, &doc, &Deadline::none()).unwrap().is_empty());
    }

    #[test]
    fn test_text_and_markup_changes() {
        let input = node(json!({
            "type": "doc",
            "content": [
                { "type": "heading", "attrs": { "level": 1 }, "content": [{ "type": "text", "text": "Title" }] },
                paragraph("hello world")
            ]
        }));
        let output = node(json!({
            "type": "doc",
            "content": [
                { "type": "heading", "attrs": { "level": 2 }, "content": [{ "type": "text", "text": "Title" }] },
                paragraph("hello there")
            ]
        }));

        let operations = diff(&input, &output, &Deadline::none()).unwrap();
        assert_eq!(
            paths(&operations),
            vec!["replace /content/0/attrs/level", "replace /content/1/content/0/text"]
        );
        assert_eq!(
            serde_json::to_value(&operations[1]).unwrap(),
            json!({ "op": "replace", "path": "/content/1/content/0/text", "value": "hello there" })
        );
    }

    #[test]
    fn test_children_are_aligned() {
        let input = node(json!({ "type": "doc", "content": [paragraph("a"), paragraph("b"), paragraph("c")] }));
        let output = node(json!({ "type": "doc", "content": [paragraph("b"), paragraph("c"), paragraph("d")] }));

        let operations = diff(&input, &output, &Deadline::none()).unwrap();
        assert_eq!(paths(&operations), vec!["remove /content/0", "add /content/2"]);

        let (patched, results) = apply_patch(&input, &operations);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(patched, output);
    }

    #[test]
    fn test_operations_apply_in_sequence() {
        let input = node(json!({
            "type": "doc",
            "content": [paragraph("one"), paragraph("two"), paragraph("three"), paragraph("four")]
        }));
        let output = node(json!({
            "type": "doc",
            "content": [paragraph("zero"), paragraph("two"), paragraph("four"), paragraph("five")]
        }));

        let operations = diff(&input, &output, &Deadline::none()).unwrap();
        let (patched, results) = apply_patch(&input, &operations);

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(patched, output);
    }

    #[test]
    fn test_kind_change_replaces_node() {
        let input = node(json!({ "type": "paragraph", "content": [{ "type": "text", "text": "a" }] }));
        let output = node(json!({
            "type": "paragraph",
            "content": [{ "type": "image", "attrs": { "src": "a.png" } }]
        }));

        let operations = diff(&input, &output, &Deadline::none()).unwrap();
        assert_eq!(paths(&operations), vec!["replace /content/0"]);
    }

    #[test]
    fn test_timeout() {
        let input = node(json!({ "type": "doc", "content": [paragraph("a")] }));
        let output = node(json!({ "type": "doc", "content": [paragraph("b")] }));

        assert_eq!(
            diff(&input, &output, &Deadline::after(Some(Duration::ZERO))),
            Err(TimedOut)
        );
    }
}
