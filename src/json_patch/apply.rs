use std::rc::Rc;

use super::{Field, PatchError, PatchOp, PatchValue, Pointer};
use crate::model::NodeJson;

/// The node at the child path of `pointer`, ignoring its field.
pub fn get<'a>(doc: &'a NodeJson, pointer: &Pointer) -> Option<&'a NodeJson> {
    pointer
        .children()
        .iter()
        .try_fold(doc, |node, index| node.content().get(*index).map(AsRef::as_ref))
}

/// Applies a single operation, returning the patched tree. Nodes off the
/// operation's path are shared with `doc`.
pub fn apply_operation(doc: &NodeJson, operation: &PatchOp) -> Result<NodeJson, PatchError> {
    let pointer = operation.path();
    let missing = || PatchError::MissingTarget(pointer.to_string());

    if *pointer.field() == Field::Node {
        let Some((index, parents)) = pointer.children().split_last() else {
            return match operation {
                PatchOp::Replace {
                    value: PatchValue::Node(node),
                    ..
                } => Ok(node.as_ref().clone()),
                _ => Err(PatchError::InvalidValue(pointer.to_string())),
            };
        };

        return update(doc, parents, &mut |node| {
            let NodeJson::Element(element) = node else {
                return Err(missing());
            };
            let content = &mut element.content;
            match operation {
                PatchOp::Add {
                    value: PatchValue::Node(value),
                    ..
                } if *index <= content.len() => content.insert(*index, value.clone()),
                PatchOp::Remove { .. } if *index < content.len() => {
                    content.remove(*index);
                }
                PatchOp::Replace {
                    value: PatchValue::Node(value),
                    ..
                } if *index < content.len() => content[*index] = value.clone(),
                PatchOp::Add {
                    value: PatchValue::Node(_),
                    ..
                }
                | PatchOp::Remove { .. }
                | PatchOp::Replace {
                    value: PatchValue::Node(_),
                    ..
                } => return Err(missing()),
                PatchOp::Add { .. } | PatchOp::Replace { .. } => {
                    return Err(PatchError::InvalidValue(pointer.to_string()));
                }
            }
            Ok(())
        });
    }

    update(doc, pointer.children(), &mut |node| {
        match (pointer.field(), operation.value(), node) {
            (Field::Type, Some(PatchValue::Type(value)), NodeJson::Element(element)) => {
                element.node_type.clone_from(value);
            }
            (Field::Type, Some(PatchValue::Type(value)), NodeJson::Text(text)) => {
                text.node_type.clone_from(value);
            }
            (Field::Text, Some(PatchValue::Text(value)), NodeJson::Text(text)) => {
                text.text.clone_from(value);
            }
            (Field::Marks, Some(PatchValue::Marks(marks)), NodeJson::Element(element)) => {
                element.marks.clone_from(marks);
            }
            (Field::Marks, Some(PatchValue::Marks(marks)), NodeJson::Text(text)) => {
                text.marks.clone_from(marks);
            }
            (Field::Marks, None, NodeJson::Element(element)) => element.marks.clear(),
            (Field::Marks, None, NodeJson::Text(text)) => text.marks.clear(),
            (Field::Attr(key), value, NodeJson::Element(element)) => match (operation, value) {
                (PatchOp::Add { .. }, Some(PatchValue::Attr(value))) => {
                    element.attrs.insert(key.clone(), value.clone());
                }
                (PatchOp::Replace { .. }, Some(PatchValue::Attr(value))) => {
                    let slot = element.attrs.get_mut(key).ok_or_else(missing)?;
                    slot.clone_from(value);
                }
                (PatchOp::Remove { .. }, _) => {
                    element.attrs.remove(key).ok_or_else(missing)?;
                }
                _ => return Err(PatchError::InvalidValue(pointer.to_string())),
            },
            (Field::Text | Field::Attr(_), _, _) => return Err(missing()),
            _ => return Err(PatchError::InvalidValue(pointer.to_string())),
        }
        Ok(())
    })
}

/// Rebuilds the path from `doc` down to the node at `children`, letting `f`
/// edit a copy of that node.
fn update<F>(doc: &NodeJson, children: &[usize], f: &mut F) -> Result<NodeJson, PatchError>
where
    F: FnMut(&mut NodeJson) -> Result<(), PatchError>,
{
    let mut node = doc.clone();
    match children.split_first() {
        None => f(&mut node)?,
        Some((index, rest)) => {
            let NodeJson::Element(element) = &mut node else {
                return Err(PatchError::MissingTarget(format!("/content/{index}")));
            };
            let child = element
                .content
                .get(*index)
                .ok_or_else(|| PatchError::MissingTarget(format!("/content/{index}")))?;
            let updated = update(child, rest, f)?;
            element.content[*index] = Rc::new(updated);
        }
    }
    Ok(node)
}

/// Applies `operations` in order. Operations that fail leave the tree
/// untouched and are reported in the returned list, one result per
/// operation.
pub fn apply_patch(doc: &NodeJson, operations: &[PatchOp]) -> (NodeJson, Vec<Result<(), PatchError>>) {
    let mut current = doc.clone();
    let results = operations
        .iter()
        .map(|operation| -> Result<(), PatchError> {
            let patched = apply_operation(&current, operation)?;
            current = patched;
            Ok(())
        })
        .collect();
    (current, results)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn node(value: serde_json::Value) -> NodeJson { serde_json::from_value(value).unwrap() }

    fn doc() -> NodeJson {
        node(json!({
            "type": "doc",
            "content": [
                { "type": "heading", "attrs": { "level": 1 }, "content": [{ "type": "text", "text": "Title" }] },
                { "type": "paragraph", "content": [{ "type": "text", "text": "body" }] }
            ]
        }))
    }

    fn op(value: serde_json::Value) -> PatchOp {
        let path: Pointer = value["path"].as_str().unwrap().parse().unwrap();
        match value["op"].as_str().unwrap() {
            "remove" => PatchOp::Remove { path },
            kind => {
                let value = match path.field() {
                    Field::Node => PatchValue::Node(Rc::new(node(value["value"].clone()))),
                    Field::Type => PatchValue::Type(value["value"].as_str().unwrap().to_owned()),
                    Field::Text => PatchValue::Text(value["value"].as_str().unwrap().to_owned()),
                    Field::Attr(_) => PatchValue::Attr(value["value"].clone()),
                    Field::Marks => PatchValue::Marks(serde_json::from_value(value["value"].clone()).unwrap()),
                };
                if kind == "add" {
                    PatchOp::Add { path, value }
                } else {
                    PatchOp::Replace { path, value }
                }
            }
        }
    }

    #[test]
    fn test_field_updates() {
        let patched = apply_operation(
            &doc(),
            &op(json!({ "op": "replace", "path": "/content/1/content/0/text", "value": "changed" })),
        )
        .unwrap();
        assert_eq!(
            get(&patched, &"/content/1/content/0".parse().unwrap()),
            Some(&node(json!({ "type": "text", "text": "changed" })))
        );

        let patched = apply_operation(
            &patched,
            &op(json!({ "op": "replace", "path": "/content/0/attrs/level", "value": 3 })),
        )
        .unwrap();
        let NodeJson::Element(heading) = get(&patched, &"/content/0".parse().unwrap()).unwrap() else {
            panic!("expected an element");
        };
        assert_eq!(heading.attrs["level"], json!(3));

        let patched = apply_operation(
            &patched,
            &op(json!({ "op": "replace", "path": "/content/1/type", "value": "heading" })),
        )
        .unwrap();
        assert_eq!(patched.content()[1].node_type(), "heading");
    }

    #[test]
    fn test_updates_share_untouched_children() {
        let original = doc();
        let patched = apply_operation(
            &original,
            &op(json!({ "op": "replace", "path": "/content/1/content/0/text", "value": "changed" })),
        )
        .unwrap();

        assert!(Rc::ptr_eq(&original.content()[0], &patched.content()[0]));
        assert!(!Rc::ptr_eq(&original.content()[1], &patched.content()[1]));
        assert_eq!(original, doc());
    }

    #[test]
    fn test_child_operations() {
        let patched = apply_operation(
            &doc(),
            &op(json!({ "op": "add", "path": "/content/2", "value": { "type": "paragraph" } })),
        )
        .unwrap();
        assert_eq!(patched.content().len(), 3);

        let patched = apply_operation(&patched, &op(json!({ "op": "remove", "path": "/content/0" }))).unwrap();
        assert_eq!(patched.content()[0].node_type(), "paragraph");
        assert_eq!(patched.content().len(), 2);
    }

    #[test]
    fn test_missing_targets_are_reported() {
        let operations = vec![
            op(json!({ "op": "remove", "path": "/content/5" })),
            op(json!({ "op": "replace", "path": "/content/0/text", "value": "x" })),
            op(json!({ "op": "remove", "path": "/content/1/attrs/level" })),
            op(json!({ "op": "replace", "path": "/content/1/content/0/text", "value": "ok" })),
            op(json!({ "op": "add", "path": "/content/9/content/0", "value": { "type": "paragraph" } })),
        ];

        let (patched, results) = apply_patch(&doc(), &operations);
        assert_eq!(
            results,
            vec![
                Err(PatchError::MissingTarget("/content/5".to_owned())),
                Err(PatchError::MissingTarget("/content/0/text".to_owned())),
                Err(PatchError::MissingTarget("/content/1/attrs/level".to_owned())),
                Ok(()),
                Err(PatchError::MissingTarget("/content/9".to_owned())),
            ]
        );
        assert_eq!(patched.content()[1].content()[0].as_ref(), &node(json!({ "type": "text", "text": "ok" })));
    }
}
