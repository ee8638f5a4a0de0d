//! Rico-style and web DOM JSON trees (`componentLabel` / `bounds` / `children`)

use super::{attach, BoundingBox, CanonicalNode, INTERACTIVE_TAGS};
use serde::Deserialize;
use serde_json::Value;

fn label_of(node: &Value) -> Option<&str> {
    node.get("componentLabel")
        .or_else(|| node.get("label"))
        .and_then(Value::as_str)
}

fn bounds_of(node: &Value) -> Option<BoundingBox> {
    let coords = node
        .get("bounds")
        .or_else(|| node.get("box"))?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as i64))
        .collect::<Option<Vec<_>>>()?;
    match coords.as_slice() {
        [x1, y1, x2, y2] => BoundingBox::new(*x1, *y1, *x2, *y2),
        _ => None,
    }
}

/// Pre-order walk. Every node with a label and a resolvable box is kept;
/// visibility was already decided by whoever produced the tree.
pub(super) fn read_nodes(raw: &str, max_depth: usize) -> Result<Vec<CanonicalNode>, String> {
    let root = parse_unbounded(raw)?;

    let mut nodes = Vec::new();
    let mut stack: Vec<(&Value, usize, Option<usize>)> = vec![(&root, 0, None)];
    let mut depth_warned = false;

    while let Some((value, depth, parent)) = stack.pop() {
        if depth > max_depth {
            if !depth_warned {
                log::warn!("tree deeper than {} levels, ignoring the rest", max_depth);
                depth_warned = true;
            }
            continue;
        }

        let (retained, children) = match value {
            Value::Array(items) => (None, Some(items)),
            Value::Object(_) => {
                let retained = match (label_of(value), bounds_of(value)) {
                    (Some(label), Some(bbox)) => {
                        let node = CanonicalNode {
                            label: label.to_string(),
                            bbox,
                            visible: true,
                            text: value
                                .get("text")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            interactable: INTERACTIVE_TAGS.contains(&label),
                            children: Vec::new(),
                        };
                        Some(attach(&mut nodes, parent, node))
                    }
                    _ => None,
                };
                (retained, value.get("children").and_then(Value::as_array))
            }
            _ => (None, None),
        };

        if let Some(children) = children {
            let inherited = retained.or(parent);
            for child in children.iter().rev() {
                stack.push((child, depth + 1, inherited));
            }
        }
    }

    release(root);
    Ok(nodes)
}

/// Captured DOM trees nest two JSON levels per element, well past
/// serde_json's default recursion limit; parse on a growable stack instead.
fn parse_unbounded(raw: &str) -> Result<Value, String> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    deserializer.disable_recursion_limit();
    let deserializer = serde_stacker::Deserializer::new(&mut deserializer);
    let value = Value::deserialize(deserializer).map_err(|e| e.to_string())?;
    Ok(value)
}

/// Tear a parsed tree down without recursing once per nesting level.
fn release(root: Value) {
    let mut pending = vec![root];
    while let Some(mut value) = pending.pop() {
        match &mut value {
            Value::Array(items) => pending.append(items),
            Value::Object(map) => pending.extend(std::mem::take(map).into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}
