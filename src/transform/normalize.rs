//! Generic stages shared by every driver.
//!
//! [`ObjectToNode`] runs first and turns native objects into the base node shape: it moves the
//! native type, token and position keys under reserved keys and escapes native keys that would
//! collide with them. [`RolesDedup`] runs last and removes repeated roles.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ErrorFrame, ErrorKind, Result, TransformError};
use crate::node::{
    apply, escape_key, try_apply, Node, Object, Position, Value, KEY_END, KEY_ROLES, KEY_START,
    KEY_TOKEN, KEY_TYPE,
};
use crate::transform::Transformer;

// ============================================================================
// OBJECT TO NODE
// ============================================================================

/// Names of the native keys carrying type, token and positions.
///
/// Every setting is optional; keys that are not configured are left as regular fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObjectToNode {
    pub internal_type_key: Option<String>,
    /// Candidate token keys, in priority order. The first one present wins.
    pub token_keys: Vec<String>,
    pub offset_key: Option<String>,
    pub line_key: Option<String>,
    pub column_key: Option<String>,
    pub end_offset_key: Option<String>,
    pub end_line_key: Option<String>,
    pub end_column_key: Option<String>,
}

#[derive(Clone, Copy)]
enum Coord {
    Offset,
    Line,
    Col,
}

impl ObjectToNode {
    pub fn with_type_key(key: impl Into<String>) -> Self {
        Self {
            internal_type_key: Some(key.into()),
            ..Self::default()
        }
    }

    fn position_key(&self, key: &str) -> Option<(bool, Coord)> {
        let is = |k: &Option<String>| k.as_deref() == Some(key);
        if is(&self.offset_key) {
            Some((false, Coord::Offset))
        } else if is(&self.line_key) {
            Some((false, Coord::Line))
        } else if is(&self.column_key) {
            Some((false, Coord::Col))
        } else if is(&self.end_offset_key) {
            Some((true, Coord::Offset))
        } else if is(&self.end_line_key) {
            Some((true, Coord::Line))
        } else if is(&self.end_column_key) {
            Some((true, Coord::Col))
        } else {
            None
        }
    }

    /// Converts one native object. Returns `None` when there is nothing to change.
    fn convert(&self, obj: &Object) -> Result<Option<Node>> {
        let token_key = self.token_keys.iter().find(|k| obj.contains_key(k.as_str()));
        let mut out = Object::new();
        let mut start = Position::default();
        let mut end = Position::default();
        let mut changed = false;

        for (key, val) in obj.iter() {
            if self.internal_type_key.as_deref() == Some(key.as_str()) {
                let typ = val.as_str().ok_or_else(|| {
                    TransformError::new(ErrorKind::UnexpectedType {
                        found: val.type_name().to_string(),
                    })
                })?;
                out.insert(KEY_TYPE.to_string(), Node::from(typ));
                changed = true;
                continue;
            }
            if token_key == Some(key) {
                let token = match val {
                    Node::Value(v) => v.to_token(),
                    other => {
                        return Err(TransformError::new(ErrorKind::UnexpectedType {
                            found: other.type_name().to_string(),
                        })
                        .within(ErrorFrame::Key(key.clone())))
                    }
                };
                if let Some(token) = token {
                    out.insert(KEY_TOKEN.to_string(), Node::from(token));
                }
                changed = true;
                continue;
            }
            if let Some((is_end, coord)) = self.position_key(key) {
                let Some(n) = val.as_value().and_then(Value::as_int) else {
                    return Err(TransformError::new(ErrorKind::UnexpectedValue {
                        value: val.to_string(),
                    })
                    .within(ErrorFrame::Key(key.clone())));
                };
                let pos = if is_end { &mut end } else { &mut start };
                match coord {
                    Coord::Offset => pos.offset = Some(n),
                    Coord::Line => pos.line = Some(n),
                    Coord::Col => pos.col = Some(n),
                }
                changed = true;
                continue;
            }
            let escaped = escape_key(key);
            changed |= escaped != key.as_str();
            out.insert(escaped.into_owned(), val.clone());
        }

        if !start.is_empty() {
            out.insert(KEY_START.to_string(), start.to_node());
        }
        if !end.is_empty() {
            out.insert(KEY_END.to_string(), end.to_node());
        }
        Ok(changed.then(|| Node::Object(out)))
    }
}

impl Transformer for ObjectToNode {
    fn name(&self) -> &str {
        "object-to-node"
    }

    fn transform(&self, node: &Node) -> Result<Node> {
        let (out, changed) = try_apply(node, &mut |n: &Node| match n {
            Node::Object(obj) => self.convert(obj),
            _ => Ok(None),
        })?;
        debug!(changed, "native objects converted");
        Ok(out)
    }
}

// ============================================================================
// ROLES DEDUP
// ============================================================================

/// Removes repeated roles, keeping the first occurrence of each.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolesDedup;

fn dedup_roles(obj: &Object) -> Option<Node> {
    let Some(Node::List(roles)) = obj.get(KEY_ROLES) else {
        return None;
    };
    let mut seen: Vec<&Node> = Vec::with_capacity(roles.len());
    for role in roles {
        if !seen.contains(&role) {
            seen.push(role);
        }
    }
    if seen.len() == roles.len() {
        return None;
    }
    let uniq = Node::List(seen.into_iter().cloned().collect());
    Some(Node::Object(obj.update(KEY_ROLES.to_string(), uniq)))
}

impl Transformer for RolesDedup {
    fn name(&self) -> &str {
        "roles-dedup"
    }

    fn transform(&self, node: &Node) -> Result<Node> {
        let (out, _) = apply(node, &mut |n: &Node| match n {
            Node::Object(obj) => match dedup_roles(obj) {
                Some(nn) => (nn, true),
                None => (n.clone(), false),
            },
            _ => (n.clone(), false),
        });
        Ok(out)
    }
}
