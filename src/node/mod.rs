//! Node model for native and universal trees.
//!
//! Every tree the engine touches (native input, intermediate stage output, normalized output)
//! is a [`Node`]. Objects are persistent `im::OrdMap`s, so a rewrite shares every untouched
//! subtree with its input and the input itself is never mutated.

// ============================================================================
// IMPORTS
// ============================================================================

use im::OrdMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

pub mod apply;

pub use apply::{apply, try_apply};

// ============================================================================
// RESERVED KEYS
// ============================================================================

/// Prefix shared by every key owned by the engine. Native keys starting with it are escaped.
pub const RESERVED_PREFIX: char = '@';

pub const KEY_TYPE: &str = "@type";
pub const KEY_TOKEN: &str = "@token";
pub const KEY_ROLES: &str = "@role";
pub const KEY_START: &str = "@start";
pub const KEY_END: &str = "@end";

/// Type tag of position records stored under [`KEY_START`] and [`KEY_END`].
pub const TYPE_POSITION: &str = "ast:Position";
pub const KEY_POS_OFFSET: &str = "offset";
pub const KEY_POS_LINE: &str = "line";
pub const KEY_POS_COL: &str = "col";

/// Escapes a native key so it can never collide with a reserved key.
///
/// ```rust
/// use uast_transformer::node::escape_key;
/// assert_eq!(escape_key("name"), "name");
/// assert_eq!(escape_key("@type"), "@@type");
/// ```
pub fn escape_key(key: &str) -> Cow<'_, str> {
    if key.starts_with(RESERVED_PREFIX) {
        Cow::Owned(format!("{}{}", RESERVED_PREFIX, key))
    } else {
        Cow::Borrowed(key)
    }
}

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// Field map of an object node. Iteration follows key order.
pub type Object = OrdMap<String, Node>;

/// A primitive leaf.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// A tree node: an object, a list or a primitive value.
///
/// # Examples
///
/// ```rust
/// use uast_transformer::node::Node;
/// let node: Node = serde_json::from_str(r#"{"ast_type": "Foo", "Name": "x"}"#).unwrap();
/// assert_eq!(node.get("Name"), Some(&Node::from("x")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Object(Object),
    List(Vec<Node>),
    Value(Value),
}

/// Runtime kind of a node, used by the mapping kind guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    List,
    Value,
}

// ============================================================================
// PUBLIC API IMPLEMENTATION
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Renders the value as token text. `Null` has no text.
    pub fn to_token(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
        }
    }
}

impl Node {
    pub fn null() -> Node {
        Node::Value(Value::Null)
    }

    /// Builds an object node from key/value pairs.
    ///
    /// ```rust
    /// use uast_transformer::node::Node;
    /// let node = Node::object([("a", Node::from(1)), ("b", Node::from(true))]);
    /// assert_eq!(node.as_object().map(|o| o.len()), Some(2));
    /// ```
    pub fn object<K, I>(pairs: I) -> Node
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Node)>,
    {
        Node::Object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<I: IntoIterator<Item = Node>>(items: I) -> Node {
        Node::List(items.into_iter().collect())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Object(_) => NodeKind::Object,
            Node::List(_) => NodeKind::List,
            Node::Value(_) => NodeKind::Value,
        }
    }

    /// Short human-readable name of the node's runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Object(_) => "object",
            Node::List(_) => "list",
            Node::Value(v) => v.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Value(Value::Null))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Node::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Looks up a field of an object node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// The reserved type tag of an object node, if any.
    pub fn ast_type(&self) -> Option<&str> {
        self.get(KEY_TYPE).and_then(Node::as_str)
    }

    pub fn token(&self) -> Option<&str> {
        self.get(KEY_TOKEN).and_then(Node::as_str)
    }

    /// Role names carried by an object node, in order.
    pub fn roles(&self) -> Vec<&str> {
        self.get(KEY_ROLES)
            .and_then(Node::as_list)
            .map(|items| items.iter().filter_map(Node::as_str).collect())
            .unwrap_or_default()
    }

    /// Pretty JSON rendering, used by the CLI.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<Value> for Node {
    fn from(v: Value) -> Self {
        Node::Value(v)
    }
}

impl From<Object> for Node {
    fn from(obj: Object) -> Self {
        Node::Object(obj)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::List(items)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Value(Value::String(s))
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Value(Value::Int(i))
    }
}

impl From<f64> for Node {
    fn from(f: f64) -> Self {
        Node::Value(Value::Float(f))
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Value(Value::Bool(b))
    }
}

// ============================================================================
// POSITIONS
// ============================================================================

/// A position record. Line and column stay empty until a source-aware stage fills them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: Option<i64>,
    pub line: Option<i64>,
    pub col: Option<i64>,
}

impl Position {
    pub fn is_empty(&self) -> bool {
        self.offset.is_none() && self.line.is_none() && self.col.is_none()
    }

    pub fn to_node(&self) -> Node {
        let mut obj = Object::new();
        obj.insert(KEY_TYPE.to_string(), Node::from(TYPE_POSITION));
        if let Some(offset) = self.offset {
            obj.insert(KEY_POS_OFFSET.to_string(), Node::from(offset));
        }
        if let Some(line) = self.line {
            obj.insert(KEY_POS_LINE.to_string(), Node::from(line));
        }
        if let Some(col) = self.col {
            obj.insert(KEY_POS_COL.to_string(), Node::from(col));
        }
        Node::Object(obj)
    }

    /// Reads a position record back; `None` when the node is not one.
    pub fn from_node(node: &Node) -> Option<Position> {
        if node.ast_type() != Some(TYPE_POSITION) {
            return None;
        }
        let int = |key| node.get(key).and_then(Node::as_value).and_then(Value::as_int);
        Some(Position {
            offset: int(KEY_POS_OFFSET),
            line: int(KEY_POS_LINE),
            col: int(KEY_POS_COL),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_numbers_keep_integer_and_float_apart() {
        let node: Node = serde_json::from_str(r#"[1, 1.5, -3, null, true, "s"]"#).unwrap();
        assert_eq!(
            node,
            Node::list([
                Node::from(1),
                Node::from(1.5),
                Node::from(-3),
                Node::null(),
                Node::from(true),
                Node::from("s"),
            ])
        );
    }

    #[test]
    fn objects_serialize_in_key_order() {
        let node = Node::object([("b", Node::from(2)), ("a", Node::from(1))]);
        assert_eq!(node.to_string(), r#"{"a":1,"b":2}"#);
        let back: Node = serde_json::from_str(&node.to_string()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn value_equality_is_primitive_equality() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::String("1".into()), Value::Int(1));
    }

    #[test]
    fn reserved_accessors() {
        let node = Node::object([
            (KEY_TYPE, Node::from("Foo")),
            (KEY_TOKEN, Node::from("x")),
            (KEY_ROLES, Node::list([Node::from("Identifier")])),
        ]);
        assert_eq!(node.ast_type(), Some("Foo"));
        assert_eq!(node.token(), Some("x"));
        assert_eq!(node.roles(), vec!["Identifier"]);
    }

    #[test]
    fn position_record_round_trips() {
        let pos = Position {
            offset: Some(10),
            line: None,
            col: None,
        };
        let node = pos.to_node();
        assert_eq!(node.get(KEY_POS_LINE), None);
        assert_eq!(Position::from_node(&node), Some(pos));
        assert_eq!(Position::from_node(&Node::from(3)), None);
    }
}
