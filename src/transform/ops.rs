//! # Operation Algebra
//!
//! An [`Op`] describes a tree shape. Every op can be used in two directions:
//!
//! - **check**: match a node against the shape, binding captured sub-values into a [`State`];
//! - **construct**: build a node of that shape from the bindings in a [`State`].
//!
//! A mapping uses the same op as a matcher on one side and a constructor on the other, which is
//! what makes rules reversible.
//!
//! ## Check results
//!
//! `Ok(false)` means "no match": the node simply has another shape and the next rule may be
//! tried. `Err(_)` is a hard failure (conflicting bindings, unclaimed fields, broken rules) and
//! aborts the whole run.
//!
//! ## Flags
//!
//! [`Op::If`], [`Op::Opt`] and optional object fields share one convention: a flag variable is
//! bound when the optional part is present and left unbound when it is absent. Construction
//! only looks at whether the flag is bound.

use crate::errors::{ErrorFrame, ErrorKind, Result, ResultExt, TransformError};
use crate::node::{Node, NodeKind, Object, Value, KEY_TYPE};
use crate::transform::state::State;

// ============================================================================
// SECTION 1: CORE DATA STRUCTURES
// ============================================================================

/// A reusable, stateless shape description.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Binds the node to a variable; constructs the bound value.
    Var(String),
    /// Matches one literal node; constructs it.
    Is(Node),
    /// Matches any node without binding anything; constructs null.
    Any,
    /// Object pattern. Every key of the node must be claimed by a field.
    Obj(Fields),
    /// Object pattern that tolerates extra keys: they are stored in `var` on check and written
    /// back on construct.
    Part { var: String, fields: Fields },
    /// Positional list pattern.
    Arr(Vec<Op>),
    /// Concatenation of list ops. At most one operand may have an unknown length.
    Append(Vec<Op>),
    /// List op that never matches or produces an empty list.
    NotEmpty(Box<Op>),
    /// Picks `then` when `cond` is bound, `otherwise` when it is not.
    If {
        cond: String,
        then: Box<Op>,
        otherwise: Box<Op>,
    },
    /// A node that may be null; `flag` is bound when it is not.
    Opt { flag: String, op: Box<Op> },
    /// Applies `op` to every list element, each in its own nested scope stored under `var`.
    Each { var: String, op: Box<Op> },
    /// All ops describe the same node; construction threads each result into the next op.
    Seq(Vec<Op>),
    /// Bidirectional value table. Pairs are `(native, normalized)`.
    Lookup { op: Box<Op>, table: Vec<(Value, Value)> },
}

/// Which node kind an op can possibly match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Object,
    List,
    Any,
}

impl OpKind {
    /// Whether a node of this runtime kind can match at all.
    pub fn admits(self, node: &Node) -> bool {
        match self {
            OpKind::Object => node.kind() == NodeKind::Object,
            OpKind::List => node.kind() == NodeKind::List,
            OpKind::Any => true,
        }
    }
}

/// One named field of an object pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub op: Op,
    /// Flag variable bound when the field is present. `None` makes the field required.
    pub optional: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, op: Op) -> Self {
        Self {
            name: name.into(),
            op,
            optional: None,
        }
    }

    pub fn optional(name: impl Into<String>, flag: impl Into<String>, op: Op) -> Self {
        Self {
            name: name.into(),
            op,
            optional: Some(flag.into()),
        }
    }
}

/// Ordered field list of an object pattern.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields(Vec<Field>);

// ============================================================================
// SECTION 2: CONSTRUCTORS
// ============================================================================

impl Op {
    pub fn var(name: impl Into<String>) -> Op {
        Op::Var(name.into())
    }

    pub fn is(node: impl Into<Node>) -> Op {
        Op::Is(node.into())
    }

    pub fn obj(fields: Fields) -> Op {
        Op::Obj(fields)
    }

    /// Object pattern whose reserved type field equals `typ`.
    pub fn typed_obj(typ: &str, mut fields: Fields) -> Op {
        fields.set_field(Field::new(KEY_TYPE, Op::is(typ)));
        Op::Obj(fields)
    }

    pub fn part(var: impl Into<String>, fields: Fields) -> Op {
        Op::Part {
            var: var.into(),
            fields,
        }
    }

    pub fn arr(items: Vec<Op>) -> Op {
        Op::Arr(items)
    }

    pub fn append(items: Vec<Op>) -> Op {
        Op::Append(items)
    }

    pub fn not_empty(op: Op) -> Op {
        Op::NotEmpty(Box::new(op))
    }

    pub fn if_(cond: impl Into<String>, then: Op, otherwise: Op) -> Op {
        Op::If {
            cond: cond.into(),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn opt(flag: impl Into<String>, op: Op) -> Op {
        Op::Opt {
            flag: flag.into(),
            op: Box::new(op),
        }
    }

    pub fn each(var: impl Into<String>, op: Op) -> Op {
        Op::Each {
            var: var.into(),
            op: Box::new(op),
        }
    }

    pub fn seq(ops: Vec<Op>) -> Op {
        Op::Seq(ops)
    }

    pub fn lookup(op: Op, table: Vec<(Value, Value)>) -> Op {
        Op::Lookup {
            op: Box::new(op),
            table,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Op::Var(_) => "var",
            Op::Is(_) => "is",
            Op::Any => "any",
            Op::Obj(_) => "obj",
            Op::Part { .. } => "part",
            Op::Arr(_) => "arr",
            Op::Append(_) => "append",
            Op::NotEmpty(_) => "not_empty",
            Op::If { .. } => "if",
            Op::Opt { .. } => "opt",
            Op::Each { .. } => "each",
            Op::Seq(_) => "seq",
            Op::Lookup { .. } => "lookup",
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Op::Obj(_) | Op::Part { .. } => OpKind::Object,
            Op::Arr(_) | Op::Append(_) | Op::Each { .. } => OpKind::List,
            Op::NotEmpty(op) => op.kind(),
            Op::Is(node) => match node.kind() {
                NodeKind::Object => OpKind::Object,
                NodeKind::List => OpKind::List,
                NodeKind::Value => OpKind::Any,
            },
            Op::If {
                then, otherwise, ..
            } => {
                let kind = then.kind();
                if kind == otherwise.kind() {
                    kind
                } else {
                    OpKind::Any
                }
            }
            Op::Seq(ops) => ops
                .iter()
                .map(Op::kind)
                .find(|k| *k != OpKind::Any)
                .unwrap_or(OpKind::Any),
            Op::Var(_) | Op::Any | Op::Opt { .. } | Op::Lookup { .. } => OpKind::Any,
        }
    }

    /// Number of list elements the op always matches or produces, when it is fixed.
    fn fixed_len(&self) -> Option<usize> {
        match self {
            Op::Arr(items) => Some(items.len()),
            Op::NotEmpty(op) => op.fixed_len(),
            Op::Is(Node::List(items)) => Some(items.len()),
            Op::Append(items) => items.iter().map(Op::fixed_len).sum(),
            _ => None,
        }
    }
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a required field.
    pub fn field(mut self, name: impl Into<String>, op: Op) -> Self {
        self.0.push(Field::new(name, op));
        self
    }

    pub fn field_with(mut self, field: Field) -> Self {
        self.0.push(field);
        self
    }

    /// Appends an optional field guarded by `flag`.
    pub fn optional(mut self, name: impl Into<String>, flag: impl Into<String>, op: Op) -> Self {
        self.0.push(Field::optional(name, flag, op));
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.0.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    /// Replaces the field with the same name, or appends it.
    pub fn set_field(&mut self, field: Field) {
        match self.0.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.0.push(field),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Fields(iter.into_iter().collect())
    }
}

// ============================================================================
// SECTION 3: CHECK
// ============================================================================

impl Op {
    /// Matches `node` against this shape, writing bindings into `st`.
    pub fn check(&self, st: &mut State, node: &Node) -> Result<bool> {
        match self {
            Op::Var(name) => {
                st.set_var(name, node.clone())?;
                Ok(true)
            }
            Op::Is(expected) => Ok(node == expected),
            Op::Any => Ok(true),
            Op::Obj(fields) => Ok(fields.check(st, node, false)?.is_some()),
            Op::Part { var, fields } => match fields.check(st, node, true)? {
                Some(rest) => {
                    st.set_var(var, Node::Object(rest))?;
                    Ok(true)
                }
                None => Ok(false),
            },
            Op::Arr(items) => {
                let Node::List(list) = node else {
                    return Ok(false);
                };
                check_positional(st, items, list)
            }
            Op::Append(items) => {
                let Node::List(list) = node else {
                    return Ok(false);
                };
                check_append(st, items, list).within(ErrorFrame::Append)
            }
            Op::NotEmpty(op) => {
                if let Node::List(list) = node {
                    if list.is_empty() {
                        return Ok(false);
                    }
                }
                op.check(st, node)
            }
            Op::If {
                cond,
                then,
                otherwise,
            } => {
                let mut sub = st.clone();
                if then.check(&mut sub, node)? {
                    st.apply_from(&sub);
                    st.set_var(cond, Node::from(true))?;
                    return Ok(true);
                }
                let mut sub = st.clone();
                if otherwise.check(&mut sub, node)? {
                    st.apply_from(&sub);
                    return Ok(true);
                }
                Ok(false)
            }
            Op::Opt { flag, op } => {
                if node.is_null() {
                    return Ok(true);
                }
                if !op.check(st, node)? {
                    return Ok(false);
                }
                st.set_var(flag, Node::from(true))?;
                Ok(true)
            }
            Op::Each { var, op } => {
                let Node::List(list) = node else {
                    return Ok(false);
                };
                let mut subs = Vec::with_capacity(list.len());
                for (index, item) in list.iter().enumerate() {
                    let mut sub = State::new();
                    let frame = ErrorFrame::Elem {
                        index,
                        op: op.name(),
                    };
                    if !op.check(&mut sub, item).within(frame)? {
                        return Ok(false);
                    }
                    subs.push(sub);
                }
                st.set_state_var(var, subs)?;
                Ok(true)
            }
            Op::Seq(ops) => {
                for (index, op) in ops.iter().enumerate() {
                    let frame = ErrorFrame::Operand {
                        index,
                        op: op.name(),
                    };
                    if !op.check(st, node).within(frame)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Op::Lookup { op, table } => {
                let Node::Value(v) = node else {
                    return Ok(false);
                };
                match table.iter().find(|(native, _)| native == v) {
                    Some((_, norm)) => op.check(st, &Node::Value(norm.clone())),
                    None => Ok(false),
                }
            }
        }
    }
}

/// Matches list elements one by one on a scratch scope, merged only when all of them match.
fn check_positional(st: &mut State, items: &[Op], list: &[Node]) -> Result<bool> {
    if items.len() != list.len() {
        return Ok(false);
    }
    let mut sub = st.clone();
    for (index, (op, node)) in items.iter().zip(list).enumerate() {
        let frame = ErrorFrame::Elem {
            index,
            op: op.name(),
        };
        if !op.check(&mut sub, node).within(frame)? {
            return Ok(false);
        }
    }
    st.apply_from(&sub);
    Ok(true)
}

/// Splits the list between the operands of an append: fixed-length operands take exactly
/// their length, the single unknown-length operand takes the rest.
fn check_append(st: &mut State, items: &[Op], list: &[Node]) -> Result<bool> {
    let lens: Vec<Option<usize>> = items.iter().map(Op::fixed_len).collect();
    let unknown = lens.iter().filter(|l| l.is_none()).count();
    if unknown > 1 {
        return Err(TransformError::config(format!(
            "append with {} operands of unknown length cannot be matched",
            unknown
        )));
    }
    let known: usize = lens.iter().flatten().sum();
    if known > list.len() || (unknown == 0 && known != list.len()) {
        return Ok(false);
    }
    let rest = list.len() - known;

    let mut sub = st.clone();
    let mut at = 0;
    for (index, (op, len)) in items.iter().zip(&lens).enumerate() {
        let len = len.unwrap_or(rest);
        let part = Node::List(list[at..at + len].to_vec());
        at += len;
        let frame = ErrorFrame::Operand {
            index,
            op: op.name(),
        };
        if !op.check(&mut sub, &part).within(frame)? {
            return Ok(false);
        }
    }
    st.apply_from(&sub);
    Ok(true)
}

impl Fields {
    /// Checks an object node. Returns the keys nobody consumed, or `None` on no match.
    ///
    /// With `partial == false` any unconsumed key is an [`ErrorKind::UnusedField`] error; the
    /// error is only raised once every field matched, so a shape mismatch stays a no-match.
    pub fn check(&self, st: &mut State, node: &Node, partial: bool) -> Result<Option<Object>> {
        let Node::Object(obj) = node else {
            return Ok(None);
        };
        st.start_object("")?;
        let matched = self.check_fields(st, obj);
        let consumed = st.finish_object("")?;
        if !matched? {
            return Ok(None);
        }

        let rest: Object = obj
            .iter()
            .filter(|(key, _)| !consumed.contains_key(*key))
            .map(|(key, val)| (key.clone(), val.clone()))
            .collect();
        if !partial {
            if let Some(key) = rest.keys().next() {
                return Err(TransformError::new(ErrorKind::UnusedField { key: key.clone() }));
            }
        }
        Ok(Some(rest))
    }

    /// Checks the type field before any other, so a node of another type never reaches the
    /// remaining field ops.
    fn check_fields(&self, st: &mut State, obj: &Object) -> Result<bool> {
        let typed = self.0.iter().filter(|f| f.name == KEY_TYPE);
        let others = self.0.iter().filter(|f| f.name != KEY_TYPE);
        for field in typed.chain(others) {
            let Some(val) = obj.get(&field.name) else {
                if field.optional.is_some() {
                    continue;
                }
                return Ok(false);
            };
            if !field.op.check(st, val).at_key(&field.name)? {
                return Ok(false);
            }
            if let Some(flag) = &field.optional {
                st.set_var(flag, Node::from(true)).at_key(&field.name)?;
            }
            st.use_key(&field.name, val.clone());
        }
        Ok(true)
    }
}

// ============================================================================
// SECTION 4: CONSTRUCT
// ============================================================================

fn no_hint(hint: Option<Node>) -> Result<()> {
    match hint {
        None => Ok(()),
        Some(node) => Err(TransformError::new(ErrorKind::UnexpectedNode {
            found: node.to_string(),
        })),
    }
}

fn expect_list(node: Node) -> Result<Vec<Node>> {
    match node {
        Node::List(items) => Ok(items),
        other => Err(TransformError::new(ErrorKind::ExpectedList {
            found: other.type_name().to_string(),
        })),
    }
}

impl Op {
    /// Builds a node of this shape from the bindings in `st`.
    ///
    /// `hint` is the node built so far by a preceding op of a [`Op::Seq`]. Only object ops and
    /// sequences accept one; everything else fails with [`ErrorKind::UnexpectedNode`].
    pub fn construct(&self, st: &mut State, hint: Option<Node>) -> Result<Node> {
        match self {
            Op::Var(name) => {
                no_hint(hint)?;
                st.must_get_var(name)
            }
            Op::Is(node) => {
                no_hint(hint)?;
                Ok(node.clone())
            }
            Op::Any => Ok(hint.unwrap_or_else(Node::null)),
            Op::Obj(fields) => fields.construct(st, hint, None),
            Op::Part { var, fields } => match st.must_get_var(var)? {
                Node::Object(rest) => fields.construct(st, hint, Some(rest)),
                other => Err(TransformError::new(ErrorKind::ExpectedObject {
                    found: other.type_name().to_string(),
                })),
            },
            Op::Arr(items) => {
                no_hint(hint)?;
                let mut out = Vec::with_capacity(items.len());
                for (index, op) in items.iter().enumerate() {
                    let frame = ErrorFrame::Elem {
                        index,
                        op: op.name(),
                    };
                    out.push(op.construct(st, None).within(frame)?);
                }
                Ok(Node::List(out))
            }
            Op::Append(items) => {
                no_hint(hint)?;
                let mut out = Vec::new();
                for (index, op) in items.iter().enumerate() {
                    let frame = ErrorFrame::Operand {
                        index,
                        op: op.name(),
                    };
                    let part = op
                        .construct(st, None)
                        .and_then(expect_list)
                        .within(frame)
                        .within(ErrorFrame::Append)?;
                    out.extend(part);
                }
                Ok(Node::List(out))
            }
            Op::NotEmpty(op) => {
                let node = op.construct(st, hint)?;
                if matches!(&node, Node::List(items) if items.is_empty()) {
                    return Err(TransformError::new(ErrorKind::UnexpectedValue {
                        value: "empty list".to_string(),
                    }));
                }
                Ok(node)
            }
            Op::If {
                cond,
                then,
                otherwise,
            } => {
                if st.has_var(cond) {
                    then.construct(st, hint)
                } else {
                    otherwise.construct(st, hint)
                }
            }
            Op::Opt { flag, op } => {
                if st.has_var(flag) {
                    op.construct(st, hint)
                } else {
                    no_hint(hint)?;
                    Ok(Node::null())
                }
            }
            Op::Each { var, op } => {
                no_hint(hint)?;
                let subs = st
                    .get_state_var(var)
                    .ok_or_else(|| {
                        TransformError::new(ErrorKind::VariableNotDefined { name: var.clone() })
                    })?
                    .to_vec();
                let mut out = Vec::with_capacity(subs.len());
                for (index, mut sub) in subs.into_iter().enumerate() {
                    let frame = ErrorFrame::Elem {
                        index,
                        op: op.name(),
                    };
                    out.push(op.construct(&mut sub, None).within(frame)?);
                }
                Ok(Node::List(out))
            }
            Op::Seq(ops) => {
                let mut cur = hint;
                for (index, op) in ops.iter().enumerate() {
                    let frame = ErrorFrame::Operand {
                        index,
                        op: op.name(),
                    };
                    cur = Some(op.construct(st, cur).within(frame)?);
                }
                Ok(cur.unwrap_or_else(Node::null))
            }
            Op::Lookup { op, table } => {
                no_hint(hint)?;
                let node = op.construct(st, None)?;
                let Node::Value(v) = node else {
                    return Err(TransformError::new(ErrorKind::ExpectedValue {
                        found: node.type_name().to_string(),
                    }));
                };
                match table.iter().find(|(_, norm)| *norm == v) {
                    Some((native, _)) => Ok(Node::Value(native.clone())),
                    None => Err(TransformError::new(ErrorKind::UnhandledValueIn {
                        value: v.to_string(),
                        context: "lookup table".to_string(),
                    })),
                }
            }
        }
    }
}

impl Fields {
    /// Builds an object from the field ops, splicing in `rest` (keys kept by a [`Op::Part`])
    /// and merging the result into an object `hint`.
    pub fn construct(&self, st: &mut State, hint: Option<Node>, rest: Option<Object>) -> Result<Node> {
        let mut out = match hint {
            None => Object::new(),
            Some(Node::Object(obj)) => obj,
            Some(other) => {
                return Err(TransformError::new(ErrorKind::ExpectedObject {
                    found: other.type_name().to_string(),
                }))
            }
        };

        st.start_object("")?;
        let built = self.construct_fields(st);
        let mut fields = st.finish_object("")?;
        built?;

        for (key, val) in rest.into_iter().flatten() {
            if fields.contains_key(&key) {
                return Err(TransformError::new(ErrorKind::DuplicateField { key }));
            }
            fields.insert(key, val);
        }

        for (key, val) in fields {
            match out.get(&key) {
                Some(existing) if *existing != val => {
                    return Err(TransformError::new(ErrorKind::AmbiguousValue {
                        key,
                        value: val.to_string(),
                    }));
                }
                _ => {
                    out.insert(key, val);
                }
            }
        }
        Ok(Node::Object(out))
    }

    fn construct_fields(&self, st: &mut State) -> Result<()> {
        for field in &self.0 {
            if let Some(flag) = &field.optional {
                if !st.has_var(flag) {
                    continue;
                }
            }
            let val = field.op.construct(st, None).at_key(&field.name)?;
            if st.use_key(&field.name, val).is_some() {
                return Err(TransformError::new(ErrorKind::DuplicateField {
                    key: field.name.clone(),
                }));
            }
        }
        Ok(())
    }
}
