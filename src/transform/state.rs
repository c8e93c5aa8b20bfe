//! Binding environment threaded through one check/construct attempt.
//!
//! A fresh [`State`] is created for every node a mapping tries to match. Sub-matches that may
//! fail without failing the whole rule work on a clone and are merged back with
//! [`State::apply_from`]. Bindings live in persistent `im` maps so cloning is cheap.

use im::HashMap;

use crate::errors::{ErrorKind, Result, TransformError};
use crate::node::{Node, Object};

/// An object being checked or built, with the keys consumed so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectFrame {
    name: String,
    fields: Object,
}

impl ObjectFrame {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &Object {
        &self.fields
    }
}

#[derive(Debug, Clone, Default)]
pub struct State {
    vars: HashMap<String, Node>,
    states: HashMap<String, Vec<State>>,
    objs: Vec<ObjectFrame>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------------

    /// Looks up a variable. A name bound by [`State::start_object`] resolves to the fields
    /// assembled so far while its frame is open.
    pub fn get_var(&self, name: &str) -> Option<Node> {
        if let Some(node) = self.vars.get(name) {
            return Some(node.clone());
        }
        if name.is_empty() {
            return None;
        }
        self.objs
            .iter()
            .rev()
            .find(|frame| frame.name == name)
            .map(|frame| Node::Object(frame.fields.clone()))
    }

    pub fn must_get_var(&self, name: &str) -> Result<Node> {
        self.get_var(name).ok_or_else(|| {
            TransformError::new(ErrorKind::VariableNotDefined {
                name: name.to_string(),
            })
        })
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.get_var(name).is_some()
    }

    /// Binds `name` to `val`.
    ///
    /// Rebinding succeeds only when both the current and the new value are equal primitive
    /// values. Rebinding an object or a list is always a conflict.
    pub fn set_var(&mut self, name: &str, val: Node) -> Result<()> {
        let Some(cur) = self.get_var(name) else {
            self.vars.insert(name.to_string(), val);
            return Ok(());
        };
        match (&cur, &val) {
            (Node::Value(a), Node::Value(b)) if a == b => Ok(()),
            _ => Err(TransformError::new(ErrorKind::VariableRedeclared {
                name: name.to_string(),
                previous: cur.to_string(),
                current: val.to_string(),
            })),
        }
    }

    // ------------------------------------------------------------------------
    // State variables
    // ------------------------------------------------------------------------

    pub fn get_state_var(&self, name: &str) -> Option<&[State]> {
        self.states.get(name).map(Vec::as_slice)
    }

    /// Binds a list of nested scopes. State variables can never be rebound.
    pub fn set_state_var(&mut self, name: &str, sub: Vec<State>) -> Result<()> {
        if let Some(cur) = self.states.get(name) {
            return Err(TransformError::new(ErrorKind::VariableRedeclared {
                name: name.to_string(),
                previous: format!("{} states", cur.len()),
                current: format!("{} states", sub.len()),
            }));
        }
        self.states.insert(name.to_string(), sub);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Construction stack
    // ------------------------------------------------------------------------

    /// Opens an object frame. A non-empty `name` is bound right away to the in-progress
    /// fields, so it conflicts with an existing binding of the same name.
    pub fn start_object(&mut self, name: &str) -> Result<()> {
        if !name.is_empty() {
            if let Some(cur) = self.get_var(name) {
                return Err(TransformError::new(ErrorKind::VariableRedeclared {
                    name: name.to_string(),
                    previous: cur.to_string(),
                    current: "{}".to_string(),
                }));
            }
        }
        self.objs.push(ObjectFrame {
            name: name.to_string(),
            fields: Object::new(),
        });
        Ok(())
    }

    /// Closes the innermost frame, which must be the one opened under `name`.
    pub fn finish_object(&mut self, name: &str) -> Result<Object> {
        let frame = self
            .objs
            .pop()
            .ok_or_else(|| TransformError::internal("no active objects on the stack"))?;
        if frame.name != name {
            return Err(TransformError::internal(format!(
                "stack is broken: expected object {:?}, got {:?}",
                name, frame.name
            )));
        }
        if !name.is_empty() {
            self.vars
                .insert(name.to_string(), Node::Object(frame.fields.clone()));
        }
        Ok(frame.fields)
    }

    /// Records `key` as consumed by the innermost frame, returning the value previously
    /// recorded for it. Without an open frame the call is a no-op.
    pub fn use_key(&mut self, key: &str, val: Node) -> Option<Node> {
        let frame = self.objs.last_mut()?;
        frame.fields.insert(key.to_string(), val)
    }

    /// The innermost open frame.
    pub fn current_object(&self) -> Option<&ObjectFrame> {
        self.objs.last()
    }

    pub fn depth(&self) -> usize {
        self.objs.len()
    }

    // ------------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------------

    /// Merges a successful sub-scope back. Only entries missing here are copied: existing
    /// bindings are never overwritten.
    pub fn apply_from(&mut self, child: &State) {
        for (name, node) in child.vars.iter() {
            if !self.vars.contains_key(name) {
                self.vars.insert(name.clone(), node.clone());
            }
        }
        for (name, sub) in child.states.iter() {
            if !self.states.contains_key(name) {
                self.states.insert(name.clone(), sub.clone());
            }
        }
        for (mine, theirs) in self.objs.iter_mut().zip(child.objs.iter()) {
            if mine.name != theirs.name {
                break;
            }
            for (key, val) in theirs.fields.iter() {
                if !mine.fields.contains_key(key) {
                    mine.fields.insert(key.clone(), val.clone());
                }
            }
        }
        if child.objs.len() > self.objs.len() {
            let extra = child.objs[self.objs.len()..].iter().cloned();
            self.objs.extend(extra);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_primitives_can_be_rebound() {
        let mut st = State::new();
        st.set_var("x", Node::from("a")).unwrap();
        st.set_var("x", Node::from("a")).unwrap();
        assert_eq!(st.get_var("x"), Some(Node::from("a")));
    }

    #[test]
    fn different_primitives_conflict() {
        let mut st = State::new();
        st.set_var("x", Node::from(1)).unwrap();
        let err = st.set_var("x", Node::from(2)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::VariableRedeclared { name, .. } if name == "x"));
    }

    #[test]
    fn non_primitives_always_conflict() {
        let mut st = State::new();
        let list = Node::list([Node::from(1)]);
        st.set_var("l", list.clone()).unwrap();
        assert!(st.set_var("l", list).is_err());

        let obj = Node::object([("a", Node::from(1))]);
        st.set_var("o", obj.clone()).unwrap();
        assert!(st.set_var("o", obj).is_err());
    }

    #[test]
    fn missing_variable_is_reported() {
        let st = State::new();
        let err = st.must_get_var("nope").unwrap_err();
        assert_eq!(err.to_string(), r#"variable "nope" is not defined"#);
    }

    #[test]
    fn named_frame_is_visible_while_open() {
        let mut st = State::new();
        st.start_object("obj").unwrap();
        st.use_key("a", Node::from(1));
        assert_eq!(st.get_var("obj"), Some(Node::object([("a", Node::from(1))])));
        st.use_key("b", Node::from(2));
        let fields = st.finish_object("obj").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(st.get_var("obj"), Some(Node::Object(fields)));
        assert_eq!(st.depth(), 0);
    }

    #[test]
    fn popping_the_wrong_frame_is_internal() {
        let mut st = State::new();
        st.start_object("a").unwrap();
        let err = st.finish_object("b").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Internal { .. }));

        let err = State::new().finish_object("").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Internal { .. }));
    }

    #[test]
    fn use_key_without_frame_is_ignored() {
        let mut st = State::new();
        assert_eq!(st.use_key("a", Node::from(1)), None);
        st.start_object("").unwrap();
        assert_eq!(st.use_key("a", Node::from(1)), None);
        assert_eq!(st.use_key("a", Node::from(2)), Some(Node::from(1)));
    }

    #[test]
    fn clone_isolates_and_merge_keeps_first_writer() {
        let mut parent = State::new();
        parent.set_var("kept", Node::from("parent")).unwrap();

        let mut child = parent.clone();
        child.vars.insert("kept".to_string(), Node::from("child"));
        child.set_var("new", Node::from(1)).unwrap();
        child
            .set_state_var("subs", vec![State::new(), State::new()])
            .unwrap();
        assert!(!parent.has_var("new"));

        parent.apply_from(&child);
        assert_eq!(parent.get_var("kept"), Some(Node::from("parent")));
        assert_eq!(parent.get_var("new"), Some(Node::from(1)));
        assert_eq!(parent.get_state_var("subs").map(|s| s.len()), Some(2));
    }

    #[test]
    fn merge_carries_consumed_keys_of_shared_frames() {
        let mut parent = State::new();
        parent.start_object("").unwrap();
        let mut child = parent.clone();
        child.use_key("a", Node::from(1));
        parent.apply_from(&child);
        let frame = parent.current_object().unwrap();
        assert!(frame.fields().contains_key("a"));
    }

    #[test]
    fn state_vars_cannot_be_rebound() {
        let mut st = State::new();
        st.set_state_var("s", vec![]).unwrap();
        assert!(st.set_state_var("s", vec![]).is_err());
    }
}
