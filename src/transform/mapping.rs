//! Reversible rewrite rules.
//!
//! A [`Mapping`] is an ordered list of steps. Adjacent steps form a window: the first op of the
//! window matches nodes, the second one rebuilds them from the captured bindings. Windows run one
//! after another over the whole tree, each one consuming the previous window's output.

use tracing::{debug, trace};

use crate::errors::{ErrorFrame, ErrorKind, Result, ResultExt, TransformError};
use crate::node::{try_apply, Node};
use crate::transform::ops::Op;
use crate::transform::state::State;
use crate::transform::Transformer;

/// One named op of a mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub op: Op,
}

impl Step {
    pub fn new(name: impl Into<String>, op: Op) -> Self {
        Self {
            name: name.into(),
            op,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Mapping {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Two-step mapping from `src` to `dst`.
    pub fn map(name: impl Into<String>, src: Op, dst: Op) -> Self {
        Self::new(name, vec![Step::new("src", src), Step::new("dst", dst)])
    }

    /// The same rule in the opposite direction.
    pub fn reverse(&self) -> Mapping {
        let mut steps = self.steps.clone();
        steps.reverse();
        Mapping::new(self.name.clone(), steps)
    }

    /// Runs every window of the mapping over `root`.
    pub fn run(&self, root: &Node) -> Result<Node> {
        if self.steps.len() < 2 {
            return Err(TransformError::new(ErrorKind::FewSteps {
                steps: self.steps.len(),
            })
            .within(ErrorFrame::Mapping(self.name.clone())));
        }

        let mut cur = root.clone();
        for window in self.steps.windows(2) {
            let (src, dst) = (&window[0], &window[1]);
            let (out, changed) = try_apply(&cur, &mut |node: &Node| {
                apply_map(&src.op, &dst.op, node)
            })
            .within(ErrorFrame::Mapping(self.name.clone()))?;
            debug!(mapping = %self.name, from = %src.name, to = %dst.name, changed, "window applied");
            cur = out;
        }
        Ok(cur)
    }
}

impl Transformer for Mapping {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, node: &Node) -> Result<Node> {
        self.run(node)
    }
}

/// Tries one matcher/constructor pair on a single node with a fresh scope.
///
/// Returns `None` when the node is skipped by the kind guard or does not match.
pub(crate) fn apply_map(src: &Op, dst: &Op, node: &Node) -> Result<Option<Node>> {
    if !src.kind().admits(node) {
        return Ok(None);
    }
    let mut st = State::new();
    if !src.check(&mut st, node).within(ErrorFrame::Check)? {
        return Ok(None);
    }
    let out = dst.construct(&mut st, None).within(ErrorFrame::Construct)?;
    trace!(node = node.ast_type().unwrap_or(node.type_name()), "rewritten");
    Ok(Some(out))
}

// ============================================================================
// FIRST-MATCH CATALOG
// ============================================================================

/// A single stage holding several two-step mappings. At every node the mappings are tried in
/// order and the first one whose matcher accepts the node rewrites it.
#[derive(Debug, Clone)]
pub struct Mappings {
    name: String,
    mappings: Vec<Mapping>,
}

impl Mappings {
    pub fn new(name: impl Into<String>, mappings: Vec<Mapping>) -> Result<Self> {
        let name = name.into();
        for m in &mappings {
            match m.steps.len() {
                0 | 1 => {
                    return Err(TransformError::new(ErrorKind::FewSteps {
                        steps: m.steps.len(),
                    })
                    .within(ErrorFrame::Mapping(m.name.clone())))
                }
                2 => {}
                n => {
                    return Err(TransformError::config(format!(
                        "mapping {:?} has {} steps; a first-match catalog needs exactly 2",
                        m.name, n
                    )))
                }
            }
        }
        Ok(Self { name, mappings })
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn run(&self, root: &Node) -> Result<Node> {
        let (out, changed) = try_apply::<TransformError, _>(root, &mut |node: &Node| {
            for m in &self.mappings {
                let hit = apply_map(&m.steps[0].op, &m.steps[1].op, node)
                    .within(ErrorFrame::Mapping(m.name.clone()))?;
                if hit.is_some() {
                    return Ok(hit);
                }
            }
            Ok(None)
        })?;
        debug!(catalog = %self.name, rules = self.mappings.len(), changed, "catalog applied");
        Ok(out)
    }
}

impl Transformer for Mappings {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, node: &Node) -> Result<Node> {
        self.run(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::KEY_TYPE;
    use crate::transform::ops::Fields;

    fn rename(from: &str, to: &str) -> Mapping {
        Mapping::map(
            format!("{}->{}", from, to),
            Op::typed_obj(from, Fields::new().field("Name", Op::var("name"))),
            Op::typed_obj(to, Fields::new().field("Name", Op::var("name"))),
        )
    }

    fn typed(typ: &str) -> Node {
        Node::object([(KEY_TYPE, Node::from(typ)), ("Name", Node::from("x"))])
    }

    #[test]
    fn single_step_mapping_fails() {
        let m = Mapping::new("lonely", vec![Step::new("only", Op::Any)]);
        let err = m.run(&Node::from(1)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FewSteps { steps: 1 }));
    }

    #[test]
    fn two_steps_rewrite_matching_nodes() {
        let out = rename("Foo", "Bar").run(&Node::list([typed("Foo"), typed("Baz")])).unwrap();
        assert_eq!(out, Node::list([typed("Bar"), typed("Baz")]));
    }

    #[test]
    fn windows_chain_their_outputs() {
        crate::test_utils::init_test_logging();
        let name = Fields::new().field("Name", Op::var("name"));
        let m = Mapping::new(
            "chain",
            vec![
                Step::new("a", Op::typed_obj("A", name.clone())),
                Step::new("b", Op::typed_obj("B", name.clone())),
                Step::new("c", Op::typed_obj("C", name)),
            ],
        );
        assert_eq!(m.run(&typed("A")).unwrap(), typed("C"));
        assert_eq!(m.reverse().run(&typed("C")).unwrap(), typed("A"));
    }

    #[test]
    fn kind_guard_skips_values() {
        // a list matcher never sees scalar leaves
        let m = Mapping::map("wrap", Op::arr(vec![Op::var("x")]), Op::var("x"));
        let input = Node::object([("a", Node::list([Node::from(1)])), ("b", Node::from(2))]);
        let out = m.run(&input).unwrap();
        assert_eq!(out, Node::object([("a", Node::from(1)), ("b", Node::from(2))]));
    }

    #[test]
    fn errors_name_the_mapping_and_phase() {
        let m = Mapping::map("broken", Op::typed_obj("Foo", Fields::new().field("Name", Op::Any)), Op::var("missing"));
        let err = m.run(&typed("Foo")).unwrap_err();
        let frames: Vec<_> = err.frames().cloned().collect();
        assert_eq!(
            frames,
            vec![ErrorFrame::Mapping("broken".to_string()), ErrorFrame::Construct]
        );
    }

    #[test]
    fn catalog_takes_the_first_match() {
        let catalog = Mappings::new("catalog", vec![rename("Foo", "Bar"), rename("Foo", "Qux")]).unwrap();
        assert_eq!(catalog.run(&typed("Foo")).unwrap(), typed("Bar"));
    }

    #[test]
    fn catalog_rejects_long_mappings() {
        let m = Mapping::new(
            "long",
            vec![
                Step::new("a", Op::Any),
                Step::new("b", Op::Any),
                Step::new("c", Op::Any),
            ],
        );
        assert!(Mappings::new("catalog", vec![m]).is_err());
    }
}
