//! Bottom-up tree rewriting.
//!
//! Children are rewritten before their parent, so a rewrite callback always sees a node whose
//! subtree already went through the same callback. The input tree is borrowed and never
//! modified; rewritten nodes are rebuilt while untouched siblings are shared.

use std::convert::Infallible;

use super::Node;

/// Rewrites every node of `node` with `rewrite`, returning the new tree and whether any node
/// changed. `rewrite` returns `(new_node, changed)`; with `changed == false` the node is kept.
pub fn apply<F>(node: &Node, rewrite: &mut F) -> (Node, bool)
where
    F: FnMut(&Node) -> (Node, bool),
{
    let result = try_apply(node, &mut |n: &Node| -> Result<Option<Node>, Infallible> {
        let (nn, changed) = rewrite(n);
        Ok(changed.then_some(nn))
    });
    match result {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`apply`]. `rewrite` returns `Some(new_node)` to replace a node and
/// `None` to keep it. The first error aborts the walk and nothing of the partial result leaks.
pub fn try_apply<E, F>(node: &Node, rewrite: &mut F) -> Result<(Node, bool), E>
where
    F: FnMut(&Node) -> Result<Option<Node>, E>,
{
    let (rebuilt, children_changed) = match node {
        Node::Object(obj) => {
            let mut out = obj.clone();
            let mut changed = false;
            for (key, child) in obj.iter() {
                let (nc, c) = try_apply(child, rewrite)?;
                if c {
                    out.insert(key.clone(), nc);
                    changed = true;
                }
            }
            (Node::Object(out), changed)
        }
        Node::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            let mut changed = false;
            for child in items {
                let (nc, c) = try_apply(child, rewrite)?;
                changed |= c;
                out.push(nc);
            }
            (Node::List(out), changed)
        }
        Node::Value(_) => (node.clone(), false),
    };

    match rewrite(&rebuilt)? {
        Some(nn) => Ok((nn, true)),
        None => Ok((rebuilt, children_changed)),
    }
}
