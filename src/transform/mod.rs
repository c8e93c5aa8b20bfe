//! # Transformation Pipeline
//!
//! Everything that turns one tree into another implements [`Transformer`]. A pipeline is an
//! ordered list of transformers; each stage receives the previous stage's output and the first
//! error aborts the run.
//!
//! The building blocks live in submodules:
//!
//! - [`ops`]: the bidirectional shape algebra;
//! - [`state`]: the binding environment of a single match;
//! - [`mapping`]: matcher/constructor rules and first-match catalogs;
//! - [`ast`]: role-annotation helpers;
//! - [`normalize`]: the generic head stage and role deduplication.

use std::fmt;

use tracing::debug;

use crate::errors::{ErrorFrame, Result, ResultExt};
use crate::node::Node;

pub mod ast;
pub mod mapping;
pub mod normalize;
pub mod ops;
pub mod state;

pub use mapping::{Mapping, Mappings, Step};
pub use normalize::{ObjectToNode, RolesDedup};
pub use ops::{Field, Fields, Op, OpKind};
pub use state::State;

/// A single pipeline stage.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, node: &Node) -> Result<Node>;
}

impl fmt::Debug for dyn Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transformer({})", self.name())
    }
}

/// Produces a source-aware stage for one input file, e.g. to resolve line and column numbers
/// from byte offsets.
pub trait CodeTransformer: Send + Sync {
    fn on_code(&self, code: &str) -> Box<dyn Transformer>;
}

/// A named closure stage.
pub struct TransformFunc<F> {
    name: String,
    func: F,
}

impl<F> TransformFunc<F>
where
    F: Fn(&Node) -> Result<Node> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Transformer for TransformFunc<F>
where
    F: Fn(&Node) -> Result<Node> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, node: &Node) -> Result<Node> {
        (self.func)(node)
    }
}

/// Concatenates stage lists, keeping their order.
pub fn transformers(lists: Vec<Vec<Box<dyn Transformer>>>) -> Vec<Box<dyn Transformer>> {
    lists.into_iter().flatten().collect()
}

/// Runs `stages` in order over `node`.
pub fn run_pipeline(stages: &[Box<dyn Transformer>], node: &Node) -> Result<Node> {
    let mut cur = node.clone();
    for (index, stage) in stages.iter().enumerate() {
        debug!(index, stage = stage.name(), "running stage");
        cur = stage.transform(&cur).within(ErrorFrame::Stage {
            index,
            name: stage.name().to_string(),
        })?;
    }
    Ok(cur)
}
