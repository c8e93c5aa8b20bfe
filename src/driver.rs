//! A configured normalizer for one language.

use std::path::Path;

use tracing::{debug, info};

use crate::catalog::DriverConfig;
use crate::errors::Result;
use crate::node::Node;
use crate::transform::{run_pipeline, transformers, CodeTransformer, ObjectToNode, RolesDedup, Transformer};

/// The native pipeline of a language plus its source-aware post passes.
pub struct Driver {
    name: String,
    native: Vec<Box<dyn Transformer>>,
    code: Vec<Box<dyn CodeTransformer>>,
}

impl Driver {
    pub fn new(name: impl Into<String>, native: Vec<Box<dyn Transformer>>) -> Self {
        Self {
            name: name.into(),
            native,
            code: Vec::new(),
        }
    }

    /// A driver without rules: native keys are converted with default settings and roles are
    /// deduplicated.
    pub fn passthrough() -> Self {
        let head: Box<dyn Transformer> = Box::new(ObjectToNode::default());
        let tail: Box<dyn Transformer> = Box::new(RolesDedup);
        Self::new("passthrough", transformers(vec![vec![head], vec![tail]]))
    }

    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        let stages = config.stages()?;
        info!(driver = %config.name, stages = stages.len(), "driver configured");
        Ok(Self::new(config.name.clone(), stages))
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_config(&DriverConfig::load(path)?)
    }

    pub fn with_code(mut self, code: Box<dyn CodeTransformer>) -> Self {
        self.code.push(code);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Box<dyn Transformer>] {
        &self.native
    }

    /// Runs the native pipeline.
    pub fn transform(&self, node: &Node) -> Result<Node> {
        debug!(driver = %self.name, "transforming");
        run_pipeline(&self.native, node)
    }

    /// Runs the native pipeline, then the source-aware stages built for `code`.
    pub fn transform_with_code(&self, node: &Node, code: &str) -> Result<Node> {
        let out = self.transform(node)?;
        let stages: Vec<Box<dyn Transformer>> = self.code.iter().map(|c| c.on_code(code)).collect();
        run_pipeline(&stages, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformFunc;

    struct SourceLength;

    impl CodeTransformer for SourceLength {
        fn on_code(&self, code: &str) -> Box<dyn Transformer> {
            let len = code.len() as i64;
            Box::new(TransformFunc::new("source-length", move |n: &Node| {
                Ok(Node::list([n.clone(), Node::from(len)]))
            }))
        }
    }

    #[test]
    fn code_stages_run_after_native_ones() {
        let driver = Driver::passthrough().with_code(Box::new(SourceLength));
        let out = driver.transform_with_code(&Node::from(1), "abc").unwrap();
        assert_eq!(out, Node::list([Node::from(1), Node::from(3)]));
    }

    #[test]
    fn passthrough_escapes_reserved_keys() {
        let input = Node::object([("@x", Node::from(1))]);
        let out = Driver::passthrough().transform(&input).unwrap();
        assert_eq!(out, Node::object([("@@x", Node::from(1))]));
    }
}
