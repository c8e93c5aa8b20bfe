//! # Declarative Rule Catalogs
//!
//! A driver configuration file describes the head stage settings and an ordered rule list in
//! YAML or JSON. Rules are written in a small op language mirroring [`Op`]:
//!
//! ```yaml
//! name: python
//! native:
//!   internal_type_key: ast_type
//!   token_keys: [id]
//! rules:
//!   - annotate:
//!       type: Name
//!       roles: [Identifier, Expression]
//!   - mapping:
//!       name: pass-to-noop
//!       steps:
//!         - name: native
//!           op: { typed_obj: { type: Pass } }
//!         - name: norm
//!           op: { typed_obj: { type: NoOp } }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{ErrorFrame, Result, ResultExt};
use crate::node::{Node, Value};
use crate::role::Role;
use crate::transform::ast::{self, annotate_with};
use crate::transform::{
    transformers, Fields, Mapping, Mappings, ObjectToNode, Op, RolesDedup, Step, Transformer,
};

// ============================================================================
// CONFIGURATION DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub name: String,
    #[serde(default)]
    pub native: ObjectToNode,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// Run the rules as a single first-match catalog instead of one stage per rule.
    #[serde(default)]
    pub first_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
    Annotate(AnnotateSpec),
    Mapping(MappingSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnotateSpec {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub native: FieldsSpec,
    #[serde(default)]
    pub norm: FieldsSpec,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// List op whose output is appended after the static roles.
    #[serde(default)]
    pub extra_roles: Option<OpSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSpec {
    pub name: String,
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub name: String,
    pub op: OpSpec,
}

pub type FieldsSpec = BTreeMap<String, FieldSpec>;

/// A field is either a bare op or an op guarded by an optional flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Optional { optional: String, op: OpSpec },
    Required(OpSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpSpec {
    Var(String),
    Is(Node),
    Any,
    Obj(FieldsSpec),
    TypedObj {
        #[serde(rename = "type")]
        typ: String,
        #[serde(default)]
        fields: FieldsSpec,
    },
    Part {
        var: String,
        #[serde(default)]
        fields: FieldsSpec,
    },
    Arr(Vec<OpSpec>),
    Append(Vec<OpSpec>),
    NotEmpty(Box<OpSpec>),
    If {
        cond: String,
        then: Box<OpSpec>,
        #[serde(rename = "else")]
        otherwise: Box<OpSpec>,
    },
    Opt {
        flag: String,
        op: Box<OpSpec>,
    },
    Each {
        var: String,
        op: Box<OpSpec>,
    },
    Seq(Vec<OpSpec>),
    Lookup {
        op: Box<OpSpec>,
        table: Vec<(Value, Value)>,
    },
    /// Exactly these roles, in order.
    Roles(Vec<Role>),
}

// ============================================================================
// LOADING
// ============================================================================

/// Reads a YAML document, accepting `variant: value` maps for every nested enum.
pub fn from_yaml_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    let de = serde_yaml::Deserializer::from_str(text);
    Ok(serde_yaml::with::singleton_map_recursive::deserialize(de)?)
}

impl DriverConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        from_yaml_str(text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a configuration file. `.json` files are parsed as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }

    /// Builds the rule list into mappings, in order.
    pub fn mappings(&self) -> Result<Vec<Mapping>> {
        self.rules.iter().map(RuleSpec::build).collect()
    }

    /// The full native pipeline: head stage, rules, role deduplication.
    pub fn stages(&self) -> Result<Vec<Box<dyn Transformer>>> {
        let mappings = self.mappings()?;
        let rules: Vec<Box<dyn Transformer>> = if self.first_match {
            vec![Box::new(Mappings::new(self.name.clone(), mappings)?)]
        } else {
            mappings
                .into_iter()
                .map(|m| Box::new(m) as Box<dyn Transformer>)
                .collect()
        };
        let head: Box<dyn Transformer> = Box::new(self.native.clone());
        let tail: Box<dyn Transformer> = Box::new(RolesDedup);
        Ok(transformers(vec![vec![head], rules, vec![tail]]))
    }
}

// ============================================================================
// BUILDING
// ============================================================================

impl RuleSpec {
    pub fn name(&self) -> &str {
        match self {
            RuleSpec::Annotate(a) => &a.typ,
            RuleSpec::Mapping(m) => &m.name,
        }
    }

    pub fn build(&self) -> Result<Mapping> {
        let built = match self {
            RuleSpec::Annotate(a) => {
                let extra = a.extra_roles.as_ref().map(OpSpec::build).transpose()?;
                annotate_with(
                    &a.typ,
                    build_fields(&a.native)?,
                    build_fields(&a.norm)?,
                    extra,
                    &a.roles,
                )
            }
            RuleSpec::Mapping(m) => {
                let steps = m
                    .steps
                    .iter()
                    .map(|s| Ok(Step::new(s.name.clone(), s.op.build()?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Mapping::new(m.name.clone(), steps))
            }
        };
        built.within(ErrorFrame::Mapping(self.name().to_string()))
    }
}

fn build_fields(spec: &FieldsSpec) -> Result<Fields> {
    let mut fields = Fields::new();
    for (name, field) in spec {
        fields = match field {
            FieldSpec::Required(op) => fields.field(name.clone(), op.build().at_key(name)?),
            FieldSpec::Optional { optional, op } => {
                fields.optional(name.clone(), optional.clone(), op.build().at_key(name)?)
            }
        };
    }
    Ok(fields)
}

fn build_all(specs: &[OpSpec]) -> Result<Vec<Op>> {
    specs.iter().map(OpSpec::build).collect()
}

impl OpSpec {
    pub fn build(&self) -> Result<Op> {
        Ok(match self {
            OpSpec::Var(name) => Op::var(name.clone()),
            OpSpec::Is(node) => Op::Is(node.clone()),
            OpSpec::Any => Op::Any,
            OpSpec::Obj(fields) => Op::obj(build_fields(fields)?),
            OpSpec::TypedObj { typ, fields } => Op::typed_obj(typ, build_fields(fields)?),
            OpSpec::Part { var, fields } => Op::part(var.clone(), build_fields(fields)?),
            OpSpec::Arr(items) => Op::arr(build_all(items)?),
            OpSpec::Append(items) => Op::append(build_all(items)?),
            OpSpec::NotEmpty(op) => Op::not_empty(op.build()?),
            OpSpec::If {
                cond,
                then,
                otherwise,
            } => Op::if_(cond.clone(), then.build()?, otherwise.build()?),
            OpSpec::Opt { flag, op } => Op::opt(flag.clone(), op.build()?),
            OpSpec::Each { var, op } => Op::each(var.clone(), op.build()?),
            OpSpec::Seq(ops) => Op::seq(build_all(ops)?),
            OpSpec::Lookup { op, table } => Op::lookup(op.build()?, table.clone()),
            OpSpec::Roles(roles) => ast::roles(roles),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn yaml_ops_build_the_matching_algebra() {
        let spec: OpSpec = from_yaml_str(
            r#"
typed_obj:
  type: Foo
  fields:
    Name: { var: name }
    Ctx:
      optional: has_ctx
      op: any
"#,
        )
        .unwrap();
        let op = spec.build().unwrap();
        let expected = Op::typed_obj(
            "Foo",
            Fields::new()
                .optional("Ctx", "has_ctx", Op::Any)
                .field("Name", Op::var("name")),
        );
        assert_eq!(op, expected);
    }

    #[test]
    fn lookup_tables_are_pairs() {
        let spec: OpSpec =
            serde_json::from_str(r#"{"lookup": {"op": {"var": "op"}, "table": [["+", "Add"]]}}"#)
                .unwrap();
        let Op::Lookup { table, .. } = spec.build().unwrap() else {
            panic!("expected a lookup op");
        };
        assert_eq!(table, vec![(Value::String("+".into()), Value::String("Add".into()))]);
    }

    #[test]
    fn annotate_rule_rejects_explicit_roles_field() {
        let rule: RuleSpec = from_yaml_str(
            r#"
annotate:
  type: Foo
  native:
    "@role": any
"#,
        )
        .unwrap();
        let err = rule.build().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateField { .. }));
        assert_eq!(err.frames().next(), Some(&ErrorFrame::Mapping("Foo".to_string())));
    }

    #[test]
    fn pipeline_has_head_rules_and_dedup() {
        let cfg = DriverConfig::from_yaml(
            r#"
name: demo
rules:
  - annotate: { type: A, roles: [X] }
  - annotate: { type: B, roles: [Y] }
"#,
        )
        .unwrap();
        let names: Vec<String> = cfg
            .stages()
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["object-to-node", "A", "B", "roles-dedup"]);

        let cfg = DriverConfig {
            first_match: true,
            ..cfg
        };
        assert_eq!(cfg.stages().unwrap().len(), 3);
    }

    #[test]
    fn yaml_rules_use_single_key_variants() {
        let cfg = DriverConfig::from_yaml(
            r#"
name: python
native:
  internal_type_key: ast_type
  token_keys: [id]
rules:
  - annotate:
      type: Name
      native:
        ctx: { var: ctx }
      norm:
        ctx: { var: ctx }
      roles: [Identifier, Expression]
  - mapping:
      name: pass-to-noop
      steps:
        - name: native
          op: { typed_obj: { type: Pass } }
        - name: norm
          op: { typed_obj: { type: NoOp } }
"#,
        )
        .unwrap();
        let mappings = cfg.mappings().unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[1].steps[1].op, Op::typed_obj("NoOp", Fields::new()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(DriverConfig::from_yaml("name: x\nrulez: []\n").is_err());
    }
}
