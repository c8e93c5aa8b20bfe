//! Role-annotation helpers.
//!
//! Shapes for the common case of a rule catalog: match a native object by type, keep whatever
//! fields the rule does not mention, and attach roles on the way out. Roles already present on
//! the node are kept in front of the added ones.

use crate::errors::{ErrorKind, Result, TransformError};
use crate::node::{KEY_POS_COL, KEY_POS_LINE, KEY_POS_OFFSET, KEY_ROLES, KEY_TYPE, TYPE_POSITION};
use crate::role::Role;
use crate::transform::mapping::{Mapping, Step};
use crate::transform::ops::{Field, Fields, Op};

/// Variable holding the fields a typed annotation does not mention.
const REST_VAR: &str = "_";

/// A list op matching or producing exactly `roles`, in order.
pub fn roles(roles: &[Role]) -> Op {
    Op::arr(roles.iter().map(|r| Op::is(r)).collect())
}

/// Appends static roles to the output of a list op.
pub fn append_roles(op: Op, extra: &[Role]) -> Op {
    if extra.is_empty() {
        return op;
    }
    Op::append(vec![op, roles(extra)])
}

/// The role field: appends `extra` to the existing roles, or just keeps them when there is
/// nothing to add.
pub fn roles_field(var: &str, extra: &[Role]) -> Field {
    roles_field_op(var, None, extra)
}

/// Like [`roles_field`] with an additional list op producing roles.
pub fn roles_field_op(var: &str, op: Option<Op>, extra: &[Role]) -> Field {
    let flag = format!("{}_exists", var);
    let rop = match op {
        None if extra.is_empty() => return Field::optional(KEY_ROLES, flag, Op::var(var)),
        None => roles(extra),
        Some(op) if extra.is_empty() => op,
        Some(op) => Op::append(vec![roles(extra), op]),
    };
    Field::new(
        KEY_ROLES,
        Op::if_(
            flag,
            Op::append(vec![Op::not_empty(Op::var(var)), rop.clone()]),
            rop,
        ),
    )
}

fn roles_var(typ: &str) -> String {
    format!("{}_roles", typ)
}

fn typed_part(typ: &str, mut fields: Fields, roles: Field) -> Result<Op> {
    if fields.has_field(KEY_ROLES) {
        return Err(TransformError::new(ErrorKind::DuplicateField {
            key: KEY_ROLES.to_string(),
        }));
    }
    fields.set_field(Field::new(KEY_TYPE, Op::is(typ)));
    fields.set_field(roles);
    Ok(Op::part(REST_VAR, fields))
}

/// Native shape of an object of type `typ`, saving its current roles.
pub fn ast_object_left(typ: &str, fields: Fields) -> Result<Op> {
    typed_part(typ, fields, roles_field(&roles_var(typ), &[]))
}

/// Annotated shape of an object of type `typ`.
///
/// The produced role list is the roles saved by [`ast_object_left`], then `extra`, then the
/// output of `op`.
pub fn ast_object_right(typ: &str, fields: Fields, op: Option<Op>, extra: &[Role]) -> Result<Op> {
    typed_part(typ, fields, roles_field_op(&roles_var(typ), op, extra))
}

/// Two-step mapping from a native shape to its normalized form.
pub fn ast_map(name: impl Into<String>, native: Op, norm: Op) -> Mapping {
    Mapping::new(
        name,
        vec![Step::new("native", native), Step::new("norm", norm)],
    )
}

/// Annotation rule for objects of type `typ`, named after the type.
pub fn annotate(typ: &str, native: Fields, norm: Fields, extra: &[Role]) -> Result<Mapping> {
    annotate_with(typ, native, norm, None, extra)
}

/// Like [`annotate`] with an additional op producing roles.
pub fn annotate_with(
    typ: &str,
    native: Fields,
    norm: Fields,
    op: Option<Op>,
    extra: &[Role],
) -> Result<Mapping> {
    Ok(ast_map(
        typ,
        ast_object_left(typ, native)?,
        ast_object_right(typ, norm, op, extra)?,
    ))
}

/// Adds roles to an untyped nested object. Meant for fields of an enclosing shape.
pub fn object_roles(var: &str, extra: &[Role]) -> Op {
    Op::part(
        var,
        Fields::new().field_with(roles_field(&format!("{}_roles", var), extra)),
    )
}

/// Like [`object_roles`] for a field that may be null.
pub fn opt_object_roles(var: &str, extra: &[Role]) -> Op {
    Op::opt(format!("{}_set", var), object_roles(var, extra))
}

fn save_pos(key: &str, var: &str) -> Op {
    Op::typed_obj(TYPE_POSITION, Fields::new().field(key, Op::var(var)))
}

/// A position record whose offset is bound to `var`.
pub fn save_pos_offset(var: &str) -> Op {
    save_pos(KEY_POS_OFFSET, var)
}

pub fn save_pos_line(var: &str) -> Op {
    save_pos(KEY_POS_LINE, var)
}

pub fn save_pos_col(var: &str) -> Op {
    save_pos(KEY_POS_COL, var)
}
