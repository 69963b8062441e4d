//! Literal type resolution.
//!
//! A typed expression contributes exactly its own tag. A raw literal
//! contributes every admissible tag whose runtime predicate accepts it. Two
//! candidate sets are then unified side by side, and the chosen tags are
//! checked for group compatibility by the operator that asked.

use crate::error::{ForgeError, ForgeResult};
use crate::expr::Expr;
use crate::types::tag::{SqlType, TypeGroup};
use crate::types::value::Value;

/// An operator argument: either an already-typed expression or a raw literal.
#[derive(Debug, Clone)]
pub enum Operand {
    Expr(Expr),
    Literal(Value),
}

impl From<Expr> for Operand {
    fn from(e: Expr) -> Self {
        Operand::Expr(e)
    }
}

impl From<&Expr> for Operand {
    fn from(e: &Expr) -> Self {
        Operand::Expr(e.clone())
    }
}

impl<T: Into<Value>> From<T> for Operand {
    fn from(v: T) -> Self {
        Operand::Literal(v.into())
    }
}

/// Every tag in `allowed` consistent with `operand`.
pub fn possible_types(allowed: &[SqlType], operand: &Operand) -> Vec<SqlType> {
    match operand {
        Operand::Expr(e) => vec![e.ty()],
        Operand::Literal(v) => allowed.iter().copied().filter(|ty| ty.accepts(v)).collect(),
    }
}

/// Pick the tag for side `a` given the other side's candidates `b`.
pub fn unify(a: &[SqlType], b: &[SqlType]) -> ForgeResult<SqlType> {
    if let [only] = a {
        return Ok(*only);
    }
    if let [only] = b
        && a.contains(only)
    {
        return Ok(*only);
    }
    Err(ForgeError::ambiguous(format!(
        "cannot choose between {} given {}",
        describe(a),
        describe(b)
    )))
}

fn describe(candidates: &[SqlType]) -> String {
    if candidates.is_empty() {
        return "{}".to_string();
    }
    let names: Vec<&str> = candidates.iter().map(|t| t.name()).collect();
    format!("{{{}}}", names.join(", "))
}

/// Turn an operand into a typed expression of tag `ty`.
pub(crate) fn materialize(operand: Operand, ty: SqlType) -> ForgeResult<Expr> {
    match operand {
        Operand::Expr(e) => Ok(e),
        Operand::Literal(v) => Expr::value(v, ty),
    }
}

/// Resolve both sides of a binary operator independently.
pub fn resolve_pair(
    allowed: &[SqlType],
    left: impl Into<Operand>,
    right: impl Into<Operand>,
) -> ForgeResult<(Expr, Expr)> {
    let (left, right) = (left.into(), right.into());
    let a = possible_types(allowed, &left);
    let b = possible_types(allowed, &right);
    let left_ty = unify(&a, &b)?;
    let right_ty = unify(&b, &a)?;
    Ok((materialize(left, left_ty)?, materialize(right, right_ty)?))
}

/// Resolve an operand against a fixed target tag (e.g. an INSERT column).
pub fn resolve_against(operand: impl Into<Operand>, ty: SqlType) -> ForgeResult<Expr> {
    let operand = operand.into();
    let candidates = possible_types(&SqlType::ALL, &operand);
    let chosen = unify(&candidates, &[ty])?;
    let expr = materialize(operand, chosen)?;
    require_same_group(ty, expr.ty())?;
    Ok(expr)
}

/// Resolve a list of operands that must all share one type group
/// (`BETWEEN`, `IN`, `COALESCE`).
///
/// The first operand whose candidate set is a singleton anchors the rest.
pub fn resolve_list(allowed: &[SqlType], operands: Vec<Operand>) -> ForgeResult<Vec<Expr>> {
    let candidates: Vec<Vec<SqlType>> = operands
        .iter()
        .map(|op| possible_types(allowed, op))
        .collect();
    let anchor = candidates
        .iter()
        .find_map(|c| match c.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
        .ok_or_else(|| ForgeError::ambiguous("no operand has a definite type"))?;

    let mut out = Vec::with_capacity(operands.len());
    for (operand, cands) in operands.into_iter().zip(candidates) {
        let ty = unify(&cands, &[anchor])?;
        require_same_group(anchor, ty)?;
        out.push(materialize(operand, ty)?);
    }
    Ok(out)
}

/// Both tags must belong to the same comparison group.
pub fn require_same_group(a: SqlType, b: SqlType) -> ForgeResult<()> {
    if a.group() == b.group() {
        Ok(())
    } else {
        Err(ForgeError::ambiguous(format!(
            "{a} and {b} belong to different type groups"
        )))
    }
}

/// The tag must belong to `group`.
pub fn require_group(ty: SqlType, group: TypeGroup) -> ForgeResult<()> {
    if ty.group() == group {
        Ok(())
    } else {
        Err(ForgeError::ambiguous(format!(
            "{ty} is not in the {group:?} type group"
        )))
    }
}

/// The tag must be one of `allowed`.
pub fn require_one_of(ty: SqlType, allowed: &[SqlType]) -> ForgeResult<()> {
    if allowed.contains(&ty) {
        Ok(())
    } else {
        Err(ForgeError::type_mismatch(describe(allowed), ty.name()))
    }
}
