//! Aggregates and scalar functions.

use super::{Expr, Node, precedence as p};
use crate::error::{ForgeError, ForgeResult};
use crate::stmt::Select;
use crate::types::SqlType;
use crate::types::resolve::{self, Operand};
use std::sync::Arc;

/// `count(*)`.
pub fn count_all() -> Expr {
    Expr::count_all()
}

/// `count(x)`.
pub fn count(expr: &Expr) -> Expr {
    Expr::aggregate("count", vec![expr.clone()], false, SqlType::Bigint)
}

/// `count(DISTINCT x)`.
pub fn count_distinct(expr: &Expr) -> Expr {
    Expr::aggregate("count", vec![expr.clone()], true, SqlType::Bigint)
}

/// `sum(x)`, typed the way the server widens it.
pub fn sum(expr: &Expr) -> ForgeResult<Expr> {
    let ty = match expr.ty() {
        SqlType::Smallint | SqlType::Integer => SqlType::Bigint,
        SqlType::Bigint | SqlType::Numeric => SqlType::Numeric,
        SqlType::Float => SqlType::Float,
        SqlType::Double => SqlType::Double,
        other => return Err(ForgeError::type_mismatch("numeric", other.name())),
    };
    Ok(Expr::aggregate("sum", vec![expr.clone()], false, ty))
}

/// `avg(x)`.
pub fn avg(expr: &Expr) -> ForgeResult<Expr> {
    let ty = match expr.ty() {
        SqlType::Smallint | SqlType::Integer | SqlType::Bigint | SqlType::Numeric => {
            SqlType::Numeric
        }
        SqlType::Float | SqlType::Double => SqlType::Double,
        other => return Err(ForgeError::type_mismatch("numeric", other.name())),
    };
    Ok(Expr::aggregate("avg", vec![expr.clone()], false, ty))
}

pub fn min(expr: &Expr) -> Expr {
    Expr::aggregate("min", vec![expr.clone()], false, expr.ty())
}

pub fn max(expr: &Expr) -> Expr {
    Expr::aggregate("max", vec![expr.clone()], false, expr.ty())
}

/// `COALESCE(a, b, ...)`; all arguments must share one type group.
pub fn coalesce<I, T>(args: I) -> ForgeResult<Expr>
where
    I: IntoIterator<Item = T>,
    T: Into<Operand>,
{
    let operands: Vec<Operand> = args.into_iter().map(Into::into).collect();
    if operands.is_empty() {
        return Err(ForgeError::invalid("COALESCE requires at least one argument"));
    }
    let exprs = resolve::resolve_list(&SqlType::ALL, operands)?;
    let ty = exprs[0].ty();
    Ok(Expr::function("COALESCE", exprs, ty))
}

fn text_function(name: &'static str, arg: Operand) -> ForgeResult<Expr> {
    let candidates = resolve::possible_types(&SqlType::TEXTUAL, &arg);
    let ty = resolve::unify(&candidates, &[SqlType::Text])?;
    resolve::require_one_of(ty, &SqlType::TEXTUAL)?;
    let arg = resolve::materialize(arg, ty)?;
    Ok(Expr::function(name, vec![arg], SqlType::Text))
}

pub fn lower(arg: impl Into<Operand>) -> ForgeResult<Expr> {
    text_function("lower", arg.into())
}

pub fn upper(arg: impl Into<Operand>) -> ForgeResult<Expr> {
    text_function("upper", arg.into())
}

/// `EXISTS (query)`.
pub fn exists(query: Select) -> Expr {
    Expr::make(
        Node::Exists(Arc::new(query)),
        SqlType::Boolean,
        true,
        p::ATOM,
    )
}
