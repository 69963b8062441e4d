//! UPDATE builder.

use super::source::{Aliased, render_returning, returning_source};
use super::{OutputColumn, Statement, With, and_condition, require_condition};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Expr, RenderContext, precedence};
use crate::migrate::naming::quote_ident;
use crate::types::resolve::{Operand, resolve_against};
use std::sync::Arc;

/// `UPDATE target SET ... [FROM using...] [WHERE ...] [RETURNING ...]`.
#[derive(Debug, Clone)]
#[must_use]
pub struct Update {
    with: With,
    target: Aliased,
    sets: Vec<(String, Expr)>,
    using: Vec<Aliased>,
    where_: Option<Expr>,
    returning: Vec<Expr>,
    output: Vec<OutputColumn>,
}

impl Update {
    pub(crate) fn new(with: With, target: Aliased) -> ForgeResult<Self> {
        target.require_table("UPDATE")?;
        Ok(Self {
            with,
            target,
            sets: Vec::new(),
            using: Vec::new(),
            where_: None,
            returning: Vec::new(),
            output: Vec::new(),
        })
    }

    /// `SET column = value`. Setting the same column again replaces it.
    pub fn set(mut self, column: &str, value: impl Into<Operand>) -> ForgeResult<Self> {
        let target = self.target.col(column)?;
        let expr = resolve_against(value, target.ty())?;
        match self.sets.iter_mut().find(|(c, _)| c == column) {
            Some(slot) => slot.1 = expr,
            None => self.sets.push((column.to_string(), expr)),
        }
        Ok(self)
    }

    /// Add a source visible to SET and WHERE expressions (`FROM` list).
    pub fn using(mut self, source: Aliased) -> ForgeResult<Self> {
        let source = source.adopt(&mut self.with)?;
        self.using.push(source);
        Ok(self)
    }

    /// Add a WHERE condition. Repeated calls are ANDed.
    pub fn where_(mut self, cond: Expr) -> ForgeResult<Self> {
        require_condition(&cond, "WHERE")?;
        self.where_ = Some(and_condition(self.where_.take(), cond)?);
        Ok(self)
    }

    /// Set RETURNING columns of the target.
    pub fn returning(mut self, columns: &[&str]) -> ForgeResult<Self> {
        let (exprs, output) = self.target.returning(columns)?;
        self.returning = exprs;
        self.output = output;
        Ok(self)
    }

    /// Use this statement's RETURNING rows as a FROM source.
    pub fn alias(self, alias: impl Into<String>) -> ForgeResult<Aliased> {
        returning_source(Arc::new(self), alias)
    }
}

impl Update {
    fn render_body(&self, ctx: &mut RenderContext) -> String {
        let table = self.target.model().map(|m| m.name()).unwrap_or_default();
        let mut sql = format!(
            "UPDATE {} AS {} SET ",
            quote_ident(table),
            quote_ident(self.target.alias())
        );
        let sets: Vec<String> = self
            .sets
            .iter()
            .map(|(col, expr)| {
                format!(
                    "{} = {}",
                    quote_ident(col),
                    expr.render_child(ctx, precedence::STATEMENT, false)
                )
            })
            .collect();
        sql.push_str(&sets.join(", "));
        if !self.using.is_empty() {
            let sources: Vec<String> = self.using.iter().map(|s| s.render_from(ctx)).collect();
            sql.push_str(" FROM ");
            sql.push_str(&sources.join(", "));
        }
        if let Some(cond) = &self.where_ {
            sql.push_str(" WHERE ");
            sql.push_str(&cond.render(ctx));
        }
        sql.push_str(&render_returning(&self.returning, ctx));
        sql
    }
}

impl Statement for Update {
    fn render(&self, ctx: &mut RenderContext) -> String {
        self.with.render_around(ctx, |ctx| self.render_body(ctx))
    }

    fn is_data_modifying(&self) -> bool {
        true
    }

    fn output(&self) -> &[OutputColumn] {
        &self.output
    }

    fn validate(&self) -> ForgeResult<()> {
        if self.sets.is_empty() {
            return Err(ForgeError::invalid("UPDATE requires at least one SET"));
        }
        Ok(())
    }
}
