//! DELETE builder.

use super::source::{Aliased, render_returning, returning_source};
use super::{OutputColumn, Statement, With, and_condition, require_condition};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Expr, RenderContext};
use crate::migrate::naming::quote_ident;
use std::sync::Arc;

/// `DELETE FROM target [USING ...] [WHERE ...] [RETURNING ...]`.
///
/// A statement without a WHERE condition fails validation unless
/// [`Delete::allow_delete_all`] is set.
#[derive(Debug, Clone)]
#[must_use]
pub struct Delete {
    with: With,
    target: Aliased,
    using: Vec<Aliased>,
    where_: Option<Expr>,
    returning: Vec<Expr>,
    output: Vec<OutputColumn>,
    allow_delete_all: bool,
}

impl Delete {
    pub(crate) fn new(with: With, target: Aliased) -> ForgeResult<Self> {
        target.require_table("DELETE")?;
        Ok(Self {
            with,
            target,
            using: Vec::new(),
            where_: None,
            returning: Vec::new(),
            output: Vec::new(),
            allow_delete_all: false,
        })
    }

    /// Allow deleting every row when no WHERE condition is given.
    pub fn allow_delete_all(mut self, allow: bool) -> Self {
        self.allow_delete_all = allow;
        self
    }

    /// Add a source visible to the WHERE condition.
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

impl Delete {
    fn render_body(&self, ctx: &mut RenderContext) -> String {
        let table = self.target.model().map(|m| m.name()).unwrap_or_default();
        let mut sql = format!(
            "DELETE FROM {} AS {}",
            quote_ident(table),
            quote_ident(self.target.alias())
        );
        if !self.using.is_empty() {
            let sources: Vec<String> = self.using.iter().map(|s| s.render_from(ctx)).collect();
            sql.push_str(" USING ");
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

impl Statement for Delete {
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
        if self.where_.is_none() && !self.allow_delete_all {
            return Err(ForgeError::invalid(
                "DELETE without WHERE requires allow_delete_all",
            ));
        }
        Ok(())
    }
}
