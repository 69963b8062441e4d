//! FROM sources and aliases.

use super::{OutputColumn, Select, Statement, With};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Expr, RenderContext};
use crate::migrate::naming::quote_ident;
use crate::schema::Model;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub(crate) enum Source {
    Table(Arc<Model>),
    Subquery(Arc<Select>),
    Cte(String),
    /// A data-modifying statement with RETURNING. Moved into the WITH list
    /// when the enclosing statement adopts it, and from there into the
    /// outermost statement's WITH when rendered.
    Returning(Arc<dyn Statement>),
}

/// A table provider bound to an alias.
///
/// Column references obtained through [`Aliased::col`] render as
/// `"alias"."column"`.
#[derive(Debug, Clone)]
pub struct Aliased {
    alias: String,
    source: Source,
    columns: Vec<OutputColumn>,
}

impl Aliased {
    pub(crate) fn new(alias: impl Into<String>, source: Source, columns: Vec<OutputColumn>) -> Self {
        Self {
            alias: alias.into(),
            source,
            columns,
        }
    }

    /// Alias a model's table.
    pub fn table(model: Arc<Model>, alias: impl Into<String>) -> Self {
        let columns = model
            .columns()
            .iter()
            .map(|(name, col)| OutputColumn::new(name.clone(), col.ty.sql_type()))
            .collect();
        Self::new(alias, Source::Table(model), columns)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    /// Reference a column of this source.
    pub fn col(&self, name: &str) -> ForgeResult<Expr> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| Expr::column(&self.alias, &c.name, c.ty))
            .ok_or_else(|| ForgeError::unknown_column(&self.alias, name))
    }

    /// All columns of this source, in declaration order.
    pub fn all_cols(&self) -> Vec<(String, Expr)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), Expr::column(&self.alias, &c.name, c.ty)))
            .collect()
    }

    /// The underlying model, when the source is a table.
    pub(crate) fn model(&self) -> Option<&Model> {
        match &self.source {
            Source::Table(model) => Some(model),
            _ => None,
        }
    }

    pub(crate) fn require_table(&self, statement: &str) -> ForgeResult<&Model> {
        self.model().ok_or_else(|| {
            ForgeError::invalid(format!(
                "{statement} target '{}' must be a table",
                self.alias
            ))
        })
    }

    /// Move a RETURNING source into `with` under this alias.
    pub(crate) fn adopt(self, with: &mut With) -> ForgeResult<Self> {
        match self.source {
            Source::Returning(stmt) => {
                with.push_statement(self.alias.clone(), self.columns.clone(), stmt)?;
                Ok(Self {
                    source: Source::Cte(self.alias.clone()),
                    ..self
                })
            }
            _ => Ok(self),
        }
    }

    pub(crate) fn render_from(&self, ctx: &mut RenderContext) -> String {
        let alias = quote_ident(&self.alias);
        match &self.source {
            Source::Table(model) => format!("{} AS {alias}", quote_ident(model.name())),
            Source::Subquery(query) => format!("({}) AS {alias}", query.render(ctx)),
            Source::Cte(name) if *name == self.alias => alias,
            Source::Cte(name) => format!("{} AS {alias}", quote_ident(name)),
            Source::Returning(_) => alias,
        }
    }

    /// RETURNING list for a DML statement targeting this source.
    pub(crate) fn returning(&self, names: &[&str]) -> ForgeResult<(Vec<Expr>, Vec<OutputColumn>)> {
        let mut exprs = Vec::with_capacity(names.len());
        let mut output = Vec::with_capacity(names.len());
        for name in names {
            let expr = self.col(name)?;
            output.push(OutputColumn::new(*name, expr.ty()));
            exprs.push(expr);
        }
        Ok((exprs, output))
    }
}

/// A reference to a CTE binding, usable as a FROM source.
#[derive(Debug, Clone)]
pub struct CteRef {
    name: String,
    columns: Vec<OutputColumn>,
}

impl CteRef {
    pub(crate) fn new(name: impl Into<String>, columns: Vec<OutputColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn alias(&self, alias: impl Into<String>) -> Aliased {
        Aliased::new(alias, Source::Cte(self.name.clone()), self.columns.clone())
    }
}

/// Render a RETURNING clause, or nothing.
pub(crate) fn render_returning(exprs: &[Expr], ctx: &mut RenderContext) -> String {
    if exprs.is_empty() {
        return String::new();
    }
    let cols: Vec<String> = exprs.iter().map(|e| e.render(ctx)).collect();
    format!(" RETURNING {}", cols.join(", "))
}

/// Wrap a DML statement with RETURNING as a FROM source.
pub(crate) fn returning_source(
    stmt: Arc<dyn Statement>,
    alias: impl Into<String>,
) -> ForgeResult<Aliased> {
    let columns = stmt.output().to_vec();
    if columns.is_empty() {
        return Err(ForgeError::invalid(
            "a data-modifying statement used as a source needs RETURNING",
        ));
    }
    stmt.validate()?;
    Ok(Aliased::new(alias, Source::Returning(stmt), columns))
}
