//! INSERT builder.

use super::source::{Aliased, render_returning, returning_source};
use super::{OutputColumn, Select, Statement, With};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Expr, RenderContext, precedence};
use crate::migrate::naming::quote_ident;
use crate::types::resolve::{Operand, resolve_against};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum InsertSource {
    Default,
    Values(Vec<Vec<Expr>>),
    Select(Box<Select>),
}

/// `INSERT INTO target (...) VALUES ... | SELECT ...`.
#[derive(Debug, Clone)]
#[must_use]
pub struct Insert {
    with: With,
    target: Aliased,
    columns: Vec<String>,
    source: InsertSource,
    returning: Vec<Expr>,
    output: Vec<OutputColumn>,
}

impl Insert {
    pub(crate) fn new(with: With, target: Aliased) -> ForgeResult<Self> {
        target.require_table("INSERT")?;
        Ok(Self {
            with,
            target,
            columns: Vec::new(),
            source: InsertSource::Default,
            returning: Vec::new(),
            output: Vec::new(),
        })
    }

    /// Append one row of `(column, value)` pairs.
    ///
    /// The first row fixes the column list; later rows must name exactly the
    /// same columns, in any order.
    pub fn values<N, T, I>(mut self, row: I) -> ForgeResult<Self>
    where
        N: AsRef<str>,
        T: Into<Operand>,
        I: IntoIterator<Item = (N, T)>,
    {
        let row: Vec<(String, Operand)> = row
            .into_iter()
            .map(|(n, v)| (n.as_ref().to_string(), v.into()))
            .collect();
        if row.is_empty() {
            return Err(ForgeError::invalid("INSERT row has no columns"));
        }
        for (i, (name, _)) in row.iter().enumerate() {
            if row[..i].iter().any(|(n, _)| n == name) {
                return Err(ForgeError::invalid(format!(
                    "column '{name}' appears twice in one INSERT row"
                )));
            }
        }

        match self.source {
            InsertSource::Select(_) => {
                return Err(ForgeError::invalid("INSERT already has a SELECT source"));
            }
            InsertSource::Default => {
                self.columns = row.iter().map(|(n, _)| n.clone()).collect();
            }
            InsertSource::Values(_) => {}
        }

        if row.len() != self.columns.len() {
            return Err(ForgeError::invalid(format!(
                "INSERT row has {} columns, expected {}",
                row.len(),
                self.columns.len()
            )));
        }

        let mut row = row;
        let mut exprs = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let pos = row.iter().position(|(n, _)| n == column).ok_or_else(|| {
                ForgeError::invalid(format!("INSERT row is missing column '{column}'"))
            })?;
            let (_, operand) = row.swap_remove(pos);
            let target = self.target.col(column)?;
            exprs.push(resolve_against(operand, target.ty())?);
        }

        if let InsertSource::Values(rows) = &mut self.source {
            rows.push(exprs);
        } else {
            self.source = InsertSource::Values(vec![exprs]);
        }
        Ok(self)
    }

    /// Insert the rows produced by `query` into `columns`.
    pub fn from_select<N, I>(mut self, columns: I, query: Select) -> ForgeResult<Self>
    where
        N: AsRef<str>,
        I: IntoIterator<Item = N>,
    {
        if !matches!(self.source, InsertSource::Default) {
            return Err(ForgeError::invalid("INSERT already has a source"));
        }
        let columns: Vec<String> = columns
            .into_iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        if columns.len() != query.output().len() {
            return Err(ForgeError::invalid(format!(
                "INSERT names {} columns but the query produces {}",
                columns.len(),
                query.output().len()
            )));
        }
        for (column, produced) in columns.iter().zip(query.output()) {
            let target = self.target.col(column)?;
            if target.ty().group() != produced.ty.group() {
                return Err(ForgeError::type_mismatch(
                    format!("{} for column '{column}'", target.ty()),
                    produced.ty.name(),
                ));
            }
        }
        self.columns = columns;
        self.source = InsertSource::Select(Box::new(query));
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

impl Insert {
    fn render_body(&self, ctx: &mut RenderContext) -> String {
        let table = self.target.model().map(|m| m.name()).unwrap_or_default();
        let mut sql = format!(
            "INSERT INTO {} AS {}",
            quote_ident(table),
            quote_ident(self.target.alias())
        );
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        match &self.source {
            InsertSource::Default => sql.push_str(" DEFAULT VALUES"),
            InsertSource::Values(rows) => {
                let rows: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let values: Vec<String> = row
                            .iter()
                            .map(|e| e.render_child(ctx, precedence::STATEMENT, false))
                            .collect();
                        format!("({})", values.join(", "))
                    })
                    .collect();
                sql.push_str(&format!(
                    " ({}) VALUES {}",
                    columns.join(", "),
                    rows.join(", ")
                ));
            }
            InsertSource::Select(query) => {
                sql.push_str(&format!(" ({}) {}", columns.join(", "), query.render(ctx)));
            }
        }
        sql.push_str(&render_returning(&self.returning, ctx));
        sql
    }
}

impl Statement for Insert {
    fn render(&self, ctx: &mut RenderContext) -> String {
        self.with.render_around(ctx, |ctx| self.render_body(ctx))
    }

    fn is_data_modifying(&self) -> bool {
        true
    }

    fn output(&self) -> &[OutputColumn] {
        &self.output
    }
}
