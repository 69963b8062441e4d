//! Statement builders.
//!
//! Every transition consumes the builder and returns a new state, so a shared
//! base can be cloned and extended independently.
//!
//! ```ignore
//! use pgforge::prelude::*;
//!
//! let u = users.alias("u");
//! let stmt = stmt::from(u.clone())?
//!     .where_(u.col("active")?.eq(true)?)?
//!     .select([("id", u.col("id")?), ("name", u.col("name")?)])?
//!     .order_by(u.col("name")?, Order::Asc)?
//!     .limit(10);
//!
//! let rows = stmt.fetch_all(&client, &Bindings::new()).await?;
//! ```

mod delete;
mod insert;
mod select;
mod source;
mod update;
mod with;

#[cfg(test)]
mod tests;

pub use delete::Delete;
pub use insert::Insert;
pub use select::{FromClause, Grouped, Order, Select, SetOp};
pub use source::{Aliased, CteRef};
pub use update::Update;
pub use with::With;

use crate::client::GenericClient;
use crate::config::ExecConfig;
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Bindings, Compiled, Expr, RenderContext, params_ref};
use crate::types::value::decode;
use crate::types::{SqlType, Value};
use std::fmt;
use tokio_postgres::Row;

/// A named, typed column a statement produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub ty: SqlType,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A complete, renderable statement.
pub trait Statement: fmt::Debug + Send + Sync {
    /// Render the statement, WITH clause included, allocating parameters in `ctx`.
    fn render(&self, ctx: &mut RenderContext) -> String;

    /// Columns produced by the statement (projection or RETURNING).
    fn output(&self) -> &[OutputColumn];

    /// Validate builder state before execution.
    fn validate(&self) -> ForgeResult<()> {
        Ok(())
    }

    /// INSERT, UPDATE and DELETE report `true`.
    fn is_data_modifying(&self) -> bool {
        false
    }

    /// Validate and render into SQL text plus parameter slots.
    fn build(&self) -> ForgeResult<Compiled> {
        self.validate()?;
        let mut ctx = RenderContext::new();
        let sql = self.render(&mut ctx);
        Ok(Compiled::new(sql, ctx))
    }

    /// Debug helper to get the SQL string.
    fn to_sql(&self) -> String {
        self.render(&mut RenderContext::new())
    }

    /// Execute and decode all rows.
    fn fetch_all(
        &self,
        conn: &impl GenericClient,
        bindings: &Bindings,
    ) -> impl std::future::Future<Output = ForgeResult<Vec<Record>>> + Send
    where
        Self: Sized,
    {
        async move { Executor::new(conn).fetch_all(self, bindings).await }
    }

    /// Execute and decode the first row, if any.
    fn fetch_opt(
        &self,
        conn: &impl GenericClient,
        bindings: &Bindings,
    ) -> impl std::future::Future<Output = ForgeResult<Option<Record>>> + Send
    where
        Self: Sized,
    {
        async move { Executor::new(conn).fetch_opt(self, bindings).await }
    }

    /// Execute and return the affected row count.
    fn execute(
        &self,
        conn: &impl GenericClient,
        bindings: &Bindings,
    ) -> impl std::future::Future<Output = ForgeResult<u64>> + Send
    where
        Self: Sized,
    {
        async move { Executor::new(conn).execute(self, bindings).await }
    }
}

/// A decoded result row: output column names paired with values, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub(crate) fn from_row(row: &Row, output: &[OutputColumn]) -> ForgeResult<Self> {
        if row.len() != output.len() {
            return Err(ForgeError::decode(
                "*",
                format!("expected {} columns, got {}", output.len(), row.len()),
            ));
        }
        let columns = output
            .iter()
            .enumerate()
            .map(|(idx, col)| Ok((col.name.clone(), decode(row, idx, col.ty)?)))
            .collect::<ForgeResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.columns.get(idx).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_inner(self) -> Vec<(String, Value)> {
        self.columns
    }
}

/// Runs statements against a client, logging each one per [`ExecConfig`].
pub struct Executor<'a, C> {
    conn: &'a C,
    config: ExecConfig,
}

impl<'a, C: GenericClient> Executor<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self::with_config(conn, ExecConfig::default())
    }

    pub fn with_config(conn: &'a C, config: ExecConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    async fn query<S: Statement + ?Sized>(
        &self,
        stmt: &S,
        bindings: &Bindings,
    ) -> ForgeResult<Vec<Row>> {
        let compiled = stmt.build()?;
        let values = compiled.bind(bindings)?;
        let params = params_ref(&values);
        self.config.emit(compiled.sql(), params.len());
        match &self.config.tag {
            Some(tag) => self.conn.query_tagged(tag, compiled.sql(), &params).await,
            None => self.conn.query(compiled.sql(), &params).await,
        }
    }

    pub async fn fetch_all<S: Statement + ?Sized>(
        &self,
        stmt: &S,
        bindings: &Bindings,
    ) -> ForgeResult<Vec<Record>> {
        let rows = self.query(stmt, bindings).await?;
        rows.iter()
            .map(|row| Record::from_row(row, stmt.output()))
            .collect()
    }

    pub async fn fetch_opt<S: Statement + ?Sized>(
        &self,
        stmt: &S,
        bindings: &Bindings,
    ) -> ForgeResult<Option<Record>> {
        let rows = self.query(stmt, bindings).await?;
        rows.first()
            .map(|row| Record::from_row(row, stmt.output()))
            .transpose()
    }

    pub async fn execute<S: Statement + ?Sized>(
        &self,
        stmt: &S,
        bindings: &Bindings,
    ) -> ForgeResult<u64> {
        let compiled = stmt.build()?;
        let values = compiled.bind(bindings)?;
        let params = params_ref(&values);
        self.config.emit(compiled.sql(), params.len());
        match &self.config.tag {
            Some(tag) => self.conn.execute_tagged(tag, compiled.sql(), &params).await,
            None => self.conn.execute(compiled.sql(), &params).await,
        }
    }
}

/// Start a statement with a single CTE binding.
pub fn with(name: impl Into<String>, stmt: impl Statement + 'static) -> ForgeResult<With> {
    With::new().with(name, stmt)
}

/// Start a SELECT pipeline from one source.
pub fn from(source: Aliased) -> ForgeResult<FromClause> {
    With::new().from(source)
}

pub fn insert_into(target: Aliased) -> ForgeResult<Insert> {
    With::new().insert_into(target)
}

pub fn update(target: Aliased) -> ForgeResult<Update> {
    With::new().update(target)
}

pub fn delete_from(target: Aliased) -> ForgeResult<Delete> {
    With::new().delete_from(target)
}


/// `WHERE`/`HAVING`/`ON` conditions must be boolean.
pub(crate) fn require_condition(cond: &Expr, clause: &str) -> ForgeResult<()> {
    if cond.ty() == SqlType::Boolean {
        Ok(())
    } else {
        Err(ForgeError::type_mismatch(
            format!("boolean {clause} condition"),
            cond.ty().name(),
        ))
    }
}

/// AND a new condition onto an optional existing one.
pub(crate) fn and_condition(existing: Option<Expr>, cond: Expr) -> ForgeResult<Expr> {
    match existing {
        Some(prev) => prev.and(cond),
        None => Ok(cond),
    }
}
