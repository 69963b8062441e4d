//! # pgforge
//!
//! Typed PostgreSQL statement building and schema migration planning.
//!
//! ## Features
//!
//! - **Typed expressions**: every expression knows its SQL type; literals are
//!   resolved against the other operand and coerced before rendering
//! - **Minimal parentheses**: operators render with precedence-aware grouping
//! - **Parameters, not interpolation**: literals become `$n` placeholders and
//!   named parameters share one slot per name
//! - **Composable statements**: WITH / WITH RECURSIVE, joins, GROUP BY, set
//!   operations, INSERT / UPDATE / DELETE with RETURNING usable as a source
//! - **Safe defaults**: DELETE without WHERE deletes nothing unless allowed
//! - **Migrations**: diff two schema snapshots into pre / update / post DDL
//!
//! ## Statements
//!
//! ```ignore
//! use pgforge::prelude::*;
//!
//! let users = Model::new("users")
//!     .column("id", Column::bigserial().not_null())
//!     .column("name", Column::text().not_null())
//!     .column("age", Column::integer())
//!     .primary_key(&["id"])?;
//!
//! let u = users.alias("u");
//! let adults = stmt::from(u.clone())?
//!     .where_(u.col("age")?.gte(Expr::param("min_age", SqlType::Integer))?)?
//!     .select([("id", u.col("id")?), ("name", u.col("name")?)])?;
//!
//! let rows = adults
//!     .fetch_all(&client, &Bindings::new().set("min_age", 18))
//!     .await?;
//! ```
//!
//! ## Migrations
//!
//! ```ignore
//! let plan = MigrationPlan::plan(&SchemaSnapshot::new(), &SchemaSnapshot::from_models([&users]))?;
//! plan.apply(&client).await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod expr;
pub mod migrate;
pub mod prelude;
pub mod schema;
pub mod stmt;
pub mod types;

pub use client::GenericClient;
pub use config::ExecConfig;
pub use error::{ForgeError, ForgeResult};
pub use expr::{Bindings, Compiled, Expr, RenderContext};
pub use migrate::{MigrationPlan, TablePlan, plan_table};
pub use schema::{Column, ColumnType, ForeignKey, Model, SchemaSnapshot, TableSnapshot};
pub use stmt::{
    Aliased, Delete, Executor, FromClause, Insert, Order, OutputColumn, Record, Select, Statement,
    Update, With,
};
pub use types::{SqlType, TypeGroup, Value};
