//! Convenient imports for typical `pgforge` usage.
//!
//! ```ignore
//! use pgforge::prelude::*;
//! ```

pub use crate::expr::{
    avg, coalesce, count, count_all, count_distinct, exists, lower, max, min, sum, upper,
};
pub use crate::stmt;
pub use crate::{
    Aliased, Bindings, Column, Expr, ExecConfig, ForgeError, ForgeResult, GenericClient,
    MigrationPlan, Model, Order, Record, SchemaSnapshot, SqlType, Statement, Value,
};
