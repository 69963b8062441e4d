//! Schema migration: structural diff and three-pass DDL planning.
//!
//! ```ignore
//! use pgforge::prelude::*;
//!
//! let previous = SchemaSnapshot::from_json(&std::fs::read_to_string("schema.json")?)?;
//! let current = SchemaSnapshot::from_models([&users, &posts]);
//! let plan = MigrationPlan::plan(&previous, &current)?;
//! println!("{}", plan.to_script());
//! ```

pub mod diff;
pub mod naming;
pub mod plan;

pub use diff::{KeyDiff, TableDiff, diff_keys, diff_tables};
pub use naming::{constraint_name, quote_ident};
pub use plan::{MigrationPlan, TablePlan, plan_table};
