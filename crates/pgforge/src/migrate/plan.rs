//! Migration planning.
//!
//! Each table yields three statement lists. Applied across a schema, every
//! table's `pre` runs first, then every `update`, then every `post`, so
//! foreign keys are never present while the columns they span change.

use super::diff::{TableDiff, diff_tables};
use super::naming::{
    check_name, foreign_key_name, index_name, primary_key_name, quote_ident, quote_list,
    sequence_name, unique_name,
};
use crate::client::GenericClient;
use crate::error::{ForgeError, ForgeResult};
use crate::schema::{Column, ForeignKey, SchemaSnapshot, TableSnapshot};
use std::collections::{BTreeMap, BTreeSet};

/// DDL for one table, split by pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePlan {
    pub pre: Vec<String>,
    pub update: Vec<String>,
    pub post: Vec<String>,
}

impl TablePlan {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.update.is_empty() && self.post.is_empty()
    }
}

type Touched = BTreeMap<String, BTreeSet<String>>;

/// Plan one table in isolation.
///
/// `None` on the `from` side creates the table, `None` on the `to` side
/// drops it. Both absent is [`ForgeError::NothingToMigrate`].
pub fn plan_table(from: Option<&TableSnapshot>, to: Option<&TableSnapshot>) -> ForgeResult<TablePlan> {
    let mut touched = Touched::new();
    if let (Some(f), Some(t)) = (from, to) {
        let diff = diff_tables(f, t);
        touched.insert(diff.table.clone(), diff.touched_columns());
    }
    plan_with(from, to, &touched)
}

fn plan_with(
    from: Option<&TableSnapshot>,
    to: Option<&TableSnapshot>,
    touched: &Touched,
) -> ForgeResult<TablePlan> {
    match (from, to) {
        (None, None) => Err(ForgeError::NothingToMigrate),
        (None, Some(to)) => create_table(to),
        (Some(from), None) => Ok(drop_table(from)),
        (Some(from), Some(to)) => alter_table(from, to, touched),
    }
}

fn create_table(table: &TableSnapshot) -> ForgeResult<TablePlan> {
    let name = &table.name;
    let mut body = Vec::new();
    let mut checks = Vec::new();
    for column_name in table.column_names() {
        let column = table.decode_column(column_name)?;
        body.push(column.ddl(column_name));
        if let Some(check) = column.check_clause(column_name) {
            checks.push(format!(
                "CONSTRAINT {} {check}",
                quote_ident(&check_name(name, column_name))
            ));
        }
    }
    body.extend(checks);
    if !table.primary_key.is_empty() {
        body.push(primary_key_clause(name, &table.primary_key));
    }
    for key in &table.unique_key {
        body.push(unique_clause(name, key));
    }

    let mut plan = TablePlan::default();
    plan.update.push(format!(
        "CREATE TABLE {} ( {} );",
        quote_ident(name),
        body.join(", ")
    ));
    for index in &table.indices {
        plan.update.push(create_index(name, index));
    }
    for fk in &table.foreign_keys {
        plan.post.push(add_foreign_key(name, fk));
    }
    Ok(plan)
}

fn drop_table(table: &TableSnapshot) -> TablePlan {
    let mut plan = TablePlan::default();
    for fk in &table.foreign_keys {
        plan.pre.push(drop_foreign_key(&table.name, fk));
    }
    plan.update.push(format!("DROP TABLE {};", quote_ident(&table.name)));
    plan
}

fn alter_table(from: &TableSnapshot, to: &TableSnapshot, touched: &Touched) -> ForgeResult<TablePlan> {
    let diff = diff_tables(from, to);
    let mut plan = TablePlan::default();
    let table = &to.name;
    let alter = format!("ALTER TABLE {}", quote_ident(table));

    let deferred: Vec<&ForeignKey> = diff
        .foreign_keys
        .unchanged
        .iter()
        .filter(|fk| spans_touched(table, fk, touched))
        .collect();
    for fk in diff.foreign_keys.removed.iter().chain(deferred.iter().copied()) {
        plan.pre.push(drop_foreign_key(table, fk));
    }

    for column in &diff.removed_columns {
        plan.update
            .push(format!("{alter} DROP COLUMN {};", quote_ident(column)));
    }
    for name in &diff.changed_columns {
        let old = from.decode_column(name)?;
        let new = to.decode_column(name)?;
        alter_column(&mut plan.update, &alter, table, name, &old, &new);
    }
    for name in &diff.added_columns {
        let column = to.decode_column(name)?;
        plan.update
            .push(format!("{alter} ADD COLUMN {};", column.ddl(name)));
        if let Some(check) = column.check_clause(name) {
            plan.update.push(add_check(&alter, table, name, &check));
        }
    }
    unique_changes(&mut plan.update, &alter, table, &diff);
    primary_key_changes(&mut plan.update, &alter, table, &diff);
    index_changes(&mut plan.update, table, &diff);

    for fk in deferred.into_iter().chain(&diff.foreign_keys.added) {
        plan.post.push(add_foreign_key(table, fk));
    }
    Ok(plan)
}

/// Emit only the ALTERs whose attribute actually differs.
fn alter_column(out: &mut Vec<String>, alter: &str, table: &str, name: &str, old: &Column, new: &Column) {
    let column = quote_ident(name);
    let old_check = old.check_clause(name);
    let new_check = new.check_clause(name);
    let check_changed = old_check != new_check;

    if check_changed && old_check.is_some() {
        out.push(format!(
            "{alter} DROP CONSTRAINT IF EXISTS {};",
            quote_ident(&check_name(table, name))
        ));
    }
    let (old_type, new_type) = (old.ty.storage_type(), new.ty.storage_type());
    if old_type != new_type {
        out.push(format!(
            "{alter} ALTER COLUMN {column} TYPE {new_type} USING {column}::{new_type};"
        ));
    }
    if old.is_not_null() != new.is_not_null() {
        let action = if new.is_not_null() { "SET" } else { "DROP" };
        out.push(format!("{alter} ALTER COLUMN {column} {action} NOT NULL;"));
    }

    // a serial column's implicit default is its sequence
    let sequence = quote_ident(&sequence_name(table, name));
    let effective_default = |c: &Column| {
        c.default_to.clone().or_else(|| {
            c.ty.is_serial()
                .then(|| format!("nextval('{sequence}')"))
        })
    };
    let (was_serial, is_serial) = (old.ty.is_serial(), new.ty.is_serial());
    if is_serial && !was_serial {
        out.push(format!(
            "CREATE SEQUENCE IF NOT EXISTS {sequence} AS {new_type} OWNED BY {}.{column};",
            quote_ident(table)
        ));
    }
    let (old_default, new_default) = (effective_default(old), effective_default(new));
    if old_default != new_default {
        match new_default {
            Some(default) => out.push(format!(
                "{alter} ALTER COLUMN {column} SET DEFAULT {default};"
            )),
            None => out.push(format!("{alter} ALTER COLUMN {column} DROP DEFAULT;")),
        }
    }
    if was_serial && !is_serial {
        out.push(format!("DROP SEQUENCE IF EXISTS {sequence};"));
    } else if was_serial && is_serial && old_type != new_type {
        out.push(format!("ALTER SEQUENCE {sequence} AS {new_type};"));
    }
    if check_changed && let Some(check) = new_check {
        out.push(add_check(alter, table, name, &check));
    }
}

fn unique_changes(out: &mut Vec<String>, alter: &str, table: &str, diff: &TableDiff) {
    for key in &diff.unique_keys.removed {
        out.push(format!(
            "{alter} DROP CONSTRAINT IF EXISTS {};",
            quote_ident(&unique_name(table, key))
        ));
    }
    for key in &diff.unique_keys.added {
        out.push(format!("{alter} ADD {};", unique_clause(table, key)));
    }
}

fn primary_key_changes(out: &mut Vec<String>, alter: &str, table: &str, diff: &TableDiff) {
    if !diff.primary_key.removed.is_empty() {
        out.push(format!(
            "{alter} DROP CONSTRAINT IF EXISTS {};",
            quote_ident(&primary_key_name(table))
        ));
    }
    for key in &diff.primary_key.added {
        out.push(format!("{alter} ADD {};", primary_key_clause(table, key)));
    }
}

fn index_changes(out: &mut Vec<String>, table: &str, diff: &TableDiff) {
    for index in &diff.indices.removed {
        out.push(format!(
            "DROP INDEX IF EXISTS {};",
            quote_ident(&index_name(table, index))
        ));
    }
    for index in &diff.indices.added {
        out.push(create_index(table, index));
    }
}

/// Whether `fk` spans a touched column on either side.
fn spans_touched(table: &str, fk: &ForeignKey, touched: &Touched) -> bool {
    let hits = |t: &str, columns: &[String]| {
        touched
            .get(t)
            .is_some_and(|set| columns.iter().any(|c| set.contains(c)))
    };
    hits(table, &fk.from) || hits(&fk.table, &fk.to)
}

fn primary_key_clause(table: &str, columns: &[String]) -> String {
    format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        quote_ident(&primary_key_name(table)),
        quote_list(columns)
    )
}

fn unique_clause(table: &str, columns: &[String]) -> String {
    format!(
        "CONSTRAINT {} UNIQUE ({})",
        quote_ident(&unique_name(table, columns)),
        quote_list(columns)
    )
}

fn add_check(alter: &str, table: &str, column: &str, check: &str) -> String {
    format!(
        "{alter} ADD CONSTRAINT {} {check};",
        quote_ident(&check_name(table, column))
    )
}

fn create_index(table: &str, columns: &[String]) -> String {
    format!(
        "CREATE INDEX {} ON {} ({});",
        quote_ident(&index_name(table, columns)),
        quote_ident(table),
        quote_list(columns)
    )
}

fn add_foreign_key(table: &str, fk: &ForeignKey) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
        quote_ident(table),
        quote_ident(&foreign_key_name(table, fk)),
        quote_list(&fk.from),
        quote_ident(&fk.table),
        quote_list(&fk.to)
    )
}

fn drop_foreign_key(table: &str, fk: &ForeignKey) -> String {
    format!(
        "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {};",
        quote_ident(table),
        quote_ident(&foreign_key_name(table, fk))
    )
}

// ==================== Schema plans ====================

/// Plans for every affected table of a schema, sorted by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    tables: Vec<(String, TablePlan)>,
}

impl MigrationPlan {
    /// Plan the migration from one schema snapshot to another.
    pub fn plan(from: &SchemaSnapshot, to: &SchemaSnapshot) -> ForgeResult<Self> {
        let names: BTreeSet<&str> = from.table_names().chain(to.table_names()).collect();

        let mut touched = Touched::new();
        for name in &names {
            if let (Some(f), Some(t)) = (from.table(name), to.table(name)) {
                let columns = diff_tables(f, t).touched_columns();
                if !columns.is_empty() {
                    touched.insert(name.to_string(), columns);
                }
            }
        }

        let mut tables = Vec::new();
        for name in names {
            let plan = plan_with(from.table(name), to.table(name), &touched)?;
            if plan.is_empty() {
                continue;
            }
            tracing::debug!(
                target: "pgforge.migrate",
                table = name,
                pre = plan.pre.len(),
                update = plan.update.len(),
                post = plan.post.len(),
                "planned table migration"
            );
            tables.push((name.to_string(), plan));
        }
        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[(String, TablePlan)] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TablePlan> {
        self.tables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn pre(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|(_, p)| p.pre.iter().map(String::as_str))
    }

    pub fn update(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|(_, p)| p.update.iter().map(String::as_str))
    }

    pub fn post(&self) -> impl Iterator<Item = &str> {
        self.tables
            .iter()
            .flat_map(|(_, p)| p.post.iter().map(String::as_str))
    }

    /// All statements: every `pre`, then every `update`, then every `post`.
    pub fn statements(&self) -> Vec<&str> {
        self.pre().chain(self.update()).chain(self.post()).collect()
    }

    /// One statement per line.
    pub fn to_script(&self) -> String {
        self.statements().join("\n")
    }

    /// Execute every statement in order. Returns how many ran.
    ///
    /// Statements run one at a time and stop at the first failure; wrap the
    /// call in a transaction to make the migration atomic.
    pub async fn apply(&self, conn: &impl GenericClient) -> ForgeResult<usize> {
        let statements = self.statements();
        for sql in &statements {
            tracing::info!(target: "pgforge.migrate", sql = %sql, "applying migration statement");
            conn.batch_execute(sql).await?;
        }
        Ok(statements.len())
    }
}
