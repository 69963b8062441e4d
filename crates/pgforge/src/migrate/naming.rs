//! Identifier quoting and constraint naming.
//!
//! Constraint names are `KIND_table_col1_col2...`. Underscores inside each
//! component are doubled first so distinct keys never collide: `(a_b)` on
//! `t` is `UQ_t_a__b`, while `(a, b)` is `UQ_t_a_b`.

use crate::schema::ForeignKey;

/// Quote an identifier, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Build `KIND_table_col...` with underscores escaped per component.
pub fn constraint_name<S: AsRef<str>>(kind: &str, table: &str, columns: &[S]) -> String {
    let mut name = format!("{kind}_{}", escape(table));
    for column in columns {
        name.push('_');
        name.push_str(&escape(column.as_ref()));
    }
    name
}

fn escape(component: &str) -> String {
    component.replace('_', "__")
}

pub fn primary_key_name(table: &str) -> String {
    constraint_name::<&str>("PK", table, &[])
}

pub fn unique_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    constraint_name("UQ", table, columns)
}

pub fn index_name<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    constraint_name("IX", table, columns)
}

pub fn check_name(table: &str, column: &str) -> String {
    constraint_name("CK", table, &[column])
}

/// The sequence PostgreSQL creates for a serial column: `table_column_seq`.
pub fn sequence_name(table: &str, column: &str) -> String {
    format!("{table}_{column}_seq")
}

/// `FK_table_from..._target_to...`.
pub fn foreign_key_name(table: &str, fk: &ForeignKey) -> String {
    let mut parts: Vec<&str> = fk.from.iter().map(String::as_str).collect();
    parts.push(&fk.table);
    parts.extend(fk.to.iter().map(String::as_str));
    constraint_name("FK", table, &parts)
}

/// Comma-separated quoted identifier list.
pub(crate) fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
