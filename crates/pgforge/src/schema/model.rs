//! Table models.

use super::column::Column;
use super::snapshot::TableSnapshot;
use crate::error::{ForgeError, ForgeResult};
use crate::stmt::Aliased;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// A foreign key from `from` columns of the owning table to `to` columns
/// of `table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
}

impl Ord for ForeignKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.from
            .cmp(&other.from)
            .then_with(|| self.table.cmp(&other.table))
            .then_with(|| self.to.cmp(&other.to))
    }
}

impl PartialOrd for ForeignKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A table definition: ordered columns plus keys and indices.
///
/// ```ignore
/// let users = Model::new("users")
///     .column("id", Column::bigserial().not_null())
///     .column("email", Column::varchar(Some(255)).not_null())
///     .primary_key(&["id"])?
///     .unique(&["email"])?;
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Model {
    name: String,
    columns: Vec<(String, Column)>,
    primary_key: Option<Vec<String>>,
    unique_keys: Vec<Vec<String>>,
    indices: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            unique_keys: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Declare a column. Redeclaring a name replaces it in place.
    pub fn column(mut self, name: impl Into<String>, column: Column) -> Self {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        self
    }

    /// Declare the primary key. A model has at most one.
    pub fn primary_key(mut self, columns: &[&str]) -> ForgeResult<Self> {
        if self.primary_key.is_some() {
            return Err(ForgeError::DuplicatePrimaryKey(self.name.clone()));
        }
        let key = self.key_columns(columns, "primary key")?;
        self.primary_key = Some(key);
        Ok(self)
    }

    pub fn unique(mut self, columns: &[&str]) -> ForgeResult<Self> {
        let key = self.key_columns(columns, "unique key")?;
        if !self.unique_keys.contains(&key) {
            self.unique_keys.push(key);
        }
        Ok(self)
    }

    pub fn index(mut self, columns: &[&str]) -> ForgeResult<Self> {
        let key = self.key_columns(columns, "index")?;
        if !self.indices.contains(&key) {
            self.indices.push(key);
        }
        Ok(self)
    }

    /// Reference `to` columns of `table` from local `from` columns.
    ///
    /// Only the local side is checked; the referenced table may be declared
    /// later or live outside the managed schema.
    pub fn foreign_key(mut self, table: impl Into<String>, from: &[&str], to: &[&str]) -> ForgeResult<Self> {
        let from = self.key_columns(from, "foreign key")?;
        if to.len() != from.len() {
            return Err(ForgeError::invalid(format!(
                "foreign key on '{}' maps {} columns to {}",
                self.name,
                from.len(),
                to.len()
            )));
        }
        let fk = ForeignKey {
            table: table.into(),
            from,
            to: to.iter().map(|c| c.to_string()).collect(),
        };
        if !self.foreign_keys.contains(&fk) {
            self.foreign_keys.push(fk);
        }
        Ok(self)
    }

    fn key_columns(&self, columns: &[&str], what: &str) -> ForgeResult<Vec<String>> {
        if columns.is_empty() {
            return Err(ForgeError::invalid(format!(
                "{what} on '{}' needs at least one column",
                self.name
            )));
        }
        columns
            .iter()
            .map(|c| {
                if self.column_def(c).is_some() {
                    Ok(c.to_string())
                } else {
                    Err(ForgeError::unknown_column(&self.name, *c))
                }
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn column_def(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn primary_key_columns(&self) -> Option<&[String]> {
        self.primary_key.as_deref()
    }

    pub fn unique_keys(&self) -> &[Vec<String>] {
        &self.unique_keys
    }

    pub fn indices(&self) -> &[Vec<String>] {
        &self.indices
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Bind this table to an alias for use in statements.
    pub fn alias(&self, alias: impl Into<String>) -> Aliased {
        Aliased::table(Arc::new(self.clone()), alias)
    }

    /// Structural snapshot of this table.
    pub fn serialize(&self) -> TableSnapshot {
        TableSnapshot {
            name: self.name.clone(),
            columns: self
                .columns
                .iter()
                .map(|(name, col)| (name.clone(), col.serialize()))
                .collect(),
            primary_key: self.primary_key.clone().unwrap_or_default(),
            unique_key: self.unique_keys.clone(),
            indices: self.indices.clone(),
            foreign_keys: self.foreign_keys.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Model {
        Model::new("users")
            .column("id", Column::bigserial().not_null())
            .column("email", Column::varchar(Some(255)).not_null())
            .column("team_id", Column::integer())
    }

    #[test]
    fn second_primary_key_is_rejected() {
        let model = users().primary_key(&["id"]).unwrap();
        let err = model.primary_key(&["email"]).unwrap_err();
        assert!(matches!(err, ForgeError::DuplicatePrimaryKey(ref t) if t == "users"));
    }

    #[test]
    fn keys_must_name_declared_columns() {
        let err = users().unique(&["nope"]).unwrap_err();
        assert!(matches!(err, ForgeError::UnknownColumn { .. }));
        assert!(users().index(&[]).is_err());
        assert!(users().foreign_key("teams", &["team_id"], &["id", "x"]).is_err());
    }

    #[test]
    fn redeclared_column_keeps_position() {
        let model = users().column("id", Column::integer());
        let names: Vec<&str> = model.columns().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["id", "email", "team_id"]);
        assert_eq!(model.column_def("id"), Some(&Column::integer()));
    }

    #[test]
    fn foreign_keys_order_by_local_columns_first() {
        let a = ForeignKey {
            table: "z".into(),
            from: vec!["a".into()],
            to: vec!["id".into()],
        };
        let b = ForeignKey {
            table: "a".into(),
            from: vec!["b".into()],
            to: vec!["id".into()],
        };
        assert!(a < b);
    }

    #[test]
    fn snapshot_carries_keys() {
        let snap = users()
            .primary_key(&["id"])
            .unwrap()
            .unique(&["email"])
            .unwrap()
            .foreign_key("teams", &["team_id"], &["id"])
            .unwrap()
            .serialize();
        assert_eq!(snap.name, "users");
        assert_eq!(snap.primary_key, ["id"]);
        assert_eq!(snap.unique_key, [vec!["email".to_string()]]);
        assert_eq!(snap.foreign_keys.len(), 1);
        assert_eq!(snap.columns.len(), 3);
    }
}
