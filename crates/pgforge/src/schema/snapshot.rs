//! Persisted schema snapshots.
//!
//! A snapshot is the structural form of a set of models. Migrations are
//! planned by diffing two snapshots, so the previous state can be loaded
//! from disk without the models that produced it.

use super::column::Column;
use super::model::{ForeignKey, Model};
use crate::error::{ForgeError, ForgeResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// Structural form of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub name: String,
    /// Column name to structural record, in declaration order.
    pub columns: Map<String, JsonValue>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique_key: Vec<Vec<String>>,
    #[serde(default)]
    pub indices: Vec<Vec<String>>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSnapshot {
    /// Decode one column record.
    pub fn decode_column(&self, name: &str) -> ForgeResult<Column> {
        let record = self
            .columns
            .get(name)
            .ok_or_else(|| ForgeError::unknown_column(&self.name, name))?;
        Column::deserialize(record).ok_or_else(|| ForgeError::UnknownColumnKind(record.to_string()))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// The primary key as a key list: empty or a single entry.
    pub(crate) fn primary_keys(&self) -> Vec<Vec<String>> {
        if self.primary_key.is_empty() {
            Vec::new()
        } else {
            vec![self.primary_key.clone()]
        }
    }

    fn validate(&self) -> ForgeResult<()> {
        for name in self.columns.keys() {
            self.decode_column(name)?;
        }
        Ok(())
    }
}

/// Structural form of a whole schema, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, TableSnapshot>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models<'a>(models: impl IntoIterator<Item = &'a Model>) -> Self {
        let mut snapshot = Self::new();
        for model in models {
            snapshot.insert(model.serialize());
        }
        snapshot
    }

    /// Add or replace a table.
    pub fn insert(&mut self, table: TableSnapshot) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSnapshot> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn to_json_pretty(&self) -> ForgeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot, rejecting column records no kind accepts.
    pub fn from_json(json: &str) -> ForgeResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        for table in snapshot.tables.values() {
            table.validate()?;
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts() -> Model {
        Model::new("posts")
            .column("id", Column::serial().not_null())
            .column("state", Column::enumeration(["draft", "live"]).not_null())
            .column("body", Column::text())
            .column("author_id", Column::bigint())
            .primary_key(&["id"])
            .unwrap()
            .foreign_key("users", &["author_id"], &["id"])
            .unwrap()
    }

    #[test]
    fn json_round_trip() {
        let snapshot = SchemaSnapshot::from_models([&posts()]);
        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\"primaryKey\""));
        assert!(json.contains("\"foreignKeys\""));
        let back = SchemaSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn column_order_survives_json() {
        let json = SchemaSnapshot::from_models([&posts()]).to_json_pretty().unwrap();
        let back = SchemaSnapshot::from_json(&json).unwrap();
        let names: Vec<&str> = back.table("posts").unwrap().column_names().collect();
        assert_eq!(names, ["id", "state", "body", "author_id"]);
    }

    #[test]
    fn unknown_column_kind_is_rejected() {
        let json = r#"{"t": {"name": "t", "columns": {"a": {"type": "money"}}}}"#;
        let err = SchemaSnapshot::from_json(json).unwrap_err();
        assert!(matches!(err, ForgeError::UnknownColumnKind(_)));
    }

    #[test]
    fn missing_key_lists_default_to_empty() {
        let json = r#"{"t": {"name": "t", "columns": {"a": {"type": "integer"}}}}"#;
        let snapshot = SchemaSnapshot::from_json(json).unwrap();
        let table = snapshot.table("t").unwrap();
        assert!(table.primary_key.is_empty());
        assert!(table.primary_keys().is_empty());
        assert_eq!(table.decode_column("a").unwrap(), Column::integer());
    }
}
