//! Structural diff between two table snapshots.

use crate::schema::{ForeignKey, TableSnapshot};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Classification of one key family (unique keys, indices, foreign keys).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDiff<T> {
    pub added: Vec<T>,
    pub removed: Vec<T>,
    pub unchanged: Vec<T>,
}

impl<T> Default for KeyDiff<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<T> KeyDiff<T> {
    pub fn is_changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Sort both sides and merge-walk them.
///
/// Column order inside one key is significant: `[a, b]` and `[b, a]` are
/// different keys. The order of keys within a list is not.
pub fn diff_keys<T: Ord + Clone>(from: &[T], to: &[T]) -> KeyDiff<T> {
    let mut from = from.to_vec();
    let mut to = to.to_vec();
    from.sort();
    from.dedup();
    to.sort();
    to.dedup();

    let mut diff = KeyDiff::default();
    let (mut i, mut j) = (0, 0);
    while i < from.len() && j < to.len() {
        match from[i].cmp(&to[j]) {
            Ordering::Less => {
                diff.removed.push(from[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                diff.added.push(to[j].clone());
                j += 1;
            }
            Ordering::Equal => {
                diff.unchanged.push(from[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    diff.removed.extend_from_slice(&from[i..]);
    diff.added.extend_from_slice(&to[j..]);
    diff
}

/// Everything that differs between two versions of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDiff {
    pub table: String,
    /// In `from` declaration order.
    pub removed_columns: Vec<String>,
    /// In `to` declaration order.
    pub added_columns: Vec<String>,
    /// Columns present on both sides whose structural records differ.
    pub changed_columns: Vec<String>,
    pub primary_key: KeyDiff<Vec<String>>,
    pub unique_keys: KeyDiff<Vec<String>>,
    pub indices: KeyDiff<Vec<String>>,
    pub foreign_keys: KeyDiff<ForeignKey>,
}

impl TableDiff {
    pub fn is_empty(&self) -> bool {
        self.removed_columns.is_empty()
            && self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && !self.primary_key.is_changed()
            && !self.unique_keys.is_changed()
            && !self.indices.is_changed()
            && !self.foreign_keys.is_changed()
    }

    /// Columns a foreign key must not span while this table migrates:
    /// changed or removed columns and members of removed primary or unique
    /// keys.
    pub fn touched_columns(&self) -> BTreeSet<String> {
        let mut touched: BTreeSet<String> = self
            .changed_columns
            .iter()
            .chain(&self.removed_columns)
            .cloned()
            .collect();
        for key in self.primary_key.removed.iter().chain(&self.unique_keys.removed) {
            touched.extend(key.iter().cloned());
        }
        touched
    }
}

pub fn diff_tables(from: &TableSnapshot, to: &TableSnapshot) -> TableDiff {
    let removed_columns = from
        .column_names()
        .filter(|c| !to.columns.contains_key(*c))
        .map(str::to_string)
        .collect();
    let added_columns = to
        .column_names()
        .filter(|c| !from.columns.contains_key(*c))
        .map(str::to_string)
        .collect();
    let changed_columns = to
        .columns
        .iter()
        .filter(|(name, record)| from.columns.get(*name).is_some_and(|old| old != *record))
        .map(|(name, _)| name.clone())
        .collect();

    TableDiff {
        table: to.name.clone(),
        removed_columns,
        added_columns,
        changed_columns,
        primary_key: diff_keys(&from.primary_keys(), &to.primary_keys()),
        unique_keys: diff_keys(&from.unique_key, &to.unique_key),
        indices: diff_keys(&from.indices, &to.indices),
        foreign_keys: diff_keys(&from.foreign_keys, &to.foreign_keys),
    }
}
