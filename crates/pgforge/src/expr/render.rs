//! Parameter accumulation and binding.
//!
//! Placeholders are numbered while rendering, never by rewriting SQL text.
//! A constant node takes one slot the first time it is rendered and reuses it
//! when the same node is rendered again (a GROUP BY key repeated in the
//! projection must produce identical text). Named parameters take a slot on
//! first sight and reuse it afterwards.

use crate::error::{ForgeError, ForgeResult};
use crate::types::{SqlType, Value};
use std::collections::{BTreeMap, HashMap};
use tokio_postgres::types::ToSql;

/// One positional parameter of a rendered statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// A literal captured at construction time.
    Constant { value: Value, ty: SqlType },
    /// A named parameter supplied at execution time.
    Named { name: String, ty: SqlType },
}

impl Slot {
    pub fn ty(&self) -> SqlType {
        match self {
            Slot::Constant { ty, .. } | Slot::Named { ty, .. } => *ty,
        }
    }
}

/// Parameter accumulator for a single render call.
#[derive(Debug, Default)]
pub struct RenderContext {
    slots: Vec<Slot>,
    named: HashMap<String, usize>,
    constants: HashMap<usize, usize>,
    depth: usize,
    hoisted: Vec<String>,
    hoisted_recursive: bool,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constant and return its 1-based index.
    pub fn push_constant(&mut self, value: Value, ty: SqlType) -> usize {
        self.slots.push(Slot::Constant { value, ty });
        self.slots.len()
    }

    /// Return the index for the constant node identified by `node`,
    /// allocating one the first time the node is rendered.
    pub fn constant(&mut self, node: usize, value: &Value, ty: SqlType) -> usize {
        if let Some(&idx) = self.constants.get(&node) {
            return idx;
        }
        let idx = self.push_constant(value.clone(), ty);
        self.constants.insert(node, idx);
        idx
    }

    /// Return the index for `name`, allocating one the first time it is seen.
    pub fn named(&mut self, name: &str, ty: SqlType) -> usize {
        if let Some(&idx) = self.named.get(name) {
            return idx;
        }
        self.slots.push(Slot::Named {
            name: name.to_string(),
            ty,
        });
        let idx = self.slots.len();
        self.named.insert(name.to_string(), idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn into_slots(self) -> Vec<Slot> {
        self.slots
    }

    /// Enter a statement. Returns whether it is the outermost one.
    pub(crate) fn enter(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Queue rendered WITH members for the outermost statement.
    pub(crate) fn hoist(&mut self, members: Vec<String>, recursive: bool) {
        self.hoisted.extend(members);
        self.hoisted_recursive |= recursive;
    }

    pub(crate) fn take_hoisted(&mut self) -> (Vec<String>, bool) {
        let recursive = std::mem::take(&mut self.hoisted_recursive);
        (std::mem::take(&mut self.hoisted), recursive)
    }
}

/// Runtime values for named parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, Value>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`, replacing any previous binding.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A rendered statement: SQL text plus its positional parameter slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    sql: String,
    slots: Vec<Slot>,
}

impl Compiled {
    pub fn new(sql: String, ctx: RenderContext) -> Self {
        Self {
            sql,
            slots: ctx.into_slots(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Named parameters in slot order.
    pub fn param_names(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter_map(|s| match s {
                Slot::Named { name, .. } => Some(name.as_str()),
                Slot::Constant { .. } => None,
            })
            .collect()
    }

    /// Produce the positional argument list, one value per slot.
    pub fn bind(&self, bindings: &Bindings) -> ForgeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            match slot {
                Slot::Constant { value, .. } => values.push(value.clone()),
                Slot::Named { name, ty } => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| ForgeError::MissingParam(name.clone()))?;
                    values.push(value.coerce_to(*ty)?);
                }
            }
        }

        let referenced = self.param_names();
        if let Some(extra) = bindings.names().find(|n| !referenced.contains(n)) {
            return Err(ForgeError::UnexpectedParam(extra.to_string()));
        }
        Ok(values)
    }
}

/// Borrow bound values in the form `tokio-postgres` expects.
pub fn params_ref(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}
