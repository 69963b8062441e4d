//! WITH clause (common table expressions).

use super::source::{Aliased, CteRef};
use super::{Delete, FromClause, Insert, OutputColumn, Select, Statement, Update};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::RenderContext;
use crate::migrate::naming::quote_ident;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum CteBody {
    Statement(Arc<dyn Statement>),
    Recursive {
        seed: Arc<Select>,
        term: Arc<Select>,
        union_all: bool,
    },
}

#[derive(Debug, Clone)]
struct Cte {
    name: String,
    columns: Vec<OutputColumn>,
    body: CteBody,
}

/// An ordered list of CTE bindings.
///
/// Names are unique within one list. Adding a recursive member marks the
/// whole clause `WITH RECURSIVE`.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct With {
    ctes: Vec<Cte>,
    recursive: bool,
}

impl With {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a statement. The statement must produce columns.
    pub fn with(mut self, name: impl Into<String>, stmt: impl Statement + 'static) -> ForgeResult<Self> {
        let columns = stmt.output().to_vec();
        if columns.is_empty() {
            return Err(ForgeError::invalid(
                "a CTE member must produce columns (add RETURNING to DML)",
            ));
        }
        stmt.validate()?;
        self.push_statement(name.into(), columns, Arc::new(stmt))?;
        Ok(self)
    }

    /// Bind a recursive CTE: `seed UNION [ALL] term`.
    ///
    /// `term` receives a reference to the CTE itself so the recursive member
    /// can select from it. Its projection must match the seed's.
    pub fn recursive<F>(
        mut self,
        name: impl Into<String>,
        seed: Select,
        union_all: bool,
        term: F,
    ) -> ForgeResult<Self>
    where
        F: FnOnce(CteRef) -> ForgeResult<Select>,
    {
        let name = name.into();
        self.ensure_unique(&name)?;
        let columns = seed.output().to_vec();
        let term = term(CteRef::new(name.clone(), columns.clone()))?;
        super::select::check_compatible(&seed, &term)?;
        self.ctes.push(Cte {
            name,
            columns,
            body: CteBody::Recursive {
                seed: Arc::new(seed),
                term: Arc::new(term),
                union_all,
            },
        });
        self.recursive = true;
        Ok(self)
    }

    /// Look up a sibling binding by name.
    pub fn cte(&self, name: &str) -> ForgeResult<CteRef> {
        self.ctes
            .iter()
            .find(|c| c.name == name)
            .map(|c| CteRef::new(c.name.clone(), c.columns.clone()))
            .ok_or_else(|| ForgeError::invalid(format!("no CTE named '{name}'")))
    }

    pub fn from(self, source: Aliased) -> ForgeResult<FromClause> {
        FromClause::new(self, source)
    }

    pub fn insert_into(self, target: Aliased) -> ForgeResult<Insert> {
        Insert::new(self, target)
    }

    pub fn update(self, target: Aliased) -> ForgeResult<Update> {
        Update::new(self, target)
    }

    pub fn delete_from(self, target: Aliased) -> ForgeResult<Delete> {
        Delete::new(self, target)
    }

    pub fn is_empty(&self) -> bool {
        self.ctes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ctes.len()
    }

    fn ensure_unique(&self, name: &str) -> ForgeResult<()> {
        if self.ctes.iter().any(|c| c.name == name) {
            return Err(ForgeError::invalid(format!("duplicate CTE name '{name}'")));
        }
        Ok(())
    }

    pub(crate) fn push_statement(
        &mut self,
        name: String,
        columns: Vec<OutputColumn>,
        stmt: Arc<dyn Statement>,
    ) -> ForgeResult<()> {
        self.ensure_unique(&name)?;
        self.ctes.push(Cte {
            name,
            columns,
            body: CteBody::Statement(stmt),
        });
        Ok(())
    }

    /// Whether any member is an INSERT, UPDATE or DELETE.
    fn has_data_modifying(&self) -> bool {
        self.ctes
            .iter()
            .any(|cte| matches!(&cte.body, CteBody::Statement(stmt) if stmt.is_data_modifying()))
    }

    fn render_members(&self, ctx: &mut RenderContext) -> Vec<String> {
        self.ctes
            .iter()
            .map(|cte| {
                let name = quote_ident(&cte.name);
                match &cte.body {
                    CteBody::Statement(stmt) => format!("{name} AS ({})", stmt.render(ctx)),
                    CteBody::Recursive {
                        seed,
                        term,
                        union_all,
                    } => {
                        let cols: Vec<String> =
                            cte.columns.iter().map(|c| quote_ident(&c.name)).collect();
                        let seed = seed.render(ctx);
                        let term = term.render(ctx);
                        let union = if *union_all { "UNION ALL" } else { "UNION" };
                        format!("{name}({}) AS ({seed} {union} {term})", cols.join(", "))
                    }
                }
            })
            .collect()
    }

    /// Render `WITH ...` followed by the statement body produced by `body`.
    ///
    /// PostgreSQL accepts data-modifying CTEs only in the outermost WITH. A
    /// nested statement whose list holds one hands its whole list to the
    /// outermost statement, which places those members ahead of its own.
    pub(crate) fn render_around(
        &self,
        ctx: &mut RenderContext,
        body: impl FnOnce(&mut RenderContext) -> String,
    ) -> String {
        let outermost = ctx.enter();
        let mut members = self.render_members(ctx);
        let mut recursive = self.recursive;
        let body = body(ctx);
        ctx.leave();

        if outermost {
            let (mut lifted, lifted_recursive) = ctx.take_hoisted();
            lifted.append(&mut members);
            members = lifted;
            recursive |= lifted_recursive;
        } else if self.has_data_modifying() {
            ctx.hoist(members, recursive);
            return body;
        }

        if members.is_empty() {
            return body;
        }
        let keyword = if recursive { "WITH RECURSIVE" } else { "WITH" };
        format!("{keyword} {} {body}", members.join(", "))
    }
}
