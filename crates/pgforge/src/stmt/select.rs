//! SELECT pipeline: FROM → WHERE → [GROUP BY → HAVING] → SELECT → ORDER BY → LIMIT/OFFSET.

use super::source::{Aliased, Source};
use super::{OutputColumn, Statement, With, and_condition, require_condition};
use crate::error::{ForgeError, ForgeResult};
use crate::expr::{Expr, RenderContext, precedence};
use crate::migrate::naming::quote_ident;
use std::sync::Arc;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn keyword(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Set operation combining two projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOp {
    fn keyword(self) -> &'static str {
        match self {
            SetOp::Union => "UNION",
            SetOp::UnionAll => "UNION ALL",
            SetOp::Intersect => "INTERSECT",
            SetOp::IntersectAll => "INTERSECT ALL",
            SetOp::Except => "EXCEPT",
            SetOp::ExceptAll => "EXCEPT ALL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    source: Aliased,
    on: Expr,
}

#[derive(Debug, Clone)]
struct FromList {
    source: Aliased,
    joins: Vec<Join>,
    where_: Option<Expr>,
}

impl FromList {
    fn render(&self, ctx: &mut RenderContext) -> String {
        let mut sql = format!(" FROM {}", self.source.render_from(ctx));
        for join in &self.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            let source = join.source.render_from(ctx);
            let on = join.on.render(ctx);
            sql.push_str(&format!(" {keyword} {source} ON {on}"));
        }
        if let Some(cond) = &self.where_ {
            sql.push_str(" WHERE ");
            sql.push_str(&cond.render(ctx));
        }
        sql
    }
}

/// SELECT pipeline after FROM: joins and WHERE conditions.
#[derive(Debug, Clone)]
#[must_use]
pub struct FromClause {
    with: With,
    from: FromList,
}

impl FromClause {
    pub(crate) fn new(mut with: With, source: Aliased) -> ForgeResult<Self> {
        let source = source.adopt(&mut with)?;
        Ok(Self {
            with,
            from: FromList {
                source,
                joins: Vec::new(),
                where_: None,
            },
        })
    }

    fn push_join(mut self, kind: JoinKind, source: Aliased, on: Expr) -> ForgeResult<Self> {
        require_condition(&on, "ON")?;
        let source = source.adopt(&mut self.with)?;
        self.from.joins.push(Join { kind, source, on });
        Ok(self)
    }

    /// `INNER JOIN source ON on`.
    pub fn join(self, source: Aliased, on: Expr) -> ForgeResult<Self> {
        self.push_join(JoinKind::Inner, source, on)
    }

    /// `LEFT JOIN source ON on`.
    pub fn left_join(self, source: Aliased, on: Expr) -> ForgeResult<Self> {
        self.push_join(JoinKind::Left, source, on)
    }

    /// Add a WHERE condition. Repeated calls are ANDed.
    pub fn where_(mut self, cond: Expr) -> ForgeResult<Self> {
        require_condition(&cond, "WHERE")?;
        self.from.where_ = Some(and_condition(self.from.where_.take(), cond)?);
        Ok(self)
    }

    /// Enter the grouped state. At least one key is required.
    pub fn group_by(self, keys: impl IntoIterator<Item = Expr>) -> ForgeResult<Grouped> {
        let keys: Vec<Expr> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(ForgeError::invalid("GROUP BY requires at least one key"));
        }
        Ok(Grouped {
            from: self,
            keys,
            having: None,
        })
    }

    /// Project named columns.
    pub fn select<N, I>(self, columns: I) -> ForgeResult<Select>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Expr)>,
    {
        Select::simple(self.with, self.from, projection(columns)?, Vec::new(), None)
    }
}

/// SELECT pipeline after GROUP BY.
#[derive(Debug, Clone)]
#[must_use]
pub struct Grouped {
    from: FromClause,
    keys: Vec<Expr>,
    having: Option<Expr>,
}

impl Grouped {
    /// The `idx`-th GROUP BY key, usable in the projection, HAVING and ORDER BY.
    pub fn key(&self, idx: usize) -> ForgeResult<Expr> {
        self.keys
            .get(idx)
            .map(Expr::as_group_key)
            .ok_or_else(|| ForgeError::invalid(format!("no GROUP BY key at index {idx}")))
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Add a HAVING condition. Repeated calls are ANDed.
    pub fn having(mut self, cond: Expr) -> ForgeResult<Self> {
        require_condition(&cond, "HAVING")?;
        require_groupable("HAVING", &cond)?;
        self.having = Some(and_condition(self.having.take(), cond)?);
        Ok(self)
    }

    /// Project named columns. Every expression must be groupable.
    pub fn select<N, I>(self, columns: I) -> ForgeResult<Select>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Expr)>,
    {
        let columns = projection(columns)?;
        for (name, expr) in &columns {
            require_groupable(name, expr)?;
        }
        let FromClause { with, from } = self.from;
        Select::simple(with, from, columns, self.keys, self.having)
    }
}

fn require_groupable(what: &str, expr: &Expr) -> ForgeResult<()> {
    if expr.is_groupable() {
        Ok(())
    } else {
        Err(ForgeError::NotGroupable(format!("{what}: {}", expr.to_sql())))
    }
}

fn projection<N, I>(columns: I) -> ForgeResult<Vec<(String, Expr)>>
where
    N: Into<String>,
    I: IntoIterator<Item = (N, Expr)>,
{
    let columns: Vec<(String, Expr)> = columns.into_iter().map(|(n, e)| (n.into(), e)).collect();
    if columns.is_empty() {
        return Err(ForgeError::EmptyProjection);
    }
    for (i, (name, _)) in columns.iter().enumerate() {
        if columns[..i].iter().any(|(n, _)| n == name) {
            return Err(ForgeError::invalid(format!(
                "duplicate output column '{name}'"
            )));
        }
    }
    Ok(columns)
}

#[derive(Debug, Clone)]
enum Body {
    Query {
        distinct: bool,
        projection: Vec<(String, Expr)>,
        from: FromList,
        group_by: Vec<Expr>,
        having: Option<Expr>,
    },
    Compound {
        op: SetOp,
        left: Box<Select>,
        right: Box<Select>,
    },
}

/// A complete SELECT statement.
#[derive(Debug, Clone)]
#[must_use]
pub struct Select {
    with: With,
    body: Body,
    output: Vec<OutputColumn>,
    order_by: Vec<(Expr, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    grouped: bool,
}

impl Select {
    fn simple(
        with: With,
        from: FromList,
        projection: Vec<(String, Expr)>,
        group_by: Vec<Expr>,
        having: Option<Expr>,
    ) -> ForgeResult<Self> {
        let output = projection
            .iter()
            .map(|(name, expr)| OutputColumn::new(name.clone(), expr.ty()))
            .collect();
        let grouped = !group_by.is_empty();
        Ok(Self {
            with,
            body: Body::Query {
                distinct: false,
                projection,
                from,
                group_by,
                having,
            },
            output,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            grouped,
        })
    }

    /// `SELECT DISTINCT`. Has no effect on a set operation.
    pub fn distinct(mut self) -> Self {
        if let Body::Query { distinct, .. } = &mut self.body {
            *distinct = true;
        }
        self
    }

    /// Append an ORDER BY term. Under GROUP BY the term must be groupable.
    pub fn order_by(mut self, expr: Expr, order: Order) -> ForgeResult<Self> {
        if self.grouped {
            require_groupable("ORDER BY", &expr)?;
        }
        self.order_by.push((expr, order));
        Ok(self)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Use this query as an aliased FROM source.
    pub fn alias(self, alias: impl Into<String>) -> Aliased {
        let columns = self.output.clone();
        Aliased::new(alias, Source::Subquery(Arc::new(self)), columns)
    }

    fn combine(mut self, op: SetOp, mut other: Select) -> ForgeResult<Select> {
        check_compatible(&self, &other)?;
        let with = std::mem::take(&mut self.with);
        // only the left side's bindings survive
        other.with = With::new();
        let output = self.output.clone();
        Ok(Select {
            with,
            body: Body::Compound {
                op,
                left: Box::new(self),
                right: Box::new(other),
            },
            output,
            order_by: Vec::new(),
            limit: None,
            offset: None,
            grouped: false,
        })
    }

    pub fn union(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::Union, other)
    }

    pub fn union_all(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::UnionAll, other)
    }

    pub fn intersect(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::Intersect, other)
    }

    pub fn intersect_all(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::IntersectAll, other)
    }

    pub fn except(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::Except, other)
    }

    pub fn except_all(self, other: Select) -> ForgeResult<Select> {
        self.combine(SetOp::ExceptAll, other)
    }
}

/// Two projections can be combined when arity and per-column groups match.
pub(crate) fn check_compatible(left: &Select, right: &Select) -> ForgeResult<()> {
    if left.output.len() != right.output.len() {
        return Err(ForgeError::invalid(format!(
            "set operation arity mismatch: {} vs {} columns",
            left.output.len(),
            right.output.len()
        )));
    }
    for (l, r) in left.output.iter().zip(&right.output) {
        if l.ty.group() != r.ty.group() {
            return Err(ForgeError::type_mismatch(
                format!("{} for column '{}'", l.ty, l.name),
                r.ty.name(),
            ));
        }
    }
    Ok(())
}

impl Select {
    fn render_body(&self, ctx: &mut RenderContext) -> String {
        let mut sql = String::new();
        match &self.body {
            Body::Query {
                distinct,
                projection,
                from,
                group_by,
                having,
            } => {
                sql.push_str("SELECT ");
                if *distinct {
                    sql.push_str("DISTINCT ");
                }
                let cols: Vec<String> = projection
                    .iter()
                    .map(|(name, expr)| {
                        format!(
                            "{} AS {}",
                            expr.render_child(ctx, precedence::STATEMENT, false),
                            quote_ident(name)
                        )
                    })
                    .collect();
                sql.push_str(&cols.join(", "));
                sql.push_str(&from.render(ctx));
                if !group_by.is_empty() {
                    let keys: Vec<String> = group_by
                        .iter()
                        .map(|k| k.render_child(ctx, precedence::STATEMENT, false))
                        .collect();
                    sql.push_str(" GROUP BY ");
                    sql.push_str(&keys.join(", "));
                }
                if let Some(cond) = having {
                    sql.push_str(" HAVING ");
                    sql.push_str(&cond.render(ctx));
                }
            }
            Body::Compound { op, left, right } => {
                let l = left.render(ctx);
                let r = right.render(ctx);
                sql.push_str(&format!("({l}) {} ({r})", op.keyword()));
            }
        }
        if !self.order_by.is_empty() {
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(expr, order)| {
                    format!(
                        "{} {}",
                        expr.render_child(ctx, precedence::STATEMENT, false),
                        order.keyword()
                    )
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        if let Some(n) = self.offset {
            sql.push_str(&format!(" OFFSET {n}"));
        }
        sql
    }
}

impl Statement for Select {
    fn render(&self, ctx: &mut RenderContext) -> String {
        self.with.render_around(ctx, |ctx| self.render_body(ctx))
    }

    fn output(&self) -> &[OutputColumn] {
        &self.output
    }
}
