//! Typed expression tree.
//!
//! Every [`Expr`] carries its result [`SqlType`], a groupable flag and a
//! binding precedence. Rendering never mutates the tree; the only side effect
//! is appending parameter slots to the [`RenderContext`].
//!
//! ```ignore
//! use pgforge::prelude::*;
//!
//! let u = users.alias("u");
//! let cond = u.col("age")?.add(1)?.gt(Expr::param("min_age", SqlType::Integer))?;
//! assert_eq!(cond.to_sql(), r#""u"."age" + $1::integer > $2::integer"#);
//! ```

pub mod func;
pub mod ops;
pub mod render;


pub use func::{
    avg, coalesce, count, count_all, count_distinct, exists, lower, max, min, sum, upper,
};
pub use ops::{Assoc, Operator, precedence};
pub use render::{Bindings, Compiled, RenderContext, Slot, params_ref};

use crate::error::{ForgeError, ForgeResult};
use crate::migrate::naming::quote_ident;
use crate::stmt::{Select, Statement};
use crate::types::resolve::{self, Operand};
use crate::types::{SqlType, TypeGroup, Value, find_largest_numeric};
use std::sync::Arc;

/// An immutable, cheaply clonable expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    node: Arc<Node>,
    ty: SqlType,
    groupable: bool,
    precedence: i32,
}

#[derive(Debug)]
enum Node {
    Column {
        source: String,
        name: String,
    },
    Value(Value),
    Param(String),
    Raw(String),
    Binary {
        op: Operator,
        left: Expr,
        right: Expr,
    },
    Prefix {
        op: Operator,
        operand: Expr,
    },
    Postfix {
        op: Operator,
        operand: Expr,
    },
    Between {
        negated: bool,
        operand: Expr,
        low: Expr,
        high: Expr,
    },
    InList {
        negated: bool,
        operand: Expr,
        items: Vec<Expr>,
    },
    InQuery {
        negated: bool,
        operand: Expr,
        query: Arc<Select>,
    },
    Exists(Arc<Select>),
    Function {
        name: &'static str,
        args: Vec<Expr>,
        distinct: bool,
    },
    CountAll,
    Cast {
        operand: Expr,
        to: SqlType,
    },
    Subquery(Arc<Select>),
}

use ops::precedence as p;

impl Expr {
    fn make(node: Node, ty: SqlType, groupable: bool, precedence: i32) -> Self {
        Self {
            node: Arc::new(node),
            ty,
            groupable,
            precedence,
        }
    }

    fn binary(op: Operator, left: Expr, right: Expr, ty: SqlType) -> Self {
        let groupable = left.groupable && right.groupable;
        Self::make(Node::Binary { op, left, right }, ty, groupable, op.precedence)
    }

    fn prefix(op: Operator, operand: Expr, ty: SqlType) -> Self {
        let groupable = operand.groupable;
        Self::make(Node::Prefix { op, operand }, ty, groupable, op.precedence)
    }

    fn postfix(op: Operator, operand: Expr) -> Self {
        let groupable = operand.groupable;
        Self::make(
            Node::Postfix { op, operand },
            SqlType::Boolean,
            groupable,
            op.precedence,
        )
    }

    /// A column of a FROM source, referenced through the source's alias.
    pub(crate) fn column(source: &str, name: &str, ty: SqlType) -> Self {
        Self::make(
            Node::Column {
                source: source.to_string(),
                name: name.to_string(),
            },
            ty,
            false,
            p::ATOM,
        )
    }

    /// A constant leaf, coerced to `ty` and bound as a parameter.
    pub fn value(value: impl Into<Value>, ty: SqlType) -> ForgeResult<Self> {
        let value = value.into().coerce_to(ty)?;
        Ok(Self::make(Node::Value(value), ty, true, p::ATOM))
    }

    /// A named parameter supplied through [`Bindings`] at execution time.
    pub fn param(name: impl Into<String>, ty: SqlType) -> Self {
        Self::make(Node::Param(name.into()), ty, true, p::ATOM)
    }

    /// A raw SQL fragment of the given type. Always parenthesized as an operand.
    pub fn raw(sql: impl Into<String>, ty: SqlType) -> Self {
        Self::make(Node::Raw(sql.into()), ty, false, p::FORCED)
    }

    fn constant_bool(value: bool, groupable: bool) -> Self {
        let sql = if value { "TRUE" } else { "FALSE" };
        Self::make(
            Node::Raw(sql.to_string()),
            SqlType::Boolean,
            groupable,
            p::ATOM,
        )
    }

    /// A scalar subquery. The query must project exactly one column.
    pub fn subquery(query: Select) -> ForgeResult<Self> {
        let ty = single_output(&query)?;
        Ok(Self::make(
            Node::Subquery(Arc::new(query)),
            ty,
            true,
            p::ATOM,
        ))
    }

    pub fn ty(&self) -> SqlType {
        self.ty
    }

    pub fn is_groupable(&self) -> bool {
        self.groupable
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    /// Mark this expression as a GROUP BY key.
    pub(crate) fn as_group_key(&self) -> Self {
        Self {
            groupable: true,
            ..self.clone()
        }
    }

    /// An aggregate call. Groupable regardless of its arguments.
    fn aggregate(name: &'static str, args: Vec<Expr>, distinct: bool, ty: SqlType) -> Self {
        Self::make(Node::Function { name, args, distinct }, ty, true, p::ATOM)
    }

    fn function(name: &'static str, args: Vec<Expr>, ty: SqlType) -> Self {
        let groupable = args.iter().all(|a| a.groupable);
        Self::make(
            Node::Function {
                name,
                args,
                distinct: false,
            },
            ty,
            groupable,
            p::ATOM,
        )
    }

    fn count_all() -> Self {
        Self::make(Node::CountAll, SqlType::Bigint, true, p::ATOM)
    }

    // ==================== Rendering ====================

    /// Render to SQL text, appending parameter slots to `ctx`.
    pub fn render(&self, ctx: &mut RenderContext) -> String {
        match &*self.node {
            Node::Column { source, name } => format!("{}.{}", quote_ident(source), quote_ident(name)),
            Node::Value(value) => {
                let node = Arc::as_ptr(&self.node) as usize;
                let idx = ctx.constant(node, value, self.ty);
                placeholder(idx, self.ty)
            }
            Node::Param(name) => {
                let idx = ctx.named(name, self.ty);
                placeholder(idx, self.ty)
            }
            Node::Raw(sql) => sql.clone(),
            Node::Binary { op, left, right } => {
                let l = left.render_child(ctx, op.precedence, op.left_strict());
                let r = right.render_child(ctx, op.precedence, op.right_strict());
                format!("{l} {} {r}", op.token)
            }
            Node::Prefix { op, operand } => {
                let inner = operand.render_child(ctx, op.precedence, op.left_strict());
                if op.token.chars().all(char::is_alphabetic) {
                    format!("{} {inner}", op.token)
                } else {
                    format!("{}{inner}", op.token)
                }
            }
            Node::Postfix { op, operand } => {
                let inner = operand.render_child(ctx, op.precedence, op.left_strict());
                format!("{inner} {}", op.token)
            }
            Node::Between {
                negated,
                operand,
                low,
                high,
            } => {
                let x = operand.render_child(ctx, p::BETWEEN, true);
                let lo = low.render_child(ctx, p::BETWEEN, true);
                let hi = high.render_child(ctx, p::BETWEEN, true);
                let not = if *negated { "NOT " } else { "" };
                format!("{x} {not}BETWEEN {lo} AND {hi}")
            }
            Node::InList {
                negated,
                operand,
                items,
            } => {
                let x = operand.render_child(ctx, p::BETWEEN, true);
                let items: Vec<String> = items
                    .iter()
                    .map(|i| i.render_child(ctx, p::STATEMENT, false))
                    .collect();
                let not = if *negated { "NOT " } else { "" };
                format!("{x} {not}IN ({})", items.join(", "))
            }
            Node::InQuery {
                negated,
                operand,
                query,
            } => {
                let x = operand.render_child(ctx, p::BETWEEN, true);
                let not = if *negated { "NOT " } else { "" };
                format!("{x} {not}IN ({})", query.render(ctx))
            }
            Node::Exists(query) => format!("EXISTS ({})", query.render(ctx)),
            Node::Function {
                name,
                args,
                distinct,
            } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|a| a.render_child(ctx, p::STATEMENT, false))
                    .collect();
                let distinct = if *distinct { "DISTINCT " } else { "" };
                format!("{name}({distinct}{})", args.join(", "))
            }
            Node::CountAll => "count(*)".to_string(),
            Node::Cast { operand, to } => {
                let inner = operand.render_child(ctx, p::STATEMENT, false);
                format!("CAST({inner} AS {})", to.pg_cast().unwrap_or_default())
            }
            Node::Subquery(query) => format!("({})", query.render(ctx)),
        }
    }

    /// Render as the operand of a construct binding at `min`.
    pub(crate) fn render_child(&self, ctx: &mut RenderContext, min: i32, strict: bool) -> String {
        let sql = self.render(ctx);
        if self.precedence < min || (strict && self.precedence == min) {
            format!("({sql})")
        } else {
            sql
        }
    }

    /// Render with a fresh context. Debug helper.
    pub fn to_sql(&self) -> String {
        self.render(&mut RenderContext::new())
    }

    // ==================== Arithmetic ====================

    fn arithmetic(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::NUMERIC, self, rhs)?;
        resolve::require_group(l.ty, TypeGroup::Numeric)?;
        resolve::require_group(r.ty, TypeGroup::Numeric)?;
        let ty = find_largest_numeric(l.ty, r.ty);
        Ok(Expr::binary(op, l, r, ty))
    }

    pub fn add(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.arithmetic(ops::ADD, rhs.into())
    }

    pub fn sub(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.arithmetic(ops::SUB, rhs.into())
    }

    pub fn mul(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.arithmetic(ops::MUL, rhs.into())
    }

    pub fn div(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.arithmetic(ops::DIV, rhs.into())
    }

    pub fn rem(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.arithmetic(ops::REM, rhs.into())
    }

    /// Exponentiation. The server computes `^` in double precision unless an
    /// operand is numeric.
    pub fn pow(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::NUMERIC, self, rhs)?;
        resolve::require_group(l.ty, TypeGroup::Numeric)?;
        resolve::require_group(r.ty, TypeGroup::Numeric)?;
        let ty = if l.ty == SqlType::Numeric || r.ty == SqlType::Numeric {
            SqlType::Numeric
        } else {
            SqlType::Double
        };
        Ok(Expr::binary(ops::POW, l, r, ty))
    }

    // ==================== Comparison ====================

    fn compare(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::ALL, self, rhs)?;
        resolve::require_same_group(l.ty, r.ty)?;
        Ok(Expr::binary(op, l, r, SqlType::Boolean))
    }

    pub fn eq(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::EQ, rhs.into())
    }

    pub fn ne(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::NE, rhs.into())
    }

    pub fn lt(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::LT, rhs.into())
    }

    pub fn lte(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::LTE, rhs.into())
    }

    pub fn gt(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::GT, rhs.into())
    }

    pub fn gte(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::GTE, rhs.into())
    }

    pub fn is_distinct_from(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::IS_DISTINCT_FROM, rhs.into())
    }

    pub fn is_not_distinct_from(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.compare(ops::IS_NOT_DISTINCT_FROM, rhs.into())
    }

    fn pattern(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::TEXTUAL, self, rhs)?;
        resolve::require_one_of(l.ty, &SqlType::TEXTUAL)?;
        resolve::require_one_of(r.ty, &SqlType::TEXTUAL)?;
        Ok(Expr::binary(op, l, r, SqlType::Boolean))
    }

    pub fn like(&self, pattern: impl Into<Operand>) -> ForgeResult<Expr> {
        self.pattern(ops::LIKE, pattern.into())
    }

    pub fn not_like(&self, pattern: impl Into<Operand>) -> ForgeResult<Expr> {
        self.pattern(ops::NOT_LIKE, pattern.into())
    }

    pub fn ilike(&self, pattern: impl Into<Operand>) -> ForgeResult<Expr> {
        self.pattern(ops::ILIKE, pattern.into())
    }

    /// Text concatenation (`||`).
    pub fn concat(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::TEXTUAL, self, rhs)?;
        resolve::require_one_of(l.ty, &SqlType::TEXTUAL)?;
        resolve::require_one_of(r.ty, &SqlType::TEXTUAL)?;
        Ok(Expr::binary(ops::CONCAT, l, r, SqlType::Text))
    }

    // ==================== IS-family ====================

    pub fn is_null(&self) -> Expr {
        Expr::postfix(ops::IS_NULL, self.clone())
    }

    pub fn is_not_null(&self) -> Expr {
        Expr::postfix(ops::IS_NOT_NULL, self.clone())
    }

    fn boolean_postfix(&self, op: Operator) -> ForgeResult<Expr> {
        resolve::require_group(self.ty, TypeGroup::Boolean)?;
        Ok(Expr::postfix(op, self.clone()))
    }

    pub fn is_true(&self) -> ForgeResult<Expr> {
        self.boolean_postfix(ops::IS_TRUE)
    }

    pub fn is_not_true(&self) -> ForgeResult<Expr> {
        self.boolean_postfix(ops::IS_NOT_TRUE)
    }

    pub fn is_false(&self) -> ForgeResult<Expr> {
        self.boolean_postfix(ops::IS_FALSE)
    }

    pub fn is_not_false(&self) -> ForgeResult<Expr> {
        self.boolean_postfix(ops::IS_NOT_FALSE)
    }

    // ==================== BETWEEN / IN ====================

    fn between_inner(
        &self,
        negated: bool,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> ForgeResult<Expr> {
        let mut exprs =
            resolve::resolve_list(&SqlType::ALL, vec![self.into(), low.into(), high.into()])?;
        let (high, low, operand) = match (exprs.pop(), exprs.pop(), exprs.pop()) {
            (Some(h), Some(l), Some(o)) => (h, l, o),
            _ => return Err(ForgeError::invalid("BETWEEN requires three operands")),
        };
        let groupable = operand.groupable && low.groupable && high.groupable;
        Ok(Expr::make(
            Node::Between {
                negated,
                operand,
                low,
                high,
            },
            SqlType::Boolean,
            groupable,
            p::BETWEEN,
        ))
    }

    pub fn between(&self, low: impl Into<Operand>, high: impl Into<Operand>) -> ForgeResult<Expr> {
        self.between_inner(false, low, high)
    }

    pub fn not_between(
        &self,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> ForgeResult<Expr> {
        self.between_inner(true, low, high)
    }

    fn in_list_inner<I, T>(&self, negated: bool, items: I) -> ForgeResult<Expr>
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        let mut operands: Vec<Operand> = vec![self.into()];
        operands.extend(items.into_iter().map(Into::into));
        if operands.len() == 1 {
            // x IN () is not valid SQL
            return Ok(Expr::constant_bool(negated, self.groupable));
        }
        let mut exprs = resolve::resolve_list(&SqlType::ALL, operands)?;
        let operand = exprs.remove(0);
        let groupable = operand.groupable && exprs.iter().all(|e| e.groupable);
        Ok(Expr::make(
            Node::InList {
                negated,
                operand,
                items: exprs,
            },
            SqlType::Boolean,
            groupable,
            p::BETWEEN,
        ))
    }

    pub fn in_list<I, T>(&self, items: I) -> ForgeResult<Expr>
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        self.in_list_inner(false, items)
    }

    pub fn not_in_list<I, T>(&self, items: I) -> ForgeResult<Expr>
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        self.in_list_inner(true, items)
    }

    fn in_query_inner(&self, negated: bool, query: Select) -> ForgeResult<Expr> {
        let ty = single_output(&query)?;
        resolve::require_same_group(self.ty, ty)?;
        Ok(Expr::make(
            Node::InQuery {
                negated,
                operand: self.clone(),
                query: Arc::new(query),
            },
            SqlType::Boolean,
            self.groupable,
            p::BETWEEN,
        ))
    }

    pub fn in_query(&self, query: Select) -> ForgeResult<Expr> {
        self.in_query_inner(false, query)
    }

    pub fn not_in_query(&self, query: Select) -> ForgeResult<Expr> {
        self.in_query_inner(true, query)
    }

    // ==================== Bitwise ====================

    fn bitwise(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&SqlType::BITWISE, self, rhs)?;
        resolve::require_one_of(l.ty, &SqlType::BITWISE)?;
        resolve::require_one_of(r.ty, &SqlType::BITWISE)?;
        resolve::require_same_group(l.ty, r.ty)?;
        let ty = if l.ty == SqlType::Bit {
            SqlType::Bit
        } else {
            find_largest_numeric(l.ty, r.ty)
        };
        Ok(Expr::binary(op, l, r, ty))
    }

    pub fn bit_and(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.bitwise(ops::BIT_AND, rhs.into())
    }

    pub fn bit_or(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.bitwise(ops::BIT_OR, rhs.into())
    }

    pub fn bit_xor(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.bitwise(ops::BIT_XOR, rhs.into())
    }

    fn shift(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        resolve::require_one_of(self.ty, &SqlType::BITWISE)?;
        let r = resolve::resolve_against(rhs, SqlType::Integer)?;
        resolve::require_one_of(r.ty, &[SqlType::Smallint, SqlType::Integer, SqlType::Bigint])?;
        Ok(Expr::binary(op, self.clone(), r, self.ty))
    }

    pub fn shl(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.shift(ops::SHL, rhs.into())
    }

    pub fn shr(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.shift(ops::SHR, rhs.into())
    }

    pub fn bit_not(&self) -> ForgeResult<Expr> {
        resolve::require_one_of(self.ty, &SqlType::BITWISE)?;
        Ok(Expr::prefix(ops::BIT_NOT, self.clone(), self.ty))
    }

    // ==================== Logic ====================

    fn logic(&self, op: Operator, rhs: Operand) -> ForgeResult<Expr> {
        let (l, r) = resolve::resolve_pair(&[SqlType::Boolean], self, rhs)?;
        resolve::require_group(l.ty, TypeGroup::Boolean)?;
        resolve::require_group(r.ty, TypeGroup::Boolean)?;
        Ok(Expr::binary(op, l, r, SqlType::Boolean))
    }

    pub fn and(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.logic(ops::AND, rhs.into())
    }

    pub fn or(&self, rhs: impl Into<Operand>) -> ForgeResult<Expr> {
        self.logic(ops::OR, rhs.into())
    }

    pub fn not(&self) -> ForgeResult<Expr> {
        resolve::require_group(self.ty, TypeGroup::Boolean)?;
        Ok(Expr::prefix(ops::NOT, self.clone(), SqlType::Boolean))
    }

    /// `CAST(x AS ty)`. Enum values have no server-side type of their own, so
    /// a cast to [`SqlType::Enum`] is rejected; cast to text instead.
    pub fn cast(&self, to: SqlType) -> ForgeResult<Expr> {
        if to.pg_cast().is_none() {
            return Err(ForgeError::invalid(format!("cannot CAST to {to}")));
        }
        Ok(Expr::make(
            Node::Cast {
                operand: self.clone(),
                to,
            },
            to,
            self.groupable,
            p::ATOM,
        ))
    }
}

fn placeholder(idx: usize, ty: SqlType) -> String {
    match ty.pg_cast() {
        Some(cast) => format!("${idx}::{cast}"),
        None => format!("${idx}"),
    }
}

fn single_output(query: &Select) -> ForgeResult<SqlType> {
    match query.output() {
        [only] => Ok(only.ty),
        cols => Err(ForgeError::invalid(format!(
            "subquery must project exactly one column, found {}",
            cols.len()
        ))),
    }
}
