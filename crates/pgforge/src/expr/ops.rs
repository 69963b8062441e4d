//! Operator table and binding precedence.

/// Binding precedence levels. Higher binds tighter.
pub mod precedence {
    /// Literal, parameter, column reference, parenthesized or function call.
    pub const ATOM: i32 = 99;
    pub const EXPONENT: i32 = 10;
    pub const MULTIPLICATIVE: i32 = 9;
    pub const ADDITIVE: i32 = 8;
    /// Bitwise, shift and concatenation operators.
    pub const BITWISE: i32 = 7;
    /// Prefix bit complement.
    pub const UNARY: i32 = 7;
    pub const BETWEEN: i32 = 6;
    pub const COMPARISON: i32 = 5;
    /// `IS NULL`, `IS TRUE`, `IS DISTINCT FROM` and friends.
    pub const IS: i32 = 4;
    pub const NOT: i32 = 3;
    pub const AND: i32 = 2;
    pub const OR: i32 = 1;
    /// A complete statement.
    pub const STATEMENT: i32 = -1;
    /// Always parenthesized when used as an operand (subqueries, raw SQL).
    pub const FORCED: i32 = -99;
}

/// Which operand positions tolerate a child of equal precedence unwrapped.
///
/// A child is wrapped in parentheses when its precedence is below the
/// operator's; on a strict side it is wrapped at equal precedence too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Fully associative: neither side is strict (`AND`, `||`).
    Both,
    /// Left-associative: the right side is strict (`-`, `/`).
    Left,
    /// Inverse flag for right-binding prefix operators: the operand is not
    /// strict, so `NOT NOT x` and `~ ~x` render without parentheses.
    Right,
    /// Non-associative: both sides are strict (comparisons).
    None,
}

/// A SQL operator token with its fixed precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub token: &'static str,
    pub precedence: i32,
    pub assoc: Assoc,
}

impl Operator {
    pub const fn new(token: &'static str, precedence: i32, assoc: Assoc) -> Self {
        Self {
            token,
            precedence,
            assoc,
        }
    }

    /// Whether the left (or only) operand wraps at equal precedence.
    pub fn left_strict(&self) -> bool {
        matches!(self.assoc, Assoc::None)
    }

    /// Whether the right operand wraps at equal precedence.
    pub fn right_strict(&self) -> bool {
        matches!(self.assoc, Assoc::Left | Assoc::None)
    }
}

use precedence as p;

pub const POW: Operator = Operator::new("^", p::EXPONENT, Assoc::Left);
pub const MUL: Operator = Operator::new("*", p::MULTIPLICATIVE, Assoc::Left);
pub const DIV: Operator = Operator::new("/", p::MULTIPLICATIVE, Assoc::Left);
pub const REM: Operator = Operator::new("%", p::MULTIPLICATIVE, Assoc::Left);
pub const ADD: Operator = Operator::new("+", p::ADDITIVE, Assoc::Left);
pub const SUB: Operator = Operator::new("-", p::ADDITIVE, Assoc::Left);

pub const BIT_AND: Operator = Operator::new("&", p::BITWISE, Assoc::Both);
pub const BIT_OR: Operator = Operator::new("|", p::BITWISE, Assoc::Both);
pub const BIT_XOR: Operator = Operator::new("#", p::BITWISE, Assoc::Both);
pub const SHL: Operator = Operator::new("<<", p::BITWISE, Assoc::Left);
pub const SHR: Operator = Operator::new(">>", p::BITWISE, Assoc::Left);
pub const CONCAT: Operator = Operator::new("||", p::BITWISE, Assoc::Both);
pub const BIT_NOT: Operator = Operator::new("~", p::UNARY, Assoc::Right);

pub const EQ: Operator = Operator::new("=", p::COMPARISON, Assoc::None);
pub const NE: Operator = Operator::new("<>", p::COMPARISON, Assoc::None);
pub const LT: Operator = Operator::new("<", p::COMPARISON, Assoc::None);
pub const LTE: Operator = Operator::new("<=", p::COMPARISON, Assoc::None);
pub const GT: Operator = Operator::new(">", p::COMPARISON, Assoc::None);
pub const GTE: Operator = Operator::new(">=", p::COMPARISON, Assoc::None);
pub const LIKE: Operator = Operator::new("LIKE", p::BETWEEN, Assoc::None);
pub const NOT_LIKE: Operator = Operator::new("NOT LIKE", p::BETWEEN, Assoc::None);
pub const ILIKE: Operator = Operator::new("ILIKE", p::BETWEEN, Assoc::None);

pub const IS_DISTINCT_FROM: Operator = Operator::new("IS DISTINCT FROM", p::IS, Assoc::None);
pub const IS_NOT_DISTINCT_FROM: Operator =
    Operator::new("IS NOT DISTINCT FROM", p::IS, Assoc::None);
pub const IS_NULL: Operator = Operator::new("IS NULL", p::IS, Assoc::Left);
pub const IS_NOT_NULL: Operator = Operator::new("IS NOT NULL", p::IS, Assoc::Left);
pub const IS_TRUE: Operator = Operator::new("IS TRUE", p::IS, Assoc::Left);
pub const IS_NOT_TRUE: Operator = Operator::new("IS NOT TRUE", p::IS, Assoc::Left);
pub const IS_FALSE: Operator = Operator::new("IS FALSE", p::IS, Assoc::Left);
pub const IS_NOT_FALSE: Operator = Operator::new("IS NOT FALSE", p::IS, Assoc::Left);

pub const NOT: Operator = Operator::new("NOT", p::NOT, Assoc::Right);
pub const AND: Operator = Operator::new("AND", p::AND, Assoc::Both);
pub const OR: Operator = Operator::new("OR", p::OR, Assoc::Both);
