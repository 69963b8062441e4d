//! SQL type tags, runtime values and literal type resolution.

pub mod resolve;
pub mod tag;
pub mod value;

pub use resolve::{Operand, possible_types, unify};
pub use tag::{SqlType, TypeGroup, find_largest_numeric};
pub use value::Value;
