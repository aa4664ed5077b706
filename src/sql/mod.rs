//! SQL model module.
//!
//! This module provides the typed query AST the splitter rewrites and its
//! serialization to SQL text:
//!
//! - [`expr`] - Expression AST and builder DSL
//! - [`query`] - SELECT/UNION query model
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect formatting rules
//! - [`types`] - Logical SQL data types

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;
pub mod types;

pub use types::DataType;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    aggregate, alias, avg, cast, col, count, count_all, count_distinct, func, lit_bool, lit_float,
    lit_int, lit_null, lit_str, max, min, op, param, star, sum, table_col, typed_col,
    AggregateKind, BinaryOperator, Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{
    FromItem, JoinType, NullsOrder, Query, Select, SelectColumn, SortColumn, SortDir, Union,
};
pub use token::{Token, TokenStream};
