//! # Cleave
//!
//! Rewrites a single logical SQL query into a two-step map/reduce query
//! pair for execution over a horizontally-partitioned dataset.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Query AST (SELECT / UNION tree)             │
//! │        (produced by an external parser, see sql/)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [split]
//! ┌───────────────────────────┐  ┌──────────────────────────┐
//! │   Map query (per node)    │  │  Reduce query (once,     │
//! │   partial aggregates,     │  │  over the merged stream) │
//! │   generated __C aliases   │  │  combiners, sort, limit  │
//! └───────────────────────────┘  └──────────────────────────┘
//!                          │
//!                          ▼ [to_sql + per-query parameters]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     TwoStepQuery                         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate is purely transformational: it consumes an already-parsed AST
//! and produces SQL strings plus the parameter sublist each derived query
//! needs. Parsing SQL text and executing the pair are external concerns.

pub mod split;
pub mod sql;

// Re-export SQL submodules at crate level for convenience
pub use sql::dialect;
pub use sql::expr;
pub use sql::query;
pub use sql::token;
pub use sql::types;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::dialect::{Dialect, SqlDialect};
    pub use crate::expr::{
        // Constructors
        aggregate,
        alias,
        avg,
        cast,
        col,
        count,
        count_all,
        count_distinct,
        func,
        lit_bool,
        lit_float,
        lit_int,
        lit_null,
        lit_str,
        max,
        min,
        op,
        param,
        star,
        sum,
        table_col,
        typed_col,
        // Types
        AggregateKind,
        BinaryOperator,
        Expr,
        ExprExt,
        Literal,
        UnaryOperator,
    };
    pub use crate::query::{
        FromItem, JoinType, NullsOrder, Query, Select, SelectColumn, SortColumn, SortDir, Union,
    };
    pub use crate::split::{
        split, split_for_dialect, MapQuery, SplitError, SplitResult, TwoStepQuery,
    };
    pub use crate::token::{Token, TokenStream};
    pub use crate::types::DataType;
}

// Also export at crate root for convenience
pub use dialect::Dialect;
pub use expr::{col, count_all, lit_int, sum, table_col, Expr, ExprExt};
pub use query::{FromItem, Query, Select, SortColumn, Union};
pub use split::{split, split_for_dialect, MapQuery, SplitError, SplitResult, TwoStepQuery};
