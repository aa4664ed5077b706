//! Expression AST - the core of SQL expression building.
//!
//! This module provides a strongly-typed AST for SQL expressions
//! with exhaustive pattern matching enforced by the compiler.

use serde::{Deserialize, Serialize};

use super::dialect::Dialect;
use super::token::{Token, TokenStream};
use super::types::DataType;

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens()` - the compiler enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Column reference: optional schema.table qualification plus the name.
    ///
    /// `ty` is the logical result type when the parser resolved one; the
    /// splitter uses it to decide whether the reduce side needs a transport
    /// cast.
    Column {
        schema: Option<String>,
        table: Option<String>,
        name: String,
        ty: Option<DataType>,
    },

    /// Literal values
    Literal(Literal),

    /// Bound-parameter placeholder, 0-based position into the original
    /// parameter array.
    Parameter(usize),

    /// Output alias: child AS name
    Alias { name: String, child: Box<Expr> },

    /// Aggregate function call. `arg` is None only for COUNT(*).
    Aggregate {
        kind: AggregateKind,
        distinct: bool,
        arg: Option<Box<Expr>>,
    },

    /// Plain (non-aggregate) function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// CAST(expr AS type)
    Cast { expr: Box<Expr>, ty: DataType },

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<crate::sql::query::Query>),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Aggregate function kinds.
///
/// The full vocabulary a parser may produce. Only the first six can be
/// decomposed into map/reduce partials; the rest surface as an
/// unsupported-aggregate error when a non-collocated split meets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateKind {
    Avg,
    Min,
    Max,
    Sum,
    Count,
    /// COUNT(*)
    CountAll,
    GroupConcat,
    StddevPop,
    BoolAnd,
    BoolOr,
}

impl AggregateKind {
    /// The SQL function name.
    pub fn sql_name(&self) -> &'static str {
        match self {
            AggregateKind::Avg => "AVG",
            AggregateKind::Min => "MIN",
            AggregateKind::Max => "MAX",
            AggregateKind::Sum => "SUM",
            AggregateKind::Count | AggregateKind::CountAll => "COUNT",
            AggregateKind::GroupConcat => "GROUP_CONCAT",
            AggregateKind::StddevPop => "STDDEV_POP",
            AggregateKind::BoolAnd => "BOOL_AND",
            AggregateKind::BoolOr => "BOOL_OR",
        }
    }
}

impl std::fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateKind::CountAll => write!(f, "COUNT(*)"),
            other => write!(f, "{}", other.sql_name()),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
    IsNull,
    IsNotNull,
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream (default dialect).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column {
                schema,
                table,
                name,
                ty: _,
            } => {
                if let Some(s) = schema {
                    ts.push(Token::Ident(s.clone()));
                    ts.push(Token::Dot);
                }
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(name.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::Parameter(idx) => {
                ts.push(Token::Placeholder(*idx));
            }

            Expr::Alias { name, child } => {
                ts.append(&child.to_tokens_for_dialect(dialect));
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::Ident(name.clone()));
            }

            Expr::Aggregate {
                kind,
                distinct,
                arg,
            } => {
                ts.push(Token::FunctionName(kind.sql_name().into()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                match (kind, arg) {
                    (AggregateKind::CountAll, _) => {
                        ts.push(Token::Star);
                    }
                    (_, Some(arg)) => {
                        ts.append(&arg.to_tokens_for_dialect(dialect));
                    }
                    (_, None) => {}
                }
                ts.rparen();
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Cast { expr, ty } => {
                ts.push(Token::Cast);
                ts.lparen();
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space()
                    .push(Token::As)
                    .space()
                    .push(Token::TypeName(ty.to_string()));
                ts.rparen();
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not | UnaryOperator::Minus => {
                    ts.push(match op {
                        UnaryOperator::Not => Token::Not,
                        _ => Token::Minus,
                    });
                    ts.space();
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                }
                UnaryOperator::IsNull | UnaryOperator::IsNotNull => {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(match op {
                        UnaryOperator::IsNull => Token::IsNull,
                        _ => Token::IsNotNull,
                    });
                }
            },

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
        }

        ts
    }

    /// The logical result type of this expression, when known.
    ///
    /// Only columns carry parser-resolved types; aliases and casts pass
    /// through or impose their own. Everything else is unknown, which is
    /// fine: the sole consumer is the transport-cast decision.
    pub fn result_type(&self) -> Option<DataType> {
        match self {
            Expr::Column { ty, .. } => ty.clone(),
            Expr::Alias { child, .. } => child.result_type(),
            Expr::Cast { ty, .. } => Some(ty.clone()),
            Expr::Literal(lit) => match lit {
                Literal::Int(_) => Some(DataType::Int64),
                Literal::Float(_) => Some(DataType::Float64),
                Literal::String(_) => Some(DataType::String),
                Literal::Bool(_) => Some(DataType::Bool),
                Literal::Null => None,
            },
            _ => None,
        }
    }

    /// Direct child expressions, for generic AST walks.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Alias { child, .. } => vec![child],
            Expr::Aggregate { arg, .. } => arg.iter().map(|a| a.as_ref()).collect(),
            Expr::Function { args, .. } => args.iter().collect(),
            Expr::Cast { expr, .. } => vec![expr],
            Expr::BinaryOp { left, right, .. } => vec![left, right],
            Expr::UnaryOp { expr, .. } => vec![expr],
            Expr::Column { .. }
            | Expr::Literal(_)
            | Expr::Parameter(_)
            | Expr::Star { .. }
            | Expr::Subquery(_) => vec![],
        }
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a bare column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        schema: None,
        table: None,
        name: name.into(),
        ty: None,
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        schema: None,
        table: Some(table.into()),
        name: column.into(),
        ty: None,
    }
}

/// Create a column reference with a resolved result type.
pub fn typed_col(name: &str, ty: DataType) -> Expr {
    Expr::Column {
        schema: None,
        table: None,
        name: name.into(),
        ty: Some(ty),
    }
}

/// Wrap an expression in an output alias.
pub fn alias(name: &str, child: Expr) -> Expr {
    Expr::Alias {
        name: name.into(),
        child: Box::new(child),
    }
}

/// Create an aggregate function call.
pub fn aggregate(kind: AggregateKind, distinct: bool, arg: Expr) -> Expr {
    Expr::Aggregate {
        kind,
        distinct,
        arg: Some(Box::new(arg)),
    }
}

/// COUNT(*)
pub fn count_all() -> Expr {
    Expr::Aggregate {
        kind: AggregateKind::CountAll,
        distinct: false,
        arg: None,
    }
}

/// Create a binary operation.
pub fn op(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

/// CAST(expr AS ty)
pub fn cast(expr: Expr, ty: DataType) -> Expr {
    Expr::Cast {
        expr: Box::new(expr),
        ty,
    }
}

/// Create a bound-parameter placeholder.
pub fn param(idx: usize) -> Expr {
    Expr::Parameter(idx)
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a float literal.
pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create a boolean literal.
pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

/// Create a NULL literal.
pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star { table: None }
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

// Aggregate shorthands

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    aggregate(AggregateKind::Sum, false, expr)
}

/// AVG(expr)
pub fn avg(expr: Expr) -> Expr {
    aggregate(AggregateKind::Avg, false, expr)
}

/// MIN(expr)
pub fn min(expr: Expr) -> Expr {
    aggregate(AggregateKind::Min, false, expr)
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    aggregate(AggregateKind::Max, false, expr)
}

/// COUNT(expr)
pub fn count(expr: Expr) -> Expr {
    aggregate(AggregateKind::Count, false, expr)
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    aggregate(AggregateKind::Count, true, expr)
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Eq, self.into_expr(), other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Ne, self.into_expr(), other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Gt, self.into_expr(), other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Gte, self.into_expr(), other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Lt, self.into_expr(), other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Lte, self.into_expr(), other.into())
    }

    // Logical operators
    fn and(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::And, self.into_expr(), other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Or, self.into_expr(), other.into())
    }

    // Arithmetic operators
    fn add(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Plus, self.into_expr(), other.into())
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Minus, self.into_expr(), other.into())
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Mul, self.into_expr(), other.into())
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        op(BinaryOperator::Div, self.into_expr(), other.into())
    }

    /// Alias this expression (for the select list).
    fn aliased(self, name: &str) -> Expr {
        alias(name, self.into_expr())
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

// =============================================================================
// Tests
// =============================================================================
