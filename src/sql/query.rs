//! Query model - the SELECT/UNION tree the splitter rewrites.
//!
//! A [`Select`] keeps its clauses in the shape the rewrite needs: the select
//! list carries visible/hidden tags, GROUP BY is tracked both as select-list
//! positions and as rendered expressions, HAVING carries the index of the
//! single aggregate column it filters on, and LIMIT/OFFSET are expressions
//! because a bound parameter may supply the bound.

use serde::{Deserialize, Serialize};

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select list
// =============================================================================

/// A select-list entry.
///
/// Hidden entries exist only to carry ORDER-BY-referenced expressions that
/// are not part of the visible projection; they always trail the visible
/// ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectColumn {
    pub expr: Expr,
    pub visible: bool,
}

// =============================================================================
// FROM
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Cross,
}

/// A FROM-clause target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromItem {
    /// Plain table reference.
    Table {
        schema: Option<String>,
        name: String,
        alias: Option<String>,
    },

    /// Derived table: (SELECT ...) AS alias
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
    },

    /// Zero-argument table-valued function, e.g. the merge-stream
    /// placeholder the reduce query selects from.
    TableFunction { name: String },

    /// Joined tables; joins pass through the split untouched.
    Join {
        kind: JoinType,
        left: Box<FromItem>,
        right: Box<FromItem>,
        on: Option<Expr>,
    },
}

impl FromItem {
    /// Plain table reference.
    pub fn table(name: &str) -> Self {
        FromItem::Table {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            FromItem::Table {
                schema,
                name,
                alias,
            } => {
                ts.push(Token::QualifiedIdent {
                    schema: schema.clone(),
                    name: name.clone(),
                });
                if let Some(alias) = alias {
                    ts.space()
                        .push(Token::As)
                        .space()
                        .push(Token::Ident(alias.clone()));
                }
            }

            FromItem::Subquery { query, alias } => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
                if let Some(alias) = alias {
                    ts.space()
                        .push(Token::As)
                        .space()
                        .push(Token::Ident(alias.clone()));
                }
            }

            FromItem::TableFunction { name } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                ts.rparen();
            }

            FromItem::Join {
                kind,
                left,
                right,
                on,
            } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.newline();
                match kind {
                    JoinType::Inner => ts.push(Token::Inner),
                    JoinType::Left => ts.push(Token::Left),
                    JoinType::Cross => ts.push(Token::Cross),
                };
                ts.space().push(Token::Join).space();
                ts.append(&right.to_tokens_for_dialect(dialect));
                if let Some(on) = on {
                    ts.space().push(Token::On).space();
                    ts.append(&on.to_tokens_for_dialect(dialect));
                }
            }
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY key.
///
/// Sort keys are select-list positions (0-based here, rendered as 1-based
/// ordinals). Positions stay valid when the split rewrites both select lists
/// to generated aliases, which an expression-valued key would not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortColumn {
    pub column: usize,
    pub dir: SortDir,
    pub nulls: Option<NullsOrder>,
}

impl SortColumn {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            dir: SortDir::Asc,
            nulls: None,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            dir: SortDir::Desc,
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Skips NULLS FIRST/LAST for dialects that don't support it.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::LitInt(self.column as i64 + 1));
        ts.space().push(match self.dir {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        });
        if let Some(nulls) = &self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
        }
        ts
    }
}

// =============================================================================
// Select
// =============================================================================

/// A single SELECT query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub columns: Vec<SelectColumn>,
    pub distinct: bool,
    pub from: Option<FromItem>,
    pub where_clause: Option<Expr>,
    /// Select-list positions of the GROUP BY keys, as resolved by the parser.
    pub group_idxs: Option<Vec<usize>>,
    /// The rendered GROUP BY expressions.
    pub group_exprs: Vec<Expr>,
    /// The rendered HAVING predicate.
    pub having: Option<Expr>,
    /// Select-list position of the aggregate column HAVING filters on.
    ///
    /// HAVING is modeled as a filter over one already-computed aggregate
    /// column; compound predicates over several aggregates are not
    /// supported.
    pub having_idx: Option<usize>,
    pub order_by: Vec<SortColumn>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub explain: bool,
}

impl Select {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    // -- consuming builders, for constructing source queries

    /// Set the FROM target.
    pub fn from(mut self, from: FromItem) -> Self {
        self.from = Some(from);
        self
    }

    /// Append a visible select expression.
    pub fn column(mut self, expr: Expr) -> Self {
        self.add_column(expr, true);
        self
    }

    /// Append a hidden (sort-carrier) select expression.
    pub fn hidden_column(mut self, expr: Expr) -> Self {
        self.add_column(expr, false);
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_and(condition);
        self
    }

    /// Group by the select-list entries at the given positions.
    ///
    /// Derives the rendered GROUP BY expressions from the current select
    /// list, unwrapping output aliases.
    pub fn group_by_columns(mut self, idxs: Vec<usize>) -> Self {
        self.group_exprs = idxs
            .iter()
            .map(|&i| match &self.columns[i].expr {
                Expr::Alias { child, .. } => (**child).clone(),
                other => other.clone(),
            })
            .collect();
        self.group_idxs = Some(idxs);
        self
    }

    /// Set the HAVING predicate and the select position of the aggregate
    /// column it filters on.
    pub fn having_on(mut self, predicate: Expr, column: usize) -> Self {
        self.having = Some(predicate);
        self.having_idx = Some(column);
        self
    }

    /// Append an ORDER BY key.
    pub fn sort(mut self, sort: SortColumn) -> Self {
        self.order_by.push(sort);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: Expr) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: Expr) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the EXPLAIN flag.
    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    // -- in-place mutators, used by the rewrite

    /// Append a select expression. Visible entries must all precede hidden
    /// ones.
    pub fn add_column(&mut self, expr: Expr, visible: bool) {
        debug_assert!(
            !visible || self.columns.iter().all(|c| c.visible),
            "visible select expressions must precede hidden ones"
        );
        self.columns.push(SelectColumn { expr, visible });
    }

    /// Number of client-visible select expressions.
    pub fn visible_count(&self) -> usize {
        self.columns.iter().filter(|c| c.visible).count()
    }

    /// Drop the whole select list.
    pub fn clear_columns(&mut self) {
        self.columns.clear();
    }

    /// AND a condition onto the WHERE clause.
    pub fn where_and(&mut self, condition: Expr) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
    }

    /// Append a rendered GROUP BY expression.
    pub fn add_group_expr(&mut self, expr: Expr) {
        self.group_exprs.push(expr);
    }

    /// Drop the rendered GROUP BY expressions.
    pub fn clear_groups(&mut self) {
        self.group_exprs.clear();
    }

    /// Append an ORDER BY key.
    pub fn add_sort(&mut self, sort: SortColumn) {
        self.order_by.push(sort);
    }

    /// Drop the ORDER BY clause.
    pub fn clear_sort(&mut self) {
        self.order_by.clear();
    }

    /// Convert to token stream (default dialect).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if self.explain {
            ts.push(Token::Explain).newline();
        }

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        // Columns (hidden ones are real output columns, they render too)
        for (i, select_col) in self.columns.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_col.expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // GROUP BY
        if !self.group_exprs.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_exprs.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, sort_col) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&sort_col.to_tokens_for_dialect(dialect));
            }
        }

        // LIMIT / OFFSET
        if let Some(limit) = &self.limit {
            ts.newline().push(Token::Limit).space();
            ts.append(&limit.to_tokens_for_dialect(dialect));
        }
        if let Some(offset) = &self.offset {
            ts.newline().push(Token::Offset).space();
            ts.append(&offset.to_tokens_for_dialect(dialect));
        }

        ts
    }

    /// Generate SQL for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

// =============================================================================
// Union
// =============================================================================

/// A UNION of two queries.
///
/// ORDER BY and LIMIT/OFFSET here apply to the combined result. The column
/// list of a union tree is defined by its leftmost leaf SELECT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Union {
    pub left: Box<Query>,
    pub right: Box<Query>,
    pub all: bool,
    pub order_by: Vec<SortColumn>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub explain: bool,
}

impl Union {
    pub fn new(left: Query, right: Query) -> Self {
        Self {
            left: Box::new(left),
            right: Box::new(right),
            all: false,
            order_by: vec![],
            limit: None,
            offset: None,
            explain: false,
        }
    }

    pub fn new_all(left: Query, right: Query) -> Self {
        Self {
            all: true,
            ..Self::new(left, right)
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if self.explain {
            ts.push(Token::Explain).newline();
        }

        ts.lparen();
        ts.append(&self.left.to_tokens_for_dialect(dialect));
        ts.rparen();

        ts.newline().push(Token::Union);
        if self.all {
            ts.space().push(Token::All);
        }
        ts.newline();

        ts.lparen();
        ts.append(&self.right.to_tokens_for_dialect(dialect));
        ts.rparen();

        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, sort_col) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&sort_col.to_tokens_for_dialect(dialect));
            }
        }

        if let Some(limit) = &self.limit {
            ts.newline().push(Token::Limit).space();
            ts.append(&limit.to_tokens_for_dialect(dialect));
        }
        if let Some(offset) = &self.offset {
            ts.newline().push(Token::Offset).space();
            ts.append(&offset.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A query: a single SELECT or a UNION tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Select(Select),
    Union(Union),
}

impl Query {
    /// The EXPLAIN flag of the top-level query.
    pub fn is_explain(&self) -> bool {
        match self {
            Query::Select(s) => s.explain,
            Query::Union(u) => u.explain,
        }
    }

    /// Convert to token stream (default dialect).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        match self {
            Query::Select(s) => s.to_tokens_for_dialect(dialect),
            Query::Union(u) => u.to_tokens_for_dialect(dialect),
        }
    }

    /// Generate SQL for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

impl From<Select> for Query {
    fn from(s: Select) -> Self {
        Query::Select(s)
    }
}

impl From<Union> for Query {
    fn from(u: Union) -> Self {
        Query::Union(u)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, count_all, lit_int, param, sum};

    #[test]
    fn test_simple_select() {
        let query = Select::new()
            .column(col("id"))
            .column(col("name"))
            .from(FromItem::table("users"));

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("SELECT"));
        assert!(sql.contains("\"id\""));
        assert!(sql.contains("FROM \"users\""));
    }

    #[test]
    fn test_filter_chains_with_and() {
        let query = Select::new()
            .column(col("name"))
            .from(FromItem::table("users"))
            .filter(col("active").eq(true))
            .filter(col("age").gte(lit_int(18)));

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("AND"));
    }

    #[test]
    fn test_hidden_columns_render() {
        let query = Select::new()
            .column(col("name"))
            .hidden_column(col("age"))
            .from(FromItem::table("users"))
            .sort(SortColumn::desc(1));

        assert_eq!(query.visible_count(), 1);
        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("\"age\""));
        assert!(sql.contains("ORDER BY 2 DESC"));
    }

    #[test]
    fn test_group_by_columns_unwraps_alias() {
        let query = Select::new()
            .column(col("region"))
            .column(crate::sql::expr::alias("total", sum(col("amount"))))
            .from(FromItem::table("orders"))
            .group_by_columns(vec![0]);

        assert_eq!(query.group_idxs, Some(vec![0]));
        assert_eq!(query.group_exprs, vec![col("region")]);
        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("GROUP BY \"region\""));
    }

    #[test]
    fn test_having_renders() {
        let query = Select::new()
            .column(col("region"))
            .column(sum(col("amount")))
            .from(FromItem::table("orders"))
            .group_by_columns(vec![0])
            .having_on(sum(col("amount")).gt(lit_int(100)), 1);

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("HAVING SUM(\"amount\") > 100"));
    }

    #[test]
    fn test_limit_offset_expressions() {
        let query = Select::new()
            .column(count_all())
            .from(FromItem::table("t"))
            .limit(param(0))
            .offset(lit_int(3));

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("LIMIT ?1"));
        assert!(sql.contains("OFFSET 3"));
    }

    #[test]
    fn test_explain_prefix() {
        let query = Select::new()
            .column(col("a"))
            .from(FromItem::table("t"))
            .explain(true);

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.starts_with("EXPLAIN\n"));
    }

    #[test]
    fn test_from_subquery_with_alias() {
        let inner = Select::new().column(col("a")).from(FromItem::table("t"));
        let query = Select::new().column(col("a")).from(FromItem::Subquery {
            query: Box::new(inner.into()),
            alias: Some("__T0".into()),
        });

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("FROM ("));
        assert!(sql.contains(") AS \"__T0\""));
    }

    #[test]
    fn test_table_function_from() {
        let query = Select::new()
            .column(col("x"))
            .from(FromItem::TableFunction { name: "__Z0".into() });

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("FROM __Z0()"));
    }

    #[test]
    fn test_join_renders() {
        let query = Select::new()
            .column(col("id"))
            .from(FromItem::Join {
                kind: JoinType::Inner,
                left: Box::new(FromItem::table("a")),
                right: Box::new(FromItem::table("b")),
                on: Some(crate::sql::expr::table_col("a", "id").eq(crate::sql::expr::table_col("b", "a_id"))),
            });

        let sql = query.to_sql(Dialect::Generic);
        assert!(sql.contains("INNER JOIN \"b\" ON"));
    }

    #[test]
    fn test_union_renders() {
        let left = Select::new().column(col("a")).from(FromItem::table("t1"));
        let right = Select::new().column(col("b")).from(FromItem::table("t2"));
        let union = Union::new_all(left.into(), right.into());

        let sql = Query::from(union).to_sql(Dialect::Generic);
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("\"t1\""));
        assert!(sql.contains("\"t2\""));
    }

    #[test]
    fn test_union_order_and_limit() {
        let left = Select::new().column(col("a")).from(FromItem::table("t1"));
        let right = Select::new().column(col("a")).from(FromItem::table("t2"));
        let mut union = Union::new(left.into(), right.into());
        union.order_by.push(SortColumn::asc(0).nulls_last());
        union.limit = Some(lit_int(10));

        let sql = Query::from(union).to_sql(Dialect::Generic);
        assert!(sql.contains("ORDER BY 1 ASC NULLS LAST"));
        assert!(sql.contains("LIMIT 10"));
    }

    #[test]
    fn test_nulls_ordering_skipped_for_mysql() {
        let query = Select::new()
            .column(col("a"))
            .from(FromItem::table("t"))
            .sort(SortColumn::asc(0).nulls_first());

        let sql = query.to_sql(Dialect::MySql);
        assert!(sql.contains("ORDER BY 1 ASC"));
        assert!(!sql.contains("NULLS"));
    }

    #[test]
    fn test_query_serde_round_trip() {
        let query: Query = Select::new()
            .column(col("id"))
            .from(FromItem::table("users"))
            .limit(param(1))
            .into();

        let json = serde_json::to_string(&query).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
