//! Splits a single SQL query into a two-step map/reduce query pair.
//!
//! The map query runs independently on every data-owning node; the reduce
//! query runs once over the unioned map results and produces the final
//! answer. The rewrite preserves exact query semantics: aggregates are
//! decomposed into partials and combiners, DISTINCT and OFFSET move to the
//! reduce stage, ORDER BY + LIMIT are distributed according to whether an
//! aggregate was found, and every map output column gets a generated alias
//! the reduce side can reference unambiguously.
//!
//! The rewrite is a pure, deterministic transformation: no I/O, no shared
//! state, and either a fully consistent query pair or an error.

mod params;
mod select_list;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::sql::dialect::Dialect;
use crate::sql::expr::{alias, col, lit_null, AggregateKind, Expr};
use crate::sql::query::{FromItem, Query, Select};

pub use params::extract_params;

/// Prefix of generated table aliases.
pub const TABLE_PREFIX: &str = "__T";

/// Prefix of generated column aliases.
pub const COLUMN_PREFIX: &str = "__C";

/// Name of the zero-argument table function the reduce query selects from;
/// the execution layer binds it to the merged map-result stream.
pub const MERGE_TABLE_FUNC: &str = "__Z0";

// All generated names share the "__" namespace; user identifiers starting
// with any of these prefixes are rejected up front.
const RESERVED_PREFIXES: [&str; 3] = [TABLE_PREFIX, COLUMN_PREFIX, "__Z"];

/// Generated table alias for an index.
pub(crate) fn table_name(idx: usize) -> String {
    format!("{}{}", TABLE_PREFIX, idx)
}

/// Generated column alias for an index.
pub(crate) fn column_name(idx: usize) -> String {
    format!("{}{}", COLUMN_PREFIX, idx)
}

/// Errors that can occur while splitting.
///
/// All of them are fatal: the rewrite either fully succeeds or produces no
/// result. Retrying cannot help, the transformation is deterministic.
#[derive(Debug, Error)]
pub enum SplitError {
    /// An aggregate kind the splitter cannot decompose into partials.
    #[error("unsupported aggregate: {0}")]
    UnsupportedAggregate(AggregateKind),

    /// A placeholder references a position beyond the supplied parameters.
    #[error("invalid number of query parameters: cannot find parameter {index} (have {count})")]
    ParameterIndexOutOfRange { index: usize, count: usize },

    /// A user identifier collides with the generated-name namespace.
    #[error("identifier `{0}` collides with a reserved rewrite prefix")]
    ReservedIdentifier(String),

    /// A structural assumption of the rewrite was violated. Not a user
    /// error; indicates a malformed input AST or a bug.
    #[error("query rewrite invariant violated: {0}")]
    Internal(&'static str),
}

pub type SplitResult<T> = Result<T, SplitError>;

/// One per-partition query of a split result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapQuery {
    /// The merge-stream term the execution layer binds this query's results
    /// to, e.g. `__Z0()`.
    pub target: String,
    pub sql: String,
    pub params: Vec<Value>,
}

/// The two-step query pair produced by [`split`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoStepQuery {
    pub reduce_sql: String,
    pub reduce_params: Vec<Value>,
    pub map_queries: Vec<MapQuery>,
    /// EXPLAIN-ness of the source query, surfaced once for the whole pair.
    pub explain: bool,
}

/// Split a query into its map/reduce pair using the default dialect.
///
/// `collocated` asserts that all rows needed for any one group already live
/// on a single node, so grouping and aggregation can finish entirely at the
/// map stage. Note that a DISTINCT inside a non-collocated aggregate is
/// propagated to the map-side partial only; cross-partition DISTINCT
/// aggregation is not sound in general and the caller must reason about it.
pub fn split(qry: Query, params: &[Value], collocated: bool) -> SplitResult<TwoStepQuery> {
    split_for_dialect(qry, params, collocated, Dialect::default())
}

/// Split a query into its map/reduce pair, rendering SQL for a specific
/// dialect.
pub fn split_for_dialect(
    qry: Query,
    params: &[Value],
    collocated: bool,
    dialect: Dialect,
) -> SplitResult<TwoStepQuery> {
    let explain = qry.is_explain();

    validate_reserved_names(&qry)?;

    let src_qry = flatten_union(qry);
    let visible = src_qry.visible_count();

    // Create map and reduce skeletons. EXPLAIN applies to the overall
    // two-step query, not to the per-node execution.
    let mut map_qry = src_qry.clone();
    map_qry.explain = false;

    let mut rdc_qry = Select::new().from(FromItem::TableFunction {
        name: MERGE_TABLE_FUNC.into(),
    });

    // Split all select expressions into map-reduce parts.
    let mut map_exprs: Vec<Expr> = src_qry.columns.iter().map(|c| c.expr.clone()).collect();
    let mut rdc_exprs: Vec<Option<Expr>> = vec![None; visible];
    let mut col_names = HashSet::new();
    let mut aggregate_found = false;

    // The map list grows when AVG appends its hidden COUNT partial, so the
    // loop bound is captured here; appended entries are not revisited.
    let len = map_exprs.len();
    for idx in 0..len {
        aggregate_found |= select_list::split_select_expression(
            &mut map_exprs,
            &mut rdc_exprs,
            &mut col_names,
            idx,
            collocated,
        )?;
    }

    // Fill select expressions.
    map_qry.clear_columns();

    for expr in &map_exprs {
        // All map expressions are visible output columns of the map query.
        map_qry.add_column(expr.clone(), true);
    }

    for rdc_expr in rdc_exprs {
        let expr = rdc_expr.ok_or(SplitError::Internal("reduce column was not produced"))?;
        rdc_qry.add_column(expr, true);
    }

    // Extra map columns (hidden sort carriers, AVG count partials) become
    // invisible reduce columns referenced by their generated alias.
    for expr in &map_exprs[visible..] {
        rdc_qry.add_column(col(alias_name(expr)?), false);
    }

    // -- GROUP BY
    if let Some(group_idxs) = &src_qry.group_idxs {
        map_qry.clear_groups();

        for &idx in group_idxs {
            map_qry.add_group_expr(col(alias_name(&map_exprs[idx])?));
        }

        // Collocated data is already grouped correctly by the map stage;
        // re-grouping would group by already-unique keys.
        if !collocated {
            for &idx in group_idxs {
                rdc_qry.add_group_expr(col(alias_name(&map_exprs[idx])?));
            }
            rdc_qry.group_idxs = Some(group_idxs.clone());
        }
    }

    // -- HAVING
    if src_qry.having.is_some() && !collocated {
        // HAVING is assumed reducible to a filter on one already-computed
        // aggregate column; it becomes a reduce-side WHERE on that column.
        let having_col = src_qry
            .having_idx
            .ok_or(SplitError::Internal("HAVING without a resolved column"))?;

        rdc_qry.where_and(col(&column_name(having_col)));

        map_qry.having = None;
        map_qry.having_idx = None;
    }

    // -- ORDER BY
    if !src_qry.order_by.is_empty() {
        if aggregate_found {
            // Ordering over raw pre-aggregation rows is meaningless; map
            // sort would otherwise only be kept to serve offset-limit.
            map_qry.clear_sort();
        }

        for sort_col in &src_qry.order_by {
            rdc_qry.add_sort(sort_col.clone());
        }
    }

    // -- LIMIT
    if src_qry.limit.is_some() {
        if aggregate_found || src_qry.offset.is_some() {
            // Truncating pre-aggregation rows would corrupt the partials,
            // and with a global OFFSET in play every node must return all
            // its matching rows.
            map_qry.limit = None;
        }

        rdc_qry.limit = src_qry.limit.clone();
    }

    // -- OFFSET
    if src_qry.offset.is_some() {
        // Every node must return all matching rows; only the reduce stage
        // skips rows of the globally merged result.
        map_qry.offset = None;

        rdc_qry.offset = src_qry.offset.clone();
    }

    // -- DISTINCT
    if src_qry.distinct {
        // Two nodes may each produce rows that are duplicates only in the
        // global result, so deduplication happens after the merge.
        map_qry.distinct = false;
        rdc_qry.distinct = true;
    }

    let map_qry: Query = map_qry.into();
    let rdc_qry: Query = rdc_qry.into();

    let reduce_params = extract_params(&rdc_qry, params)?;
    let map_params = extract_params(&map_qry, params)?;

    Ok(TwoStepQuery {
        reduce_sql: rdc_qry.to_sql(dialect),
        reduce_params,
        map_queries: vec![MapQuery {
            target: format!("{}()", MERGE_TABLE_FUNC),
            sql: map_qry.to_sql(dialect),
            params: map_params,
        }],
        explain,
    })
}

/// Normalize a query into a single SELECT.
///
/// A UNION tree becomes a synthetic outer SELECT over the union as a
/// subquery, with one plain column reference per output column of the
/// leftmost leaf SELECT. Columns that are neither aliases nor bare columns
/// get a generated alias written back into the leftmost branch, so the
/// generated name is the actual output column name of the inner union.
fn flatten_union(qry: Query) -> Select {
    let mut qry = match qry {
        Query::Select(select) => return select,
        union @ Query::Union(_) => union,
    };

    let explain = qry.is_explain();
    let order_by = match &qry {
        Query::Union(union) => union.order_by.clone(),
        Query::Select(_) => unreachable!(),
    };

    let mut wrapper_cols = Vec::new();
    {
        let left = leftmost_select_mut(&mut qry);

        let visible = left.visible_count();
        for idx in 0..visible {
            let name = match &left.columns[idx].expr {
                Expr::Alias { name, .. } => name.clone(),
                Expr::Column { name, .. } => name.clone(),
                _ => {
                    // Set a generated alias on the expression itself.
                    let generated = column_name(idx);
                    let expr = std::mem::replace(&mut left.columns[idx].expr, lit_null());
                    left.columns[idx].expr = alias(&generated, expr);
                    generated
                }
            };

            wrapper_cols.push(col(&name));
        }
    }

    let mut wrapper = Select::new().from(FromItem::Subquery {
        query: Box::new(qry),
        alias: Some(table_name(0)),
    });

    for expr in wrapper_cols {
        wrapper.add_column(expr, true);
    }

    wrapper.order_by = order_by;
    wrapper.explain = explain;
    wrapper
}

/// The leftmost leaf SELECT of a union tree; by construction it defines the
/// tree's column list.
fn leftmost_select_mut(qry: &mut Query) -> &mut Select {
    match qry {
        Query::Select(select) => select,
        Query::Union(union) => leftmost_select_mut(&mut union.left),
    }
}

fn alias_name(expr: &Expr) -> SplitResult<&str> {
    match expr {
        Expr::Alias { name, .. } => Ok(name),
        _ => Err(SplitError::Internal("map select expression is not aliased")),
    }
}

// =============================================================================
// Reserved-name validation
// =============================================================================

/// Reject user identifiers that begin with a reserved rewrite prefix.
///
/// Generated names are unique by construction (sequential index-based
/// naming), which only holds if no user identifier can shadow them; failing
/// fast here beats silently producing a semantically wrong query.
fn validate_reserved_names(qry: &Query) -> SplitResult<()> {
    match qry {
        Query::Select(select) => validate_select_names(select),
        Query::Union(union) => {
            validate_query_names(&union.left)?;
            validate_query_names(&union.right)?;
            validate_opt_expr_names(union.limit.as_ref())?;
            validate_opt_expr_names(union.offset.as_ref())
        }
    }
}

fn validate_query_names(qry: &Query) -> SplitResult<()> {
    validate_reserved_names(qry)
}

fn validate_select_names(qry: &Select) -> SplitResult<()> {
    for select_col in &qry.columns {
        validate_expr_names(&select_col.expr)?;
    }

    if let Some(from) = &qry.from {
        validate_from_names(from)?;
    }

    validate_opt_expr_names(qry.where_clause.as_ref())?;

    for expr in &qry.group_exprs {
        validate_expr_names(expr)?;
    }

    validate_opt_expr_names(qry.having.as_ref())?;
    validate_opt_expr_names(qry.limit.as_ref())?;
    validate_opt_expr_names(qry.offset.as_ref())
}

fn validate_from_names(from: &FromItem) -> SplitResult<()> {
    match from {
        FromItem::Table {
            schema,
            name,
            alias,
        } => {
            if let Some(schema) = schema {
                check_ident(schema)?;
            }
            check_ident(name)?;
            if let Some(alias) = alias {
                check_ident(alias)?;
            }
            Ok(())
        }
        FromItem::Subquery { query, alias } => {
            if let Some(alias) = alias {
                check_ident(alias)?;
            }
            validate_reserved_names(query)
        }
        FromItem::TableFunction { name } => check_ident(name),
        FromItem::Join {
            left, right, on, ..
        } => {
            validate_from_names(left)?;
            validate_from_names(right)?;
            validate_opt_expr_names(on.as_ref())
        }
    }
}

fn validate_opt_expr_names(expr: Option<&Expr>) -> SplitResult<()> {
    match expr {
        Some(expr) => validate_expr_names(expr),
        None => Ok(()),
    }
}

fn validate_expr_names(expr: &Expr) -> SplitResult<()> {
    match expr {
        Expr::Column {
            schema,
            table,
            name,
            ..
        } => {
            if let Some(schema) = schema {
                check_ident(schema)?;
            }
            if let Some(table) = table {
                check_ident(table)?;
            }
            check_ident(name)
        }
        Expr::Alias { name, child } => {
            check_ident(name)?;
            validate_expr_names(child)
        }
        Expr::Function { name, args } => {
            check_ident(name)?;
            for arg in args {
                validate_expr_names(arg)?;
            }
            Ok(())
        }
        Expr::Star { table } => match table {
            Some(table) => check_ident(table),
            None => Ok(()),
        },
        Expr::Subquery(query) => validate_reserved_names(query),
        other => {
            for child in other.children() {
                validate_expr_names(child)?;
            }
            Ok(())
        }
    }
}

fn check_ident(name: &str) -> SplitResult<()> {
    if RESERVED_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Err(SplitError::ReservedIdentifier(name.into()));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
