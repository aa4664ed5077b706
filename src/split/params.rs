//! Parameter extraction for derived queries.
//!
//! The map and reduce queries each reference only a subset of the original
//! placeholders, so each gets its own parameter list: the values referenced
//! by `Parameter(i)` nodes reachable from the query, at their original
//! positions, with never-referenced slots below the highest used index
//! backfilled with NULL. (The upstream dialect permits referencing parameter
//! N while skipping 1..N-1; skipped slots still need a bound value at run
//! time.)

use serde_json::Value;

use crate::sql::expr::Expr;
use crate::sql::query::{FromItem, Query, Select};

use super::{SplitError, SplitResult};

/// Collect the parameter values a query actually references.
pub fn extract_params(qry: &Query, params: &[Value]) -> SplitResult<Vec<Value>> {
    let mut target = Vec::with_capacity(params.len());
    find_query_params(qry, params, &mut target)?;
    Ok(target)
}

fn find_query_params(qry: &Query, params: &[Value], target: &mut Vec<Value>) -> SplitResult<()> {
    match qry {
        Query::Select(select) => find_select_params(select, params, target),
        Query::Union(union) => {
            find_query_params(&union.left, params, target)?;
            find_query_params(&union.right, params, target)?;

            find_opt_expr_params(union.limit.as_ref(), params, target)?;
            find_opt_expr_params(union.offset.as_ref(), params, target)
        }
    }
}

fn find_select_params(qry: &Select, params: &[Value], target: &mut Vec<Value>) -> SplitResult<()> {
    for select_col in &qry.columns {
        find_expr_params(&select_col.expr, params, target)?;
    }

    if let Some(from) = &qry.from {
        find_from_params(from, params, target)?;
    }

    find_opt_expr_params(qry.where_clause.as_ref(), params, target)?;

    for expr in &qry.group_exprs {
        find_expr_params(expr, params, target)?;
    }

    find_opt_expr_params(qry.having.as_ref(), params, target)?;

    find_opt_expr_params(qry.limit.as_ref(), params, target)?;
    find_opt_expr_params(qry.offset.as_ref(), params, target)
}

fn find_from_params(from: &FromItem, params: &[Value], target: &mut Vec<Value>) -> SplitResult<()> {
    match from {
        FromItem::Table { .. } | FromItem::TableFunction { .. } => Ok(()),
        FromItem::Subquery { query, .. } => find_query_params(query, params, target),
        FromItem::Join {
            left, right, on, ..
        } => {
            find_from_params(left, params, target)?;
            find_from_params(right, params, target)?;
            find_opt_expr_params(on.as_ref(), params, target)
        }
    }
}

fn find_opt_expr_params(
    expr: Option<&Expr>,
    params: &[Value],
    target: &mut Vec<Value>,
) -> SplitResult<()> {
    match expr {
        Some(expr) => find_expr_params(expr, params, target),
        None => Ok(()),
    }
}

fn find_expr_params(expr: &Expr, params: &[Value], target: &mut Vec<Value>) -> SplitResult<()> {
    match expr {
        Expr::Parameter(idx) => {
            let idx = *idx;

            // Backfill skipped slots so the referenced index lands at its
            // original position in the local list.
            while target.len() < idx {
                target.push(Value::Null);
            }

            if params.len() <= idx {
                return Err(SplitError::ParameterIndexOutOfRange {
                    index: idx,
                    count: params.len(),
                });
            }

            let param = params[idx].clone();

            if idx == target.len() {
                target.push(param);
            } else {
                target[idx] = param;
            }

            Ok(())
        }
        Expr::Subquery(query) => find_query_params(query, params, target),
        other => {
            for child in other.children() {
                find_expr_params(child, params, target)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, lit_int, param, ExprExt};
    use crate::sql::query::FromItem;
    use serde_json::json;

    fn select_with_where(where_clause: Expr) -> Query {
        Select::new()
            .column(col("a"))
            .from(FromItem::table("t"))
            .filter(where_clause)
            .into()
    }

    #[test]
    fn test_no_parameters() {
        let qry = select_with_where(col("a").eq(lit_int(1)));
        let out = extract_params(&qry, &[json!("unused")]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_sequential_parameters() {
        let qry = select_with_where(col("a").eq(param(0)).and(col("b").eq(param(1))));
        let out = extract_params(&qry, &[json!(1), json!(2)]).unwrap();
        assert_eq!(out, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_gap_backfilled_with_null() {
        // References ?3 and ?1 only; slots 0 and 2 never referenced.
        let qry = select_with_where(col("a").eq(param(2)).and(col("b").eq(param(0))));
        let out = extract_params(&qry, &[json!("p0"), json!("p1"), json!("p2")]).unwrap();
        assert_eq!(out, vec![json!("p0"), Value::Null, json!("p2")]);
    }

    #[test]
    fn test_out_of_range_fails() {
        let qry = select_with_where(col("a").eq(param(5)));
        let err = extract_params(&qry, &[json!(1)]).unwrap_err();
        match err {
            SplitError::ParameterIndexOutOfRange { index, count } => {
                assert_eq!(index, 5);
                assert_eq!(count, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_params_with_reference_fails() {
        let qry = select_with_where(col("a").eq(param(0)));
        assert!(extract_params(&qry, &[]).is_err());
    }

    #[test]
    fn test_limit_offset_walked() {
        let qry: Query = Select::new()
            .column(col("a"))
            .from(FromItem::table("t"))
            .limit(param(1))
            .offset(param(0))
            .into();

        let out = extract_params(&qry, &[json!(5), json!(10)]).unwrap();
        assert_eq!(out, vec![json!(5), json!(10)]);
    }

    #[test]
    fn test_union_branches_walked() {
        let left = select_with_where(col("a").eq(param(0)));
        let right = select_with_where(col("b").eq(param(1)));
        let Query::Select(left) = left else { unreachable!() };
        let Query::Select(right) = right else { unreachable!() };
        let qry: Query = crate::sql::query::Union::new(left.into(), right.into()).into();

        let out = extract_params(&qry, &[json!("l"), json!("r")]).unwrap();
        assert_eq!(out, vec![json!("l"), json!("r")]);
    }

    #[test]
    fn test_subquery_in_where_walked() {
        let inner: Query = Select::new()
            .column(col("id"))
            .from(FromItem::table("u"))
            .filter(col("x").eq(param(0)))
            .into();
        let qry = select_with_where(col("id").eq(Expr::Subquery(Box::new(inner))));

        let out = extract_params(&qry, &[json!(42)]).unwrap();
        assert_eq!(out, vec![json!(42)]);
    }

    #[test]
    fn test_join_condition_walked() {
        let qry: Query = Select::new()
            .column(col("id"))
            .from(FromItem::Join {
                kind: crate::sql::query::JoinType::Inner,
                left: Box::new(FromItem::table("a")),
                right: Box::new(FromItem::table("b")),
                on: Some(col("x").eq(param(0))),
            })
            .into();

        let out = extract_params(&qry, &[json!(7)]).unwrap();
        assert_eq!(out, vec![json!(7)]);
    }

    #[test]
    fn test_repeated_reference_keeps_position() {
        let qry = select_with_where(col("a").eq(param(0)).and(col("b").eq(param(0))));
        let out = extract_params(&qry, &[json!(9)]).unwrap();
        assert_eq!(out, vec![json!(9)]);
    }
}
