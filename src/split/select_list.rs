//! The select-list splitter: decides, per select expression, whether it
//! passes through to the map query unchanged or decomposes into a
//! map-partial-aggregate + reduce-combining-aggregate pair.

use std::collections::HashSet;

use crate::sql::expr::{aggregate, alias, cast, col, op, AggregateKind, BinaryOperator, Expr};
use crate::sql::types::DataType;

use super::{column_name, SplitError, SplitResult};

/// Split the select expression at `idx` into its map and reduce halves.
///
/// `map_select` initially holds the source select expressions and is
/// rewritten in place; AVG appends its extra hidden COUNT partial at the
/// end, so the caller must iterate over a prefix length captured before the
/// loop. `rdc_select` is the fixed-size visible-column array; entries past
/// its length (hidden sort carriers) only get a map half.
///
/// Returns true iff the entry decomposed as an aggregate.
pub(crate) fn split_select_expression(
    map_select: &mut Vec<Expr>,
    rdc_select: &mut [Option<Expr>],
    col_names: &mut HashSet<String>,
    idx: usize,
    collocated: bool,
) -> SplitResult<bool> {
    let mut el = map_select[idx].clone();

    // Unwrap one level of output alias, remembering the user-facing name.
    let mut user_alias: Option<String> = None;
    if let Expr::Alias { name, child } = el {
        user_alias = Some(name);
        el = *child;
    }

    if !collocated && matches!(el, Expr::Aggregate { .. }) {
        let Expr::Aggregate {
            kind,
            distinct,
            arg,
        } = el
        else {
            unreachable!()
        };

        let map_agg_alias = column_name(idx);

        let (map_agg, rdc_agg) = match kind {
            // SUM( AVG(CAST(x AS DOUBLE)) * COUNT(x) ) / SUM( COUNT(x) )
            AggregateKind::Avg => {
                let child = aggregate_arg(kind, arg)?;

                //-- COUNT(x) map
                let cnt_map_agg = aggregate(AggregateKind::Count, distinct, (*child).clone());

                // Add generated alias to COUNT(x). Using the current length
                // as index since COUNT is appended as the last map select
                // element.
                let cnt_map_agg_alias = column_name(map_select.len());

                map_select.push(alias(&cnt_map_agg_alias, cnt_map_agg));

                //-- AVG(CAST(x AS DOUBLE)) map
                let map_agg = aggregate(
                    AggregateKind::Avg,
                    distinct,
                    cast((*child).clone(), DataType::Float64),
                );

                //-- SUM( AVG(x)*COUNT(x) )/SUM( COUNT(x) ) reduce
                let sum_up = aggregate(
                    AggregateKind::Sum,
                    false,
                    op(
                        BinaryOperator::Mul,
                        col(&map_agg_alias),
                        col(&cnt_map_agg_alias),
                    ),
                );

                let sum_down = aggregate(AggregateKind::Sum, false, col(&cnt_map_agg_alias));

                (map_agg, op(BinaryOperator::Div, sum_up, sum_down))
            }

            // SUM( SUM(x) ), MAX( MAX(x) ), MIN( MIN(x) )
            AggregateKind::Sum | AggregateKind::Max | AggregateKind::Min => {
                let child = aggregate_arg(kind, arg)?;

                let map_agg = aggregate(kind, distinct, *child);
                let rdc_agg = aggregate(kind, false, col(&map_agg_alias));

                (map_agg, rdc_agg)
            }

            // CAST(SUM( COUNT(x) ) AS BIGINT), CAST(SUM( COUNT(*) ) AS BIGINT)
            AggregateKind::Count | AggregateKind::CountAll => {
                let map_agg = Expr::Aggregate {
                    kind,
                    distinct,
                    arg: if kind == AggregateKind::Count {
                        Some(aggregate_arg(kind, arg)?)
                    } else {
                        None
                    },
                };

                let rdc_agg = aggregate(AggregateKind::Sum, false, col(&map_agg_alias));
                let rdc_agg = cast(rdc_agg, DataType::Int64);

                (map_agg, rdc_agg)
            }

            other => return Err(SplitError::UnsupportedAggregate(other)),
        };

        if matches!(map_agg, Expr::Alias { .. }) {
            return Err(SplitError::Internal("map aggregate is already aliased"));
        }

        // Add generated alias to map aggregate.
        map_select[idx] = alias(&map_agg_alias, map_agg);

        // Hidden sort carriers keep only their partial column on the reduce
        // side; the combiner is emitted for visible columns only.
        if idx < rdc_select.len() {
            // Re-attach the user's alias on the reduce side only.
            let rdc_agg = match user_alias {
                Some(name) => alias(&name, rdc_agg),
                None => rdc_agg,
            };

            rdc_select[idx] = Some(rdc_agg);
        }

        Ok(true)
    } else {
        let map_col_alias = column_name(idx);

        // Original column name (or user alias) for the reduce column.
        let rdc_col_alias = match (&user_alias, &el) {
            (Some(name), _) => name.clone(),
            (None, Expr::Column { name, .. }) => name.clone(),
            (None, _) => map_col_alias.clone(),
        };

        // Always wrap the map column into a generated alias; `el` is known
        // not to be an alias here.
        map_select[idx] = alias(&map_col_alias, el.clone());

        if idx < rdc_select.len() {
            let mut rdc_el = col(&map_col_alias);

            // The transport representation is not self-describing for every
            // type; cast back to the declared type where it is lossy.
            if let Some(ty) = el.result_type() {
                if ty.requires_transport_cast() {
                    rdc_el = cast(rdc_el, ty);
                }
            }

            // Only the first occurrence of an output name keeps it; later
            // duplicates (usually wildcards over several tables) keep their
            // generated name.
            if col_names.insert(rdc_col_alias.clone()) {
                rdc_el = alias(&rdc_col_alias, rdc_el);
            }

            rdc_select[idx] = Some(rdc_el);
        }

        Ok(false)
    }
}

fn aggregate_arg(kind: AggregateKind, arg: Option<Box<Expr>>) -> SplitResult<Box<Expr>> {
    match arg {
        Some(arg) => Ok(arg),
        None => {
            debug_assert!(false, "{kind} aggregate without an argument");
            Err(SplitError::Internal("aggregate function has no argument"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::Dialect;
    use crate::sql::expr::{avg, count, count_all, lit_int, max, sum, typed_col, ExprExt};

    fn run_split(
        exprs: Vec<Expr>,
        visible: usize,
        collocated: bool,
    ) -> (Vec<Expr>, Vec<Option<Expr>>, bool) {
        let mut map_select = exprs;
        let mut rdc_select = vec![None; visible];
        let mut col_names = HashSet::new();
        let mut aggregate_found = false;

        let len = map_select.len();
        for i in 0..len {
            aggregate_found |= split_select_expression(
                &mut map_select,
                &mut rdc_select,
                &mut col_names,
                i,
                collocated,
            )
            .unwrap();
        }

        (map_select, rdc_select, aggregate_found)
    }

    fn sql(expr: &Expr) -> String {
        expr.to_tokens().serialize(Dialect::Generic)
    }

    #[test]
    fn test_passthrough_column() {
        let (map, rdc, agg) = run_split(vec![col("name")], 1, false);
        assert!(!agg);
        assert_eq!(sql(&map[0]), "\"name\" AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "\"__C0\" AS \"name\"");
    }

    #[test]
    fn test_passthrough_preserves_user_alias_on_reduce_only() {
        let (map, rdc, _) = run_split(vec![alias("n", col("name"))], 1, false);
        assert_eq!(sql(&map[0]), "\"name\" AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "\"__C0\" AS \"n\"");
    }

    #[test]
    fn test_passthrough_expression_gets_generated_name() {
        let (map, rdc, _) = run_split(vec![col("a").add(lit_int(1))], 1, false);
        assert_eq!(sql(&map[0]), "\"a\" + 1 AS \"__C0\"");
        // No original name to preserve, so the generated one is kept.
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "\"__C0\" AS \"__C0\"");
    }

    #[test]
    fn test_sum_decomposition() {
        let (map, rdc, agg) = run_split(vec![sum(col("x"))], 1, false);
        assert!(agg);
        assert_eq!(sql(&map[0]), "SUM(\"x\") AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "SUM(\"__C0\")");
    }

    #[test]
    fn test_max_decomposition_keeps_user_alias() {
        let (map, rdc, _) = run_split(vec![alias("biggest", max(col("x")))], 1, false);
        assert_eq!(sql(&map[0]), "MAX(\"x\") AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "MAX(\"__C0\") AS \"biggest\"");
    }

    #[test]
    fn test_count_decomposition() {
        let (map, rdc, _) = run_split(vec![count(col("x"))], 1, false);
        assert_eq!(sql(&map[0]), "COUNT(\"x\") AS \"__C0\"");
        assert_eq!(
            sql(rdc[0].as_ref().unwrap()),
            "CAST(SUM(\"__C0\") AS BIGINT)"
        );
    }

    #[test]
    fn test_count_all_decomposition() {
        let (map, rdc, _) = run_split(vec![count_all()], 1, false);
        assert_eq!(sql(&map[0]), "COUNT(*) AS \"__C0\"");
        assert_eq!(
            sql(rdc[0].as_ref().unwrap()),
            "CAST(SUM(\"__C0\") AS BIGINT)"
        );
    }

    #[test]
    fn test_avg_decomposition_appends_hidden_count() {
        let (map, rdc, agg) = run_split(vec![avg(col("x"))], 1, false);
        assert!(agg);
        // The COUNT partial lands past the captured prefix, aliased by its
        // insertion position.
        assert_eq!(map.len(), 2);
        assert_eq!(sql(&map[0]), "AVG(CAST(\"x\" AS DOUBLE)) AS \"__C0\"");
        assert_eq!(sql(&map[1]), "COUNT(\"x\") AS \"__C1\"");
        assert_eq!(
            sql(rdc[0].as_ref().unwrap()),
            "SUM(\"__C0\" * \"__C1\") / SUM(\"__C1\")"
        );
    }

    #[test]
    fn test_avg_after_other_columns_numbers_from_list_length() {
        let (map, rdc, _) = run_split(vec![col("g"), avg(col("x"))], 2, false);
        assert_eq!(map.len(), 3);
        assert_eq!(sql(&map[1]), "AVG(CAST(\"x\" AS DOUBLE)) AS \"__C1\"");
        assert_eq!(sql(&map[2]), "COUNT(\"x\") AS \"__C2\"");
        assert_eq!(
            sql(rdc[1].as_ref().unwrap()),
            "SUM(\"__C1\" * \"__C2\") / SUM(\"__C2\")"
        );
    }

    #[test]
    fn test_distinct_propagates_to_map_only() {
        let (map, rdc, _) = run_split(
            vec![aggregate(AggregateKind::Sum, true, col("x"))],
            1,
            false,
        );
        assert_eq!(sql(&map[0]), "SUM(DISTINCT \"x\") AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "SUM(\"__C0\")");
    }

    #[test]
    fn test_collocated_aggregate_passes_through() {
        let (map, rdc, agg) = run_split(vec![sum(col("x"))], 1, true);
        assert!(!agg);
        assert_eq!(sql(&map[0]), "SUM(\"x\") AS \"__C0\"");
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "\"__C0\" AS \"__C0\"");
    }

    #[test]
    fn test_unsupported_aggregate_fails() {
        let mut map_select = vec![aggregate(AggregateKind::GroupConcat, false, col("x"))];
        let mut rdc_select = vec![None; 1];
        let mut col_names = HashSet::new();

        let err =
            split_select_expression(&mut map_select, &mut rdc_select, &mut col_names, 0, false)
                .unwrap_err();
        assert!(matches!(
            err,
            SplitError::UnsupportedAggregate(AggregateKind::GroupConcat)
        ));
    }

    #[test]
    fn test_uuid_column_gets_transport_cast() {
        let (map, rdc, _) = run_split(vec![typed_col("id", DataType::Uuid)], 1, false);
        assert_eq!(sql(&map[0]), "\"id\" AS \"__C0\"");
        assert_eq!(
            sql(rdc[0].as_ref().unwrap()),
            "CAST(\"__C0\" AS UUID) AS \"id\""
        );
    }

    #[test]
    fn test_duplicate_output_names_first_wins() {
        let (_, rdc, _) = run_split(vec![table_col_id("a"), table_col_id("b")], 2, false);
        assert_eq!(sql(rdc[0].as_ref().unwrap()), "\"__C0\" AS \"id\"");
        // Second "id" keeps its generated name only.
        assert_eq!(sql(rdc[1].as_ref().unwrap()), "\"__C1\"");
    }

    fn table_col_id(table: &str) -> Expr {
        crate::sql::expr::table_col(table, "id")
    }

    #[test]
    fn test_hidden_entry_gets_no_reduce_column() {
        // Two entries, only one visible: the hidden one is map-side only.
        let (map, rdc, _) = run_split(vec![col("a"), col("b")], 1, false);
        assert_eq!(map.len(), 2);
        assert_eq!(rdc.len(), 1);
        assert_eq!(sql(&map[1]), "\"b\" AS \"__C1\"");
    }
}
