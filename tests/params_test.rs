use cleave::prelude::*;
use cleave::split::extract_params;
use serde_json::{json, Value};

fn where_query(predicate: Expr) -> Query {
    Select::new()
        .column(col("a"))
        .from(FromItem::table("t"))
        .filter(predicate)
        .into()
}

#[test]
fn referenced_subset_is_backfilled_with_null() {
    // Original params [p0, p1, p2], query references only ?3 and ?1: the
    // derived list has length 3, slot 1 null, slots 0 and 2 populated.
    let qry = where_query(col("a").eq(param(2)).and(col("b").eq(param(0))));
    let params = vec![json!("p0"), json!("p1"), json!("p2")];

    let out = extract_params(&qry, &params).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out, vec![json!("p0"), Value::Null, json!("p2")]);
}

#[test]
fn unreferenced_parameters_are_dropped_from_the_tail() {
    let qry = where_query(col("a").eq(param(0)));
    let params = vec![json!(1), json!(2), json!(3)];

    let out = extract_params(&qry, &params).unwrap();
    assert_eq!(out, vec![json!(1)]);
}

#[test]
fn out_of_range_reference_is_an_error() {
    let qry = where_query(col("a").eq(param(3)));
    let err = extract_params(&qry, &[json!(1), json!(2)]).unwrap_err();

    assert!(matches!(
        err,
        SplitError::ParameterIndexOutOfRange { index: 3, count: 2 }
    ));
    let msg = err.to_string();
    assert!(msg.contains("parameter 3"));
}

#[test]
fn split_propagates_parameter_errors() {
    let qry = where_query(col("a").eq(param(9)));
    assert!(matches!(
        split(qry, &[], false),
        Err(SplitError::ParameterIndexOutOfRange { .. })
    ));
}

#[test]
fn each_side_gets_an_independent_list() {
    // ?1 is used by WHERE (map side after the split), ?2 by OFFSET (reduce
    // side only).
    let qry: Query = Select::new()
        .column(col("a"))
        .from(FromItem::table("t"))
        .filter(col("x").eq(param(0)))
        .offset(param(1))
        .into();

    let params = vec![json!("filter"), json!(100)];
    let two_step = split(qry, &params, false).unwrap();

    assert_eq!(
        two_step.map_queries[0].params,
        vec![json!("filter")]
    );
    assert_eq!(two_step.reduce_params, vec![Value::Null, json!(100)]);
}

#[test]
fn values_of_any_json_type_pass_through() {
    let qry = where_query(
        col("a")
            .eq(param(0))
            .and(col("b").eq(param(1)))
            .and(col("c").eq(param(2))),
    );
    let params = vec![json!(1.5), json!(null), json!({"nested": [1, 2]})];

    let out = extract_params(&qry, &params).unwrap();
    assert_eq!(out, params);
}
