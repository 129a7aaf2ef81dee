mod common;

use anyhow::Result;
use polars::prelude::*;
use serde_json::Value;
use volume_etl::transform::{
    json_literal, Aggregate, CompareOp, Condition, JoinKind, SortKey, UnionMode, WindowFunction,
    WindowSpec,
};
use volume_etl::{Dataset, EtlError};

use common::*;

#[test]
fn filter_keeps_only_matching_rows() -> Result<()> {
    let japan = employees().filter(col("address").eq(lit("JAPAN")))?;
    assert_eq!(ints(&japan, "id"), vec![Some(2), Some(4)]);

    let well_paid = employees().filter_where(&[
        Condition::new("address", CompareOp::Eq, "JAPAN"),
        Condition::new("salary", CompareOp::Gt, 70000),
    ])?;
    assert_eq!(ints(&well_paid, "id"), vec![Some(2), Some(4)]);
    Ok(())
}

#[test]
fn filter_on_unknown_column_fails() {
    let result = employees().filter_where(&[Condition::new("country", CompareOp::Eq, "JAPAN")]);
    assert!(result.is_err());
}

#[test]
fn derived_case_column_keeps_nulls_for_unknown_ages() -> Result<()> {
    let people = people_with_ages().derive_case(
        "is_adult",
        vec![
            (col("age").is_null(), json_literal(&Value::Null)?),
            (col("age").gt(lit(18i64)), lit("Yes")),
        ],
        lit("No"),
    )?;
    let expected: Vec<Option<String>> = [
        Some("Yes"),
        None,
        Some("No"),
        Some("Yes"),
        Some("Yes"),
        Some("Yes"),
        Some("Yes"),
        Some("No"),
        None,
        Some("Yes"),
    ]
    .iter()
    .map(|v| v.map(str::to_string))
    .collect();
    assert_eq!(strings(&people, "is_adult"), expected);
    assert_eq!(people.row_count(), 10);
    Ok(())
}

#[test]
fn union_appends_all_rows_including_duplicates() -> Result<()> {
    let all = managers_1().union(&managers_2())?;
    assert_eq!(all.row_count(), 12);
    assert_eq!(all.distinct()?.row_count(), 11);
    Ok(())
}

#[test]
fn positional_union_misaligns_reordered_columns() -> Result<()> {
    let reordered = managers_2().select_columns(&["id", "name", "mngr_id", "sal"])?;

    let positional = managers_1().union_with(&reordered, UnionMode::Positional)?;
    assert_eq!(positional.column_names(), managers_1().column_names());
    let sal = ints(&positional, "sal");
    assert_eq!(&sal[10..], &[Some(18), Some(17)]);

    let by_name = managers_1().union_with(&reordered, UnionMode::ByName)?;
    let sal = ints(&by_name, "sal");
    assert_eq!(&sal[10..], &[Some(50000), Some(75000)]);
    Ok(())
}

#[test]
fn union_rejects_mismatched_layouts() -> Result<()> {
    let narrow = managers_2().drop_columns(&["mngr_id"])?;
    assert!(matches!(managers_1().union(&narrow), Err(EtlError::Schema(_))));
    assert!(matches!(
        managers_1().union_by_name(&narrow),
        Err(EtlError::Schema(_))
    ));
    Ok(())
}

#[test]
fn drop_duplicates_keeps_first_occurrence_per_subset() -> Result<()> {
    let extra = Dataset::new(
        "extra",
        df!(
            "id" => [14i64],
            "name" => ["Priya"],
            "sal" => [70000i64],
            "mngr_id" => [18i64]
        )?,
    );
    let managers = managers_1().union(&extra)?;
    assert_eq!(managers.row_count(), 11);
    assert_eq!(managers.distinct()?.row_count(), 10);

    let deduped = managers.drop_duplicates(&["id", "name"])?;
    assert_eq!(deduped.row_count(), 9);
    let priya = deduped.filter(col("name").eq(lit("Priya")))?;
    assert_eq!(ints(&priya, "sal"), vec![Some(80000)]);

    let again = deduped.drop_duplicates(&["id", "name"])?;
    assert!(again.same_rows_unordered(&deduped)?);
    Ok(())
}

#[test]
fn join_kinds_produce_expected_row_counts() -> Result<()> {
    let customers = customers();
    let sales = sales();
    let keys = ["customer_id"];
    let count = |kind| -> Result<usize> {
        Ok(customers.join(&sales, &keys, &keys, kind)?.row_count())
    };
    assert_eq!(count(JoinKind::Inner)?, 9);
    assert_eq!(count(JoinKind::Left)?, 14);
    assert_eq!(count(JoinKind::Right)?, 10);
    assert_eq!(count(JoinKind::Full)?, 15);
    assert_eq!(count(JoinKind::Cross)?, 100);
    Ok(())
}

#[test]
fn left_join_fills_unmatched_right_side_with_nulls() -> Result<()> {
    let joined = customers().join(&sales(), &["customer_id"], &["customer_id"], JoinKind::Left)?;
    assert!(joined.has_column("customer_id_right"));
    let unmatched = joined.filter(col("customer_id").eq(lit(3i64)))?;
    assert_eq!(unmatched.row_count(), 1);
    assert_eq!(ints(&unmatched, "product_id"), vec![None]);
    Ok(())
}

#[test]
fn window_functions_rank_salaries_within_department() -> Result<()> {
    let spec = WindowSpec::ordered_by("salary")
        .partitioned_by(["department"])
        .descending();
    let ranked = staff().with_windows(
        &spec,
        &[
            (WindowFunction::RowNumber, "row_number"),
            (WindowFunction::Rank, "rank"),
            (WindowFunction::DenseRank, "dense_rank"),
            (WindowFunction::Ntile(3), "ntile"),
        ],
    )?;
    assert_eq!(ranked.row_count(), 12);

    let it = ranked.filter(col("department").eq(lit("IT")))?;
    assert_eq!(
        strings(&it, "name"),
        ["rashi", "mukesh", "aditya", "manish", "rakhi"]
            .iter()
            .map(|n| Some(n.to_string()))
            .collect::<Vec<_>>()
    );
    let some = |values: &[i64]| values.iter().map(|v| Some(*v)).collect::<Vec<_>>();
    assert_eq!(ints(&it, "row_number"), some(&[1, 2, 3, 4, 5]));
    assert_eq!(ints(&it, "rank"), some(&[1, 2, 3, 4, 4]));
    assert_eq!(ints(&it, "dense_rank"), some(&[1, 2, 3, 4, 4]));
    assert_eq!(ints(&it, "ntile"), some(&[1, 1, 2, 2, 3]));
    Ok(())
}

#[test]
fn rank_leaves_gaps_after_ties() -> Result<()> {
    let scores = Dataset::new(
        "scores",
        df!("player" => ["a", "b", "c", "d", "e"], "points" => [10i64, 20, 20, 30, 40])?,
    );
    let spec = WindowSpec::ordered_by("points");
    let ranked = scores
        .with_window(&spec, WindowFunction::Rank, "rank")?
        .with_window(&spec, WindowFunction::DenseRank, "dense")?;
    assert_eq!(
        ints(&ranked, "rank"),
        vec![Some(1), Some(2), Some(2), Some(4), Some(5)]
    );
    assert_eq!(
        ints(&ranked, "dense"),
        vec![Some(1), Some(2), Some(2), Some(3), Some(4)]
    );
    Ok(())
}

#[test]
fn group_by_names_aggregates_and_keeps_first_seen_order() -> Result<()> {
    let totals = sales().group_by(
        &["customer_id"],
        &[Aggregate::count_all(), Aggregate::sum("quantity")],
    )?;
    assert_eq!(
        totals.column_names(),
        vec!["customer_id", "count", "sum(quantity)"]
    );
    assert_eq!(
        ints(&totals, "customer_id"),
        vec![Some(1), Some(2), Some(5), Some(7), Some(9), Some(11)]
    );
    assert_eq!(
        ints(&totals, "sum(quantity)"),
        vec![Some(17), Some(15), Some(6), Some(4), Some(6), Some(76)]
    );
    Ok(())
}

#[test]
fn global_aggregate_yields_one_row() -> Result<()> {
    let summary = sales().aggregate(&[
        Aggregate::count_distinct("customer_id").alias("customers"),
        Aggregate::max("quantity").alias("largest"),
    ])?;
    assert_eq!(summary.row_count(), 1);
    assert_eq!(ints(&summary, "customers"), vec![Some(6)]);
    assert_eq!(ints(&summary, "largest"), vec![Some(76)]);
    Ok(())
}

#[test]
fn multi_key_sort_is_stable() -> Result<()> {
    let sorted = staff().sort(&[SortKey::asc("department"), SortKey::desc("salary")])?;
    let names = strings(&sorted, "name");
    assert_eq!(names[0].as_deref(), Some("rashi"));
    // equal IT salaries keep their input order
    let manish = names.iter().position(|n| n.as_deref() == Some("manish"));
    let rakhi = names.iter().position(|n| n.as_deref() == Some("rakhi"));
    assert!(manish < rakhi);
    Ok(())
}

#[test]
fn flatten_explodes_nested_arrays() -> Result<()> {
    let json = r#"[
        {"restaurants": [
            {"restaurant": {"R": {"res_id": "1001"}, "name": "Spice"}},
            {"restaurant": {"R": {"res_id": "1002"}, "name": "Dosa"}}
        ]},
        {"restaurants": [
            {"restaurant": {"R": {"res_id": "2001"}, "name": "Tandoor"}}
        ]}
    ]"#;
    let frame = JsonReader::new(std::io::Cursor::new(json.as_bytes())).finish()?;
    let restaurants = Dataset::new("restaurants", frame);

    let ids = restaurants.flatten(
        "restaurants",
        "new_restaurant",
        &["new_restaurant.restaurant.R.res_id", "new_restaurant.restaurant.name"],
    )?;
    assert_eq!(ids.column_names(), vec!["res_id", "name"]);
    assert_eq!(
        strings(&ids, "res_id"),
        vec![
            Some("1001".to_string()),
            Some("1002".to_string()),
            Some("2001".to_string())
        ]
    );
    Ok(())
}

#[test]
fn flatten_requires_an_array_column() {
    assert!(matches!(
        employees().flatten("name", "n", &["n"]),
        Err(EtlError::Schema(_))
    ));
}

#[test]
fn cast_turns_unparseable_values_into_nulls() -> Result<()> {
    let raw = Dataset::new("raw", df!("n" => ["1", "two", "3"])?);
    let typed = raw.cast_column("n", DataType::Int64)?;
    assert_eq!(ints(&typed, "n"), vec![Some(1), None, Some(3)]);
    Ok(())
}

#[test]
fn country_and_salary_filter_keeps_single_row() -> Result<()> {
    let rows = Dataset::new(
        "rows",
        df!(
            "id" => [1i64, 2, 3],
            "country" => ["JAPAN", "JAPAN", "INDIA"],
            "salary" => [70000i64, 90000, 60000]
        )?,
    );
    let kept = rows.filter_where(&[
        Condition::new("country", CompareOp::Eq, "JAPAN"),
        Condition::new("salary", CompareOp::Gt, 70000),
    ])?;
    assert_eq!(ints(&kept, "id"), vec![Some(2)]);
    Ok(())
}

#[test]
fn null_comparisons_exclude_rows() -> Result<()> {
    let adults = people_with_ages().filter(col("age").gt(lit(18i64)))?;
    assert_eq!(adults.row_count(), 6);
    Ok(())
}

#[test]
fn outer_joins_never_shrink_below_inner() -> Result<()> {
    let (left, right) = (customers(), sales());
    let keys = ["customer_id"];
    let inner = left.join(&right, &keys, &keys, JoinKind::Inner)?.row_count();
    let left_outer = left.join(&right, &keys, &keys, JoinKind::Left)?.row_count();
    let full = left.join(&right, &keys, &keys, JoinKind::Full)?.row_count();
    let cross = left.cross_join(&right)?.row_count();
    assert!(inner <= left_outer && left_outer <= full);
    assert_eq!(cross, left.row_count() * right.row_count());
    Ok(())
}

#[test]
fn distinct_is_idempotent() -> Result<()> {
    let once = managers_1().distinct()?;
    let twice = once.distinct()?;
    assert_eq!(once.row_count(), managers_1().row_count() - 1);
    assert!(twice.same_rows_unordered(&once)?);
    Ok(())
}

#[test]
fn ranks_never_decrease_within_a_partition() -> Result<()> {
    let spec = WindowSpec::ordered_by("salary").partitioned_by(["department"]);
    let ranked = staff().with_windows(
        &spec,
        &[(WindowFunction::Rank, "rank"), (WindowFunction::DenseRank, "dense")],
    )?;
    let departments = strings(&ranked, "department");
    let ranks = ints(&ranked, "rank");
    let dense = ints(&ranked, "dense");
    for i in 1..ranked.row_count() {
        if departments[i] == departments[i - 1] {
            assert!(ranks[i] >= ranks[i - 1]);
            assert!(dense[i] >= dense[i - 1]);
            assert!(dense[i].zip(dense[i - 1]).map_or(false, |(b, a)| b - a <= 1));
        }
    }
    Ok(())
}

#[test]
fn explode_keeps_null_elements_and_drops_empty_arrays() -> Result<()> {
    let json = r#"[
        {"id": 1, "items": [{"v": 1}, null, {"v": 3}]},
        {"id": 2, "items": []},
        {"id": 3, "items": null}
    ]"#;
    let frame = JsonReader::new(std::io::Cursor::new(json.as_bytes())).finish()?;
    let orders = Dataset::new("orders", frame);

    let exploded = orders.explode("items", "item")?;
    assert_eq!(ints(&exploded, "id"), vec![Some(1), Some(1), Some(1)]);

    let values = orders.flatten("items", "item", &["item.v"])?;
    assert_eq!(ints(&values, "v"), vec![Some(1), None, Some(3)]);
    Ok(())
}
