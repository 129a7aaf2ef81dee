mod common;

use anyhow::Result;
use polars::prelude::*;
use tempfile::tempdir;
use volume_etl::dataset::{
    read_back, read_csv, read_json, read_parquet, read_partitioned, write_dataset, ColumnType,
    CsvOptions, JsonLayout, SchemaSpec, WriteOptions,
};
use volume_etl::{Dataset, EtlError, FileFormat};

use common::*;

#[test]
fn parquet_directory_round_trip_preserves_rows_and_types() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("parquet_data");
    let report = write_dataset(&employees(), &dest, &WriteOptions::new(FileFormat::Parquet))?;

    assert_eq!(report.rows, 5);
    assert_eq!(report.files.len(), 1);
    assert!(dest.join("_SUCCESS").exists());

    let back = read_parquet("employees", &dest)?;
    assert_eq!(back.frame().schema(), employees().frame().schema());
    assert!(back.same_rows_unordered(&employees())?);
    Ok(())
}

#[test]
fn csv_round_trip_with_header_infers_types() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("csv_output");
    let options = WriteOptions::new(FileFormat::Csv);
    write_dataset(&sales(), &dest, &options)?;

    let back = read_back("sales", &dest, &options)?;
    assert!(back.same_rows_unordered(&sales())?);
    Ok(())
}

#[test]
fn writing_twice_replaces_previous_output() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("out");
    let options = WriteOptions::new(FileFormat::Parquet);
    write_dataset(&employees(), &dest, &options)?;
    write_dataset(&sales(), &dest, &options)?;

    let back = read_parquet("out", &dest)?;
    assert_eq!(back.row_count(), 10);
    assert!(back.has_column("quantity"));
    assert!(!back.has_column("salary"));
    Ok(())
}

#[test]
fn single_file_layout_writes_exactly_one_file() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("output").join("result.csv");
    let options = WriteOptions::new(FileFormat::Csv).single_file();
    let report = write_dataset(&customers(), &dest, &options)?;

    assert!(dest.is_file());
    assert_eq!(report.files, vec![dest.clone()]);
    let back = read_back("customers", &dest, &options)?;
    assert_eq!(back.row_count(), 10);
    assert_eq!(back.column_names(), customers().column_names());
    Ok(())
}

#[test]
fn single_file_cannot_be_partitioned() -> Result<()> {
    let dir = tempdir()?;
    let options = WriteOptions::new(FileFormat::Csv)
        .single_file()
        .partitioned_by(["address"]);
    let result = write_dataset(&customers(), &dir.path().join("x.csv"), &options);
    assert!(matches!(result, Err(EtlError::Config(_))));
    Ok(())
}

#[test]
fn partitioned_round_trip_restores_key_columns() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("partitioned");
    let options = WriteOptions::new(FileFormat::Csv).partitioned_by(["address"]);
    write_dataset(&customers(), &dest, &options)?;

    for city in ["patna", "kolkata", "delhi", "ranchi", "jaipur"] {
        assert!(dest.join(format!("address={}", city)).is_dir());
    }
    let back = read_partitioned("customers", &dest, FileFormat::Csv)?;
    assert_eq!(back.column_names().last().map(String::as_str), Some("address"));
    assert!(back.same_rows_unordered(&customers())?);
    Ok(())
}

#[test]
fn null_partition_values_use_the_default_directory() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("by_team");
    let players = Dataset::new(
        "players",
        df!(
            "name" => ["a", "b", "c"],
            "team" => [Some(1i64), None, Some(2)]
        )?,
    );
    let options = WriteOptions::new(FileFormat::Parquet).partitioned_by(["team"]);
    write_dataset(&players, &dest, &options)?;

    assert!(dest.join("team=__HIVE_DEFAULT_PARTITION__").is_dir());
    let back = read_back("players", &dest, &options)?;
    assert!(back.same_rows_unordered(&players)?);
    Ok(())
}

#[test]
fn partitioning_by_every_column_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let only_keys = Dataset::new("keys", df!("k" => [1i64, 2])?);
    let options = WriteOptions::new(FileFormat::Csv).partitioned_by(["k"]);
    let result = write_dataset(&only_keys, &dir.path().join("out"), &options);
    assert!(matches!(result, Err(EtlError::Schema(_))));
    Ok(())
}

#[test]
fn declared_schema_turns_bad_fields_into_nulls() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("flights.csv");
    write_file(
        &path,
        "DEST_COUNTRY_NAME,ORIGIN_COUNTRY_NAME,count\n\
         United States,Romania,15\n\
         Egypt,United States,lots\n\
         Malta,United States\n",
    );
    let schema = SchemaSpec::new()
        .column("COUNTRY_1", ColumnType::String)
        .column("COUNTRY_2", ColumnType::String)
        .column("TOTAL_COUNT", ColumnType::Int32);

    let typed = read_csv(
        "flights",
        &path,
        &CsvOptions::with_schema(schema.clone()).header(false),
    )?;
    assert_eq!(typed.column_names(), vec!["COUNTRY_1", "COUNTRY_2", "TOTAL_COUNT"]);
    assert_eq!(typed.row_count(), 4);
    assert_eq!(
        ints(&typed, "TOTAL_COUNT"),
        vec![None, Some(15), None, None]
    );
    let bad = typed.filter(col("TOTAL_COUNT").is_null())?;
    assert_eq!(bad.row_count(), 3);

    let with_header = read_csv("flights", &path, &CsvOptions::with_schema(schema))?;
    assert_eq!(with_header.row_count(), 3);
    Ok(())
}

#[test]
fn missing_source_is_reported_as_such() {
    let result = read_csv(
        "nothing",
        std::path::Path::new("/definitely/not/here.csv"),
        &CsvOptions::inferred(),
    );
    assert!(matches!(result, Err(EtlError::SourceMissing(_))));
}

#[test]
fn json_document_accepts_object_or_array() -> Result<()> {
    let dir = tempdir()?;
    let array = dir.path().join("people.json");
    write_file(
        &array,
        r#"[
          {"id": 1, "name": "manish", "city": "patna"},
          {"id": 2, "name": "vikash", "city": "kolkata"}
        ]"#,
    );
    let object = dir.path().join("one.json");
    write_file(&object, "{\n  \"id\": 3,\n  \"name\": \"nikita\"\n}\n");

    let people = read_json("people", &array, JsonLayout::Document)?;
    assert_eq!(people.row_count(), 2);
    assert_eq!(ints(&people, "id"), vec![Some(1), Some(2)]);

    let one = read_json("one", &object, JsonLayout::Document)?;
    assert_eq!(one.row_count(), 1);
    assert_eq!(strings(&one, "name"), vec![Some("nikita".to_string())]);
    Ok(())
}

#[test]
fn json_lines_reads_one_record_per_line() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("people.jsonl");
    write_file(
        &path,
        "{\"id\": 1, \"name\": \"manish\"}\n{\"id\": 2, \"name\": \"vikash\"}\n",
    );
    let people = read_json("people", &path, JsonLayout::Lines)?;
    assert_eq!(people.row_count(), 2);
    Ok(())
}

#[test]
fn empty_json_document_is_an_extract_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("empty.json");
    write_file(&path, "[]");
    assert!(matches!(
        read_json("empty", &path, JsonLayout::Document),
        Err(EtlError::Extract { .. })
    ));
    Ok(())
}

#[test]
fn partition_with_only_null_values_keeps_column_type() -> Result<()> {
    let dir = tempdir()?;
    let dest = dir.path().join("by_country");
    let salaries = Dataset::new(
        "salaries",
        df!(
            "name" => ["Neha", "Sara", "Raj"],
            "country" => ["JAPAN", "JAPAN", "INDIA"],
            "salary" => [Some(70000i64), Some(90000), None]
        )?,
    );
    let options = WriteOptions::new(FileFormat::Csv).partitioned_by(["country"]);
    write_dataset(&salaries, &dest, &options)?;

    let back = read_back("salaries", &dest, &options)?;
    assert_eq!(back.frame().column("salary")?.dtype(), &DataType::Int64);
    assert!(back.same_rows_unordered(&salaries)?);
    Ok(())
}
