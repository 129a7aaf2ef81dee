#![allow(dead_code)]

use polars::prelude::*;
use std::path::Path;
use volume_etl::Dataset;

pub fn employees() -> Dataset {
    Dataset::new(
        "employees",
        df!(
            "id" => [1i64, 2, 3, 4, 5],
            "name" => ["Amit", "Neha", "Raj", "Sara", "Tom"],
            "salary" => [70000i64, 80000, 60000, 90000, 75000],
            "gender" => ["M", "F", "M", "F", "M"],
            "address" => ["INDIA", "JAPAN", "INDIA", "JAPAN", "USA"],
            "city" => ["Delhi", "Tokyo", "Mumbai", "Osaka", "NY"],
            "age" => [25i64, 28, 30, 26, 35]
        )
        .unwrap(),
    )
}

pub fn managers_1() -> Dataset {
    Dataset::new(
        "managers_1",
        df!(
            "id" => [10i64, 11, 12, 13, 14, 15, 16, 17, 18, 18],
            "name" => ["Anil", "Vikas", "Nisha", "Nidhi", "Priya", "Mohit", "Rajesh", "Raman", "Sam", "Sam"],
            "sal" => [50000i64, 75000, 40000, 60000, 80000, 45000, 90000, 55000, 65000, 65000],
            "mngr_id" => [18i64, 16, 18, 17, 18, 18, 10, 16, 17, 17]
        )
        .unwrap(),
    )
}

pub fn managers_2() -> Dataset {
    Dataset::new(
        "managers_2",
        df!(
            "id" => [19i64, 20],
            "name" => ["Sohan", "Sima"],
            "sal" => [50000i64, 75000],
            "mngr_id" => [18i64, 17]
        )
        .unwrap(),
    )
}

pub fn people_with_ages() -> Dataset {
    Dataset::new(
        "people",
        df!(
            "id" => [Some(1i64), Some(2), Some(3), Some(4), Some(5), Some(6), Some(7), Some(8), None, Some(7)],
            "name" => [Some("manish"), Some("rahul"), Some("pawan"), Some("roshini"), Some("raushan"), None, Some("adam"), Some("chris"), None, Some("adam")],
            "age" => [Some(26i64), None, Some(12), Some(44), Some(35), Some(29), Some(37), Some(16), None, Some(37)]
        )
        .unwrap(),
    )
}

pub fn customers() -> Dataset {
    Dataset::new(
        "customers",
        df!(
            "customer_id" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            "customer_name" => ["manish", "vikash", "nikita", "rahul", "mahesh", "prantosh", "raman", "prakash", "ragini", "raushan"],
            "address" => ["patna", "kolkata", "delhi", "ranchi", "jaipur", "kolkata", "patna", "ranchi", "kolkata", "jaipur"]
        )
        .unwrap(),
    )
}

pub fn sales() -> Dataset {
    Dataset::new(
        "sales",
        df!(
            "customer_id" => [1i64, 1, 2, 5, 7, 9, 2, 1, 5, 11],
            "product_id" => [22i64, 27, 5, 22, 22, 5, 1, 56, 12, 12],
            "quantity" => [10i64, 5, 3, 1, 4, 6, 12, 2, 5, 76]
        )
        .unwrap(),
    )
}

pub fn staff() -> Dataset {
    Dataset::new(
        "staff",
        df!(
            "id" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12],
            "name" => ["manish", "vikash", "raushan", "mukesh", "priti", "nikita", "ragini", "rashi", "aditya", "rahul", "rakhi", "akhilesh"],
            "salary" => [50000i64, 60000, 70000, 80000, 90000, 45000, 55000, 100000, 65000, 50000, 50000, 90000],
            "department" => ["IT", "sales", "marketing", "IT", "sales", "marketing", "marketing", "IT", "IT", "marketing", "IT", "sales"]
        )
        .unwrap(),
    )
}

pub fn strings(ds: &Dataset, column: &str) -> Vec<Option<String>> {
    ds.frame()
        .column(column)
        .unwrap()
        .cast(&DataType::String)
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect()
}

pub fn ints(ds: &Dataset, column: &str) -> Vec<Option<i64>> {
    ds.frame()
        .column(column)
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .collect()
}

pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
