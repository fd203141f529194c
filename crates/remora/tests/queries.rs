//! Queries through the public facade, checked at the wire boundary.

mod common;

use common::{Invoice, InvoiceLine, invoice_row, key, session};
use remora::prelude::*;
use serde_json::json;

#[test]
fn filtering_by_a_text_column_returns_the_matching_instance() {
    let (cx, backend) = session();
    backend.queue(vec![invoice_row(1, "Order", 3)]);

    let found = cx
        .models::<Invoice>()
        .filter(Invoice::string_value().eq("Order"))
        .to_list()
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id(), key(1));
    assert_eq!(
        found[0].get(&Invoice::string_value()).unwrap().as_deref(),
        Some("Order")
    );

    let wire = backend.last_plan().to_json().unwrap();
    let filter = &wire["Filters"]["Items"]["0"];
    assert_eq!(filter["ComparisonType"], "Equal");
    assert_eq!(filter["LeftExpression"]["ColumnPath"], "StringValue");
    assert_eq!(filter["RightExpression"]["Parameter"]["Value"], json!("Order"));
}

#[test]
fn detail_membership_compiles_to_exists_over_an_in_filter() {
    let (cx, _) = session();

    let plan = cx
        .models::<Invoice>()
        .filter(Invoice::lines().any_where(list(["A-1", "B-2"]).contains(InvoiceLine::sku())))
        .plan()
        .unwrap();
    let wire = plan.to_json().unwrap();
    let filter = &wire["Filters"]["Items"]["0"];

    assert_eq!(filter["FilterType"], "Exists");
    assert_eq!(
        filter["LeftExpression"]["ColumnPath"],
        "[InvoiceLine:Invoice:Id].Id"
    );

    let inner = &filter["SubFilters"]["Items"]["0"];
    assert_eq!(inner["FilterType"], "InFilter");
    assert_eq!(inner["LeftExpression"]["ColumnPath"], "Sku");
    assert_eq!(inner["RightExpressions"].as_array().unwrap().len(), 2);
}

#[test]
fn identical_queries_serialize_identically() {
    let (cx, _) = session();
    let build = || {
        cx.models::<Invoice>()
            .filter(Invoice::int_value().gt(2).and(Invoice::string_value().starts_with("O")))
            .order_by_desc(Invoice::int_value())
            .skip(10)
            .take(5)
            .plan()
            .unwrap()
            .to_json()
            .unwrap()
    };

    assert_eq!(build().to_string(), build().to_string());
}

#[test]
fn repeated_loads_share_one_instance_per_key() {
    let (cx, backend) = session();
    backend.queue(vec![invoice_row(1, "Order", 3)]);
    backend.queue(vec![invoice_row(1, "Order", 3), invoice_row(2, "Other", 4)]);

    let first = cx.models::<Invoice>().to_list().unwrap();
    let second = cx.models::<Invoice>().to_list().unwrap();

    assert!(first[0].ptr_eq(&second[0]));
    assert_eq!(cx.tracked_count(), 2);
}

#[test]
fn compile_errors_surface_before_any_round_trip() {
    let (cx, backend) = session();

    let err = cx
        .models::<Invoice>()
        .filter(col("NoSuchColumn").eq(1))
        .to_list()
        .unwrap_err();

    assert!(err.is_compile());
    assert_eq!(backend.query_count(), 0);
}

#[test]
fn failed_queries_carry_the_backend_message() {
    let (cx, backend) = session();
    backend
        .queued
        .borrow_mut()
        .push_back(remora::db::provider::ItemsResponse::failed("backend offline"));

    let err = cx.models::<Invoice>().to_list().unwrap_err();

    assert!(err.is_provider());
    assert_eq!(err.message, "backend offline");
}

proptest::proptest! {
    #[test]
    fn plans_are_deterministic_for_any_threshold(threshold in proptest::num::i64::ANY, label in "[a-z]{0,8}") {
        let (cx, _) = session();
        let build = || {
            cx.models::<Invoice>()
                .filter(Invoice::int_value().lte(threshold).or(Invoice::string_value().eq(label.as_str())))
                .plan()
                .unwrap()
        };

        let (a, b) = (build(), build());
        proptest::prop_assert_eq!(&a, &b);
        proptest::prop_assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }
}
