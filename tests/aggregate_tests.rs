// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use spendlog::aggregates::AggregateLedger;
use spendlog::categories::{CategoryService, CreateCategoryInput};
use spendlog::expenses::{CreateExpenseInput, ExpenseService};
use spendlog::models::{CategoryKind, month_key, user_partition};
use spendlog::store::{RecordStore, WriteOp};

const USER: &str = "u1";

fn store() -> RecordStore {
    RecordStore::open_in_memory().unwrap()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn category(store: &RecordStore, name: &str) -> Uuid {
    CategoryService::new(store)
        .create(
            USER,
            CreateCategoryInput {
                name: name.to_string(),
                color: "#aabbcc".to_string(),
                kind: CategoryKind::Expense,
            },
        )
        .unwrap()
}

fn expense(store: &RecordStore, category_id: Uuid, amount: &str, day: &str) -> Uuid {
    ExpenseService::new(store)
        .create(
            USER,
            CreateExpenseInput {
                amount: dec(amount),
                currency: "USD".to_string(),
                category_id,
                description: None,
                payment_method: None,
                tags: None,
                date: NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap(),
            },
        )
        .unwrap()
}

#[test]
fn recompute_matches_the_active_expense_records() {
    let s = store();
    let food = category(&s, "Food");
    let travel = category(&s, "Travel");
    expense(&s, food, "12.50", "2025-01-05");
    expense(&s, food, "7.50", "2025-01-06");
    expense(&s, travel, "100", "2025-01-07");
    let deleted = expense(&s, food, "999", "2025-01-08");
    ExpenseService::new(&s).delete(USER, deleted).unwrap();
    expense(&s, food, "5", "2025-02-01"); // other month

    let ledger = AggregateLedger::new(&s);
    let agg = ledger.recompute_month(USER, "2025-01").unwrap();
    assert_eq!(agg.total_amount, dec("120"));
    assert_eq!(agg.expense_count, 3);

    let slice = ledger.recompute_category_month(USER, food, "2025-01").unwrap();
    assert_eq!(slice.total_amount, dec("20"));
    assert_eq!(slice.expense_count, 2);
}

#[test]
fn recompute_is_idempotent() {
    let s = store();
    let cat = category(&s, "Food");
    expense(&s, cat, "33.33", "2025-01-05");
    expense(&s, cat, "66.67", "2025-01-06");

    let ledger = AggregateLedger::new(&s);
    let first = ledger.recompute_month(USER, "2025-01").unwrap();
    let second = ledger.recompute_month(USER, "2025-01").unwrap();
    assert_eq!(first.total_amount, second.total_amount);
    assert_eq!(first.expense_count, second.expense_count);
    assert_eq!(second.total_amount, dec("100"));
}

#[test]
fn a_zeroed_aggregate_persists_rather_than_disappearing() {
    let s = store();
    let cat = category(&s, "Food");
    let e = expense(&s, cat, "100", "2025-01-05");
    ExpenseService::new(&s).delete(USER, e).unwrap();

    // The record still exists with zero totals; it is not removed.
    let doc = s
        .get(&user_partition(USER), &month_key("2025-01"))
        .unwrap()
        .expect("aggregate record should survive at zero");
    let total: Decimal = doc["totalAmount"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::ZERO);
    assert_eq!(doc["expenseCount"], 0);
}

#[test]
fn totals_read_as_zero_for_a_month_never_written() {
    let s = store();
    let totals = AggregateLedger::new(&s)
        .month_totals(USER, "2030-12")
        .unwrap();
    assert_eq!(totals.total_amount, Decimal::ZERO);
    assert_eq!(totals.expense_count, 0);
}

#[test]
fn recompute_preserves_the_recorded_currency() {
    let s = store();
    let cat = category(&s, "Food");
    expense(&s, cat, "10", "2025-01-05");

    let ledger = AggregateLedger::new(&s);
    let agg = ledger.recompute_month(USER, "2025-01").unwrap();
    assert_eq!(agg.currency.as_deref(), Some("USD"));
}

#[test]
fn category_month_aggregates_skip_category_records() {
    let s = store();
    let food = category(&s, "Food");
    let travel = category(&s, "Travel");
    expense(&s, food, "10", "2025-01-05");
    expense(&s, travel, "20", "2025-01-06");
    expense(&s, food, "5", "2025-02-01");

    // Category records share the CATEGORY# prefix with these aggregates;
    // the read must return only the month's aggregate documents.
    let slices = AggregateLedger::new(&s)
        .category_month_aggregates(USER, "2025-01")
        .unwrap();
    assert_eq!(slices.len(), 2);
    let total: Decimal = slices.iter().map(|a| a.total_amount).sum();
    assert_eq!(total, dec("30"));
}

#[test]
fn audit_reports_drift_and_recompute_heals_it() {
    let s = store();
    let cat = category(&s, "Food");
    expense(&s, cat, "100", "2025-01-05");
    expense(&s, cat, "50", "2025-01-06");

    let ledger = AggregateLedger::new(&s);
    assert!(ledger.audit_partition(USER).unwrap().is_empty());

    // Corrupt the stored month aggregate behind the ledger's back.
    s.execute(
        &user_partition(USER),
        WriteOp::Put {
            sk: month_key("2025-01"),
            item: serde_json::json!({
                "userId": USER,
                "month": "2025-01",
                "totalAmount": "999",
                "expenseCount": 7,
                "currency": "USD",
                "updatedAt": "2025-01-01T00:00:00Z"
            }),
        },
    )
    .unwrap();

    let drifts = ledger.audit_partition(USER).unwrap();
    assert_eq!(drifts.len(), 1);
    let d = &drifts[0];
    assert_eq!(d.month, "2025-01");
    assert!(d.category_id.is_none());
    assert_eq!(d.stored_total, dec("999"));
    assert_eq!(d.derived_total, dec("150"));
    assert_eq!(d.derived_count, 2);

    ledger.recompute_month(USER, "2025-01").unwrap();
    assert!(ledger.audit_partition(USER).unwrap().is_empty());
}

#[test]
fn audit_flags_an_aggregate_that_missed_a_write() {
    let s = store();
    let cat = category(&s, "Food");
    expense(&s, cat, "10", "2025-01-05");

    // Reset the month aggregate to zero as if the delta never landed.
    let ledger = AggregateLedger::new(&s);
    s.execute(
        &user_partition(USER),
        WriteOp::Put {
            sk: month_key("2025-01"),
            item: serde_json::json!({
                "userId": USER,
                "month": "2025-01",
                "totalAmount": "0",
                "expenseCount": 0,
                "updatedAt": "2025-01-01T00:00:00Z"
            }),
        },
    )
    .unwrap();

    let drifts = ledger.audit_partition(USER).unwrap();
    assert!(drifts.iter().any(|d| d.category_id.is_none() && d.derived_total == dec("10")));
}
