// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use serde_json::json;
use tempfile::tempdir;
use uuid::Uuid;

use spendlog::categories::{CategoryService, CreateCategoryInput};
use spendlog::cli;
use spendlog::commands::exporter;
use spendlog::expenses::{CreateExpenseInput, ExpenseService};
use spendlog::models::{CategoryKind, PaymentMethod};
use spendlog::store::RecordStore;

const USER: &str = "u1";

fn seeded_store() -> (RecordStore, Uuid) {
    let store = RecordStore::open_in_memory().unwrap();
    let cat = CategoryService::new(&store)
        .create(
            USER,
            CreateCategoryInput {
                name: "Groceries".to_string(),
                color: "#00aa55".to_string(),
                kind: CategoryKind::Expense,
            },
        )
        .unwrap();
    ExpenseService::new(&store)
        .create(
            USER,
            CreateExpenseInput {
                amount: "12.34".parse().unwrap(),
                currency: "USD".to_string(),
                category_id: cat,
                description: Some("Weekly run".to_string()),
                payment_method: Some(PaymentMethod::Cash),
                tags: None,
                date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            },
        )
        .unwrap();
    (store, cat)
}

fn run_export(store: &RecordStore, format: &str, out: &str) -> anyhow::Result<()> {
    let matches = cli::build_cli().get_matches_from([
        "spendlog", "export", "expenses", "--format", format, "--out", out,
    ]);
    let Some(("export", export_m)) = matches.subcommand() else {
        panic!("no export subcommand");
    };
    exporter::handle(store, USER, export_m)
}

#[test]
fn export_expenses_writes_pretty_json() {
    let (store, _) = seeded_store();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.json");
    run_export(&store, "json", &out_path.to_string_lossy()).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(
        parsed,
        json!([
            {
                "date": "2025-01-02",
                "amount": "12.34",
                "currency": "USD",
                "category": "Groceries",
                "description": "Weekly run",
                "payment_method": "cash",
                "tags": null
            }
        ])
    );
}

#[test]
fn export_expenses_writes_csv_without_deleted_records() {
    let (store, cat) = seeded_store();
    let svc = ExpenseService::new(&store);
    let dead = svc
        .create(
            USER,
            CreateExpenseInput {
                amount: "99".parse().unwrap(),
                currency: "USD".to_string(),
                category_id: cat,
                description: None,
                payment_method: None,
                tags: None,
                date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
            },
        )
        .unwrap();
    svc.delete(USER, dead).unwrap();

    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.csv");
    run_export(&store, "csv", &out_path.to_string_lossy()).unwrap();

    let contents = std::fs::read_to_string(&out_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(
        lines.next().unwrap(),
        "date,amount,currency,category,description,payment_method,tags"
    );
    assert_eq!(
        lines.next().unwrap(),
        "2025-01-02,12.34,USD,Groceries,Weekly run,cash,"
    );
    assert!(lines.next().is_none());
}

#[test]
fn export_expenses_rejects_unknown_format() {
    let (store, _) = seeded_store();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("export.unknown");
    assert!(run_export(&store, "xml", &out_path.to_string_lossy()).is_err());
    assert!(!out_path.exists());
}
