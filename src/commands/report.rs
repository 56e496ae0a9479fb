// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::aggregates::AggregateLedger;
use crate::categories::load_categories;
use crate::store::RecordStore;
use crate::utils::{maybe_print_json, parse_month, pretty_table};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategorySlice {
    category_id: Uuid,
    name: String,
    total_amount: Decimal,
    expense_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MonthReport {
    month: String,
    total_amount: Decimal,
    expense_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    categories: Vec<CategorySlice>,
}

pub fn handle(store: &RecordStore, user: &str, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("month", sub)) => month(store, user, sub),
        _ => Ok(()),
    }
}

/// Reads the stored aggregates rather than re-summing expenses: what the
/// report shows is exactly what the ledger has been maintaining.
fn month(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let month = parse_month(sub.get_one::<String>("month").unwrap())?;
    let ledger = AggregateLedger::new(store);

    let (total_amount, expense_count, currency) = match ledger.month_aggregate(user, &month)? {
        Some(a) => (a.total_amount, a.expense_count, a.currency),
        None => (Decimal::ZERO, 0, None),
    };
    let names: std::collections::HashMap<Uuid, String> = load_categories(store, user)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let mut categories: Vec<CategorySlice> = ledger
        .category_month_aggregates(user, &month)?
        .into_iter()
        .map(|a| CategorySlice {
            category_id: a.category_id,
            name: names
                .get(&a.category_id)
                .cloned()
                .unwrap_or_else(|| a.category_id.to_string()),
            total_amount: a.total_amount,
            expense_count: a.expense_count,
        })
        .collect();
    categories.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));

    let report = MonthReport {
        month: month.clone(),
        total_amount,
        expense_count,
        currency,
        categories,
    };
    if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        return Ok(());
    }

    let ccy = report.currency.clone().unwrap_or_default();
    println!(
        "{}: {} {} across {} expense(s)",
        report.month,
        report.total_amount.round_dp(2),
        ccy,
        report.expense_count
    );
    let rows: Vec<Vec<String>> = report
        .categories
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                format!("{:.2}", c.total_amount),
                c.expense_count.to_string(),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Category", "Amount", "Count"], rows));
    Ok(())
}
