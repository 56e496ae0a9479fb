// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, bail};
use serde_json::json;
use uuid::Uuid;

use crate::aggregates::scan_expenses;
use crate::categories::load_categories;
use crate::store::RecordStore;

pub fn handle(store: &RecordStore, user: &str, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("expenses", sub)) => export_expenses(store, user, sub),
        _ => Ok(()),
    }
}

fn export_expenses(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
    let out = sub.get_one::<String>("out").unwrap();
    if fmt != "csv" && fmt != "json" {
        bail!("Unknown format: {} (use csv|json)", fmt);
    }

    let names: std::collections::HashMap<Uuid, String> = load_categories(store, user)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let mut expenses: Vec<_> = scan_expenses(store, user)?
        .into_iter()
        .filter(|e| !e.is_deleted)
        .collect();
    expenses.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

    match fmt.as_str() {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record([
                "date", "amount", "currency", "category", "description", "payment_method", "tags",
            ])?;
            for e in &expenses {
                wtr.write_record([
                    e.date.to_string(),
                    e.amount.to_string(),
                    e.currency.clone(),
                    names
                        .get(&e.category_id)
                        .cloned()
                        .unwrap_or_else(|| e.category_id.to_string()),
                    e.description.clone().unwrap_or_default(),
                    e.payment_method.map(|p| p.to_string()).unwrap_or_default(),
                    e.tags
                        .as_ref()
                        .map(|t| t.iter().cloned().collect::<Vec<_>>().join(","))
                        .unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let mut items = Vec::new();
            for e in &expenses {
                items.push(json!({
                    "date": e.date.to_string(),
                    "amount": e.amount,
                    "currency": e.currency,
                    "category": names.get(&e.category_id).cloned().unwrap_or_else(|| e.category_id.to_string()),
                    "description": e.description,
                    "payment_method": e.payment_method,
                    "tags": e.tags,
                }));
            }
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        _ => unreachable!(),
    }
    println!("Exported {} expense(s) to {}", expenses.len(), out);
    Ok(())
}
