// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use anyhow::{Result, bail};
use uuid::Uuid;

use crate::categories::load_categories;
use crate::expenses::{
    CreateExpenseInput, ExpenseQuery, ExpenseService, ExpenseWindow, UpdateExpenseInput,
};
use crate::models::Expense;
use crate::store::RecordStore;
use crate::utils::{
    fmt_money, maybe_print_json, parse_date, parse_decimal, parse_month, parse_payment_method,
    parse_tags, parse_uuid, pretty_table, resolve_category,
};

pub fn handle(store: &RecordStore, user: &str, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(store, user, sub)?,
        Some(("list", sub)) => list(store, user, sub)?,
        Some(("update", sub)) => update(store, user, sub)?,
        Some(("rm", sub)) => rm(store, user, sub)?,
        Some(("restore", sub)) => restore(store, user, sub)?,
        Some(("show", sub)) => show(store, user, sub)?,
        _ => {}
    }
    Ok(())
}

fn add(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let amount = parse_decimal(sub.get_one::<String>("amount").unwrap())?;
    let currency = sub.get_one::<String>("currency").unwrap().to_uppercase();
    let category_id = resolve_category(store, user, sub.get_one::<String>("category").unwrap())?;
    let date = parse_date(sub.get_one::<String>("date").unwrap())?;
    let description = sub.get_one::<String>("description").map(|s| s.to_string());
    let payment_method = sub
        .get_one::<String>("payment-method")
        .map(|s| parse_payment_method(s))
        .transpose()?;
    let tags = sub.get_one::<String>("tags").map(|s| parse_tags(s));

    let svc = ExpenseService::new(store);
    let id = svc.create(
        user,
        CreateExpenseInput {
            amount,
            currency: currency.clone(),
            category_id,
            description,
            payment_method,
            tags,
            date,
        },
    )?;
    println!("Recorded {} on {} (expense {})", fmt_money(&amount, &currency), date, id);
    Ok(())
}

fn list(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let json_flag = sub.get_flag("json");
    let jsonl_flag = sub.get_flag("jsonl");
    let window = match (
        sub.get_one::<String>("month"),
        sub.get_one::<String>("from"),
        sub.get_one::<String>("to"),
    ) {
        (Some(m), None, None) => ExpenseWindow::Month(parse_month(m)?),
        (None, Some(f), Some(t)) => ExpenseWindow::Range {
            from: parse_date(f)?,
            to: parse_date(t)?,
        },
        _ => bail!("Pass either --month or both --from and --to"),
    };
    let query = ExpenseQuery {
        window,
        limit: sub.get_one::<usize>("limit").copied(),
        cursor: sub.get_one::<String>("cursor").map(|s| s.to_string()),
    };

    let svc = ExpenseService::new(store);
    let page = svc.list(user, query)?;
    if maybe_print_json(json_flag, jsonl_flag, &page)? {
        return Ok(());
    }

    let names = category_names(store, user)?;
    let rows: Vec<Vec<String>> = page.items.iter().map(|e| expense_row(e, &names)).collect();
    println!(
        "{}",
        pretty_table(
            &["Date", "Amount", "Category", "Description", "Payment", "Tags", "Id"],
            rows,
        )
    );
    if let Some(totals) = &page.aggregate_totals {
        println!(
            "Month total: {} across {} expense(s)",
            totals.total_amount, totals.expense_count
        );
    }
    if let Some(cursor) = &page.next_cursor {
        println!("More results: --cursor {}", cursor);
    }
    Ok(())
}

fn update(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
    let category_id = sub
        .get_one::<String>("category")
        .map(|c| resolve_category(store, user, c))
        .transpose()?;
    let input = UpdateExpenseInput {
        amount: sub
            .get_one::<String>("amount")
            .map(|s| parse_decimal(s))
            .transpose()?,
        description: sub.get_one::<String>("description").map(|s| s.to_string()),
        category_id,
        payment_method: sub
            .get_one::<String>("payment-method")
            .map(|s| parse_payment_method(s))
            .transpose()?,
        tags: sub.get_one::<String>("tags").map(|s| parse_tags(s)),
        date: sub
            .get_one::<String>("date")
            .map(|s| parse_date(s))
            .transpose()?,
    };
    let svc = ExpenseService::new(store);
    svc.update(user, id, input)?;
    println!("Updated expense {}", id);
    Ok(())
}

fn rm(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
    let svc = ExpenseService::new(store);
    svc.delete(user, id)?;
    println!("Soft-deleted expense {}", id);
    Ok(())
}

fn restore(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
    let svc = ExpenseService::new(store);
    svc.restore(user, id)?;
    println!("Restored expense {}", id);
    Ok(())
}

fn show(store: &RecordStore, user: &str, sub: &clap::ArgMatches) -> Result<()> {
    let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
    let svc = ExpenseService::new(store);
    let expense = svc.find(user, id)?;
    if maybe_print_json(sub.get_flag("json"), false, &expense)? {
        return Ok(());
    }
    let names = category_names(store, user)?;
    let mut rows = vec![
        vec!["Id".to_string(), expense.id.to_string()],
        vec!["Date".to_string(), expense.date.to_string()],
        vec![
            "Amount".to_string(),
            fmt_money(&expense.amount, &expense.currency),
        ],
        vec!["Category".to_string(), name_of(&names, expense.category_id)],
        vec!["Month".to_string(), expense.month.clone()],
        vec![
            "Description".to_string(),
            expense.description.clone().unwrap_or_default(),
        ],
        vec![
            "Payment".to_string(),
            expense
                .payment_method
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ],
        vec!["Tags".to_string(), tags_of(&expense)],
    ];
    if expense.is_deleted {
        rows.push(vec![
            "Deleted".to_string(),
            expense
                .deleted_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "yes".to_string()),
        ]);
    }
    println!("{}", pretty_table(&["Field", "Value"], rows));
    Ok(())
}

fn category_names(store: &RecordStore, user: &str) -> Result<HashMap<Uuid, String>> {
    let map = load_categories(store, user)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    Ok(map)
}

fn name_of(names: &HashMap<Uuid, String>, id: Uuid) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn tags_of(e: &Expense) -> String {
    e.tags
        .as_ref()
        .map(|t| t.iter().cloned().collect::<Vec<_>>().join(","))
        .unwrap_or_default()
}

fn expense_row(e: &Expense, names: &HashMap<Uuid, String>) -> Vec<String> {
    vec![
        e.date.to_string(),
        fmt_money(&e.amount, &e.currency),
        name_of(names, e.category_id),
        e.description.clone().unwrap_or_default(),
        e.payment_method.map(|p| p.to_string()).unwrap_or_default(),
        tags_of(e),
        e.id.to_string(),
    ]
}
