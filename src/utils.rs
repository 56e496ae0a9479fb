// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::categories::load_categories;
use crate::models::{CategoryKind, PaymentMethod};
use crate::store::RecordStore;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_month(s: &str) -> Result<String> {
    chrono::NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
    Ok(s.to_string())
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse::<Uuid>().with_context(|| format!("Invalid id '{}'", s))
}

pub fn parse_payment_method(s: &str) -> Result<PaymentMethod> {
    match s.to_ascii_lowercase().as_str() {
        "cash" => Ok(PaymentMethod::Cash),
        "debit_card" => Ok(PaymentMethod::DebitCard),
        "credit_card" => Ok(PaymentMethod::CreditCard),
        _ => Err(anyhow!(
            "Invalid payment method '{}', expected cash|debit_card|credit_card",
            s
        )),
    }
}

pub fn parse_kind(s: &str) -> Result<CategoryKind> {
    match s.to_ascii_lowercase().as_str() {
        "expense" => Ok(CategoryKind::Expense),
        "income" => Ok(CategoryKind::Income),
        _ => Err(anyhow!(
            "Invalid category type '{}', expected expense|income",
            s
        )),
    }
}

pub fn parse_tags(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {}", ccy, d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

// Default user settings
pub fn get_default_user(store: &RecordStore) -> Result<String> {
    let v = store.get_setting("default_user")?;
    Ok(v.unwrap_or_else(|| "default".to_string()))
}

pub fn set_default_user(store: &RecordStore, user_id: &str) -> Result<()> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(anyhow!("User id must not be empty"));
    }
    store.set_setting("default_user", user_id)?;
    Ok(())
}

/// Accepts a category id or the name of an active category.
pub fn resolve_category(store: &RecordStore, user_id: &str, reference: &str) -> Result<Uuid> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return Ok(id);
    }
    let name = reference.trim();
    let cats = load_categories(store, user_id)?;
    cats.iter()
        .find(|c| !c.is_deleted && c.name == name)
        .map(|c| c.id)
        .with_context(|| format!("Category '{}' not found", name))
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
