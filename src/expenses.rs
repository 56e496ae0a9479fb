// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::aggregates::{AggregateLedger, AggregateTotals, scan_expenses};
use crate::categories::load_category;
use crate::errors::LedgerError;
use crate::models::{
    CategoryKind, EntityType, Expense, expense_key, month_of, user_partition,
};
use crate::store::{RecordStore, WriteOp};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 50;

static CURRENCY_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new("^[A-Z]{3}$").expect("currency pattern"));
static MONTH_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("month pattern"));

#[derive(Debug, Clone)]
pub struct CreateExpenseInput {
    pub amount: Decimal,
    pub currency: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub payment_method: Option<crate::models::PaymentMethod>,
    pub tags: Option<BTreeSet<String>>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateExpenseInput {
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub payment_method: Option<crate::models::PaymentMethod>,
    pub tags: Option<BTreeSet<String>>,
    pub date: Option<NaiveDate>,
}

impl UpdateExpenseInput {
    fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.payment_method.is_none()
            && self.tags.is_none()
            && self.date.is_none()
    }
}

#[derive(Debug, Clone)]
pub enum ExpenseWindow {
    Month(String), // YYYY-MM
    Range { from: NaiveDate, to: NaiveDate },
}

impl ExpenseWindow {
    fn contains(&self, e: &Expense) -> bool {
        match self {
            ExpenseWindow::Month(m) => e.month == *m,
            ExpenseWindow::Range { from, to } => e.date >= *from && e.date <= *to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpenseQuery {
    pub window: ExpenseWindow,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpensePage {
    pub items: Vec<Expense>,
    /// Stored month totals; only month windows have a backing aggregate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_totals: Option<AggregateTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

pub struct ExpenseService<'a> {
    store: &'a RecordStore,
    ledger: AggregateLedger<'a>,
}

impl<'a> ExpenseService<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        ExpenseService {
            store,
            ledger: AggregateLedger::new(store),
        }
    }

    /// Writes the expense record and the incremental deltas against its
    /// month and category-month aggregates in one atomic batch.
    pub fn create(&self, user_id: &str, input: CreateExpenseInput) -> Result<Uuid, LedgerError> {
        validate_amount(input.amount)?;
        validate_currency(&input.currency)?;
        validate_date(input.date)?;
        self.require_expense_category(user_id, input.category_id)?;

        let now = Utc::now();
        let month = month_of(input.date);
        let expense = Expense {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            entity_type: EntityType::Expense,
            amount: input.amount,
            currency: input.currency.clone(),
            category_id: input.category_id,
            description: normalize_text(input.description),
            payment_method: input.payment_method,
            tags: normalize_tags(input.tags),
            date: input.date,
            month: month.clone(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let ops = vec![
            WriteOp::PutIfAbsent {
                sk: expense.sort_key(),
                item: serde_json::to_value(&expense)?,
            },
            self.ledger
                .month_delta(user_id, &month, Some(&input.currency), input.amount, 1)?,
            self.ledger.category_month_delta(
                user_id,
                input.category_id,
                &month,
                input.amount,
                1,
            )?,
        ];
        self.store.atomic_batch(&user_partition(user_id), &ops)?;
        debug!("created expense {} in {month}", expense.id);
        Ok(expense.id)
    }

    /// Partial update. Amount edits that stay within the original month and
    /// category ride the read-free delta path in one batch with the field
    /// merge; a month or category change instead merges the fields and then
    /// fully recomputes every touched aggregate, migrating the contribution
    /// out of the old bucket.
    pub fn update(
        &self,
        user_id: &str,
        id: Uuid,
        input: UpdateExpenseInput,
    ) -> Result<(), LedgerError> {
        if input.is_empty() {
            return Err(LedgerError::Validation("no fields to update".to_string()));
        }
        let current = self.require_active(user_id, id)?;

        if let Some(amount) = input.amount {
            validate_amount(amount)?;
        }
        if let Some(date) = input.date {
            validate_date(date)?;
        }
        let new_category = match input.category_id {
            Some(c) if c != current.category_id => {
                self.require_expense_category(user_id, c)?;
                Some(c)
            }
            _ => None,
        };

        let new_amount = input.amount.unwrap_or(current.amount);
        let new_date = input.date.unwrap_or(current.date);
        let new_month = month_of(new_date);
        let category_id = new_category.unwrap_or(current.category_id);
        let month_changed = new_month != current.month;
        let category_changed = category_id != current.category_id;

        let mut fields = Map::new();
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        if let Some(amount) = input.amount {
            fields.insert("amount".to_string(), serde_json::to_value(amount)?);
        }
        if let Some(raw) = input.description {
            match normalize_text(Some(raw)) {
                Some(desc) => fields.insert("description".to_string(), Value::String(desc)),
                None => {
                    return Err(LedgerError::Validation(
                        "description must not be empty".to_string(),
                    ));
                }
            };
        }
        if let Some(pm) = input.payment_method {
            fields.insert("paymentMethod".to_string(), serde_json::to_value(pm)?);
        }
        if let Some(tags) = input.tags {
            match normalize_tags(Some(tags)) {
                Some(t) => fields.insert("tags".to_string(), serde_json::to_value(t)?),
                None => fields.insert("tags".to_string(), Value::Null), // clears the field
            };
        }
        if let Some(date) = input.date {
            fields.insert("date".to_string(), serde_json::to_value(date)?);
            if month_changed {
                fields.insert("month".to_string(), Value::String(new_month.clone()));
            }
        }
        if let Some(c) = new_category {
            fields.insert("categoryId".to_string(), serde_json::to_value(c)?);
        }

        let pk = user_partition(user_id);
        let sk = current.sort_key();
        if month_changed || category_changed {
            self.store.execute(&pk, WriteOp::Merge { sk, fields })?;
            let mut months = BTreeSet::new();
            months.insert(current.month.clone());
            months.insert(new_month.clone());
            self.ledger.recompute_months(user_id, &months)?;
            let mut slices = BTreeSet::new();
            slices.insert((current.category_id, current.month.clone()));
            slices.insert((category_id, new_month));
            self.ledger.recompute_category_months(user_id, &slices)?;
        } else {
            let delta = new_amount - current.amount;
            let mut ops = vec![WriteOp::Merge { sk, fields }];
            if delta != Decimal::ZERO {
                ops.push(
                    self.ledger
                        .month_delta(user_id, &current.month, None, delta, 0)?,
                );
                ops.push(self.ledger.category_month_delta(
                    user_id,
                    current.category_id,
                    &current.month,
                    delta,
                    0,
                )?);
            }
            self.store.atomic_batch(&pk, &ops)?;
        }
        Ok(())
    }

    /// Soft delete followed by full recomputation of the expense's month
    /// and category-month aggregates.
    pub fn delete(&self, user_id: &str, id: Uuid) -> Result<(), LedgerError> {
        let expense = self.require_active(user_id, id)?;
        let now = Utc::now();
        let mut fields = Map::new();
        fields.insert("isDeleted".to_string(), Value::Bool(true));
        fields.insert("deletedAt".to_string(), serde_json::to_value(now)?);
        fields.insert("updatedAt".to_string(), serde_json::to_value(now)?);
        self.store.execute(
            &user_partition(user_id),
            WriteOp::Merge {
                sk: expense.sort_key(),
                fields,
            },
        )?;
        self.ledger.recompute_month(user_id, &expense.month)?;
        self.ledger
            .recompute_category_month(user_id, expense.category_id, &expense.month)?;
        debug!("soft-deleted expense {id}");
        Ok(())
    }

    /// Brings a soft-deleted expense back. The category is checked before
    /// anything is written: an expense cannot come back active under a
    /// deleted category.
    pub fn restore(&self, user_id: &str, id: Uuid) -> Result<(), LedgerError> {
        let expense =
            load_expense(self.store, user_id, id)?.ok_or(LedgerError::ExpenseNotFound(id))?;
        if !expense.is_deleted {
            return Err(LedgerError::ExpenseAlreadyActive(id));
        }
        let category = load_category(self.store, user_id, expense.category_id)?
            .ok_or(LedgerError::CategoryNotFound(expense.category_id))?;
        if category.is_deleted {
            return Err(LedgerError::CategoryDeleted(category.id));
        }
        let mut fields = Map::new();
        fields.insert("isDeleted".to_string(), Value::Bool(false));
        fields.insert("deletedAt".to_string(), Value::Null);
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        self.store.execute(
            &user_partition(user_id),
            WriteOp::Merge {
                sk: expense.sort_key(),
                fields,
            },
        )?;
        self.ledger.recompute_month(user_id, &expense.month)?;
        self.ledger
            .recompute_category_month(user_id, expense.category_id, &expense.month)?;
        debug!("restored expense {id}");
        Ok(())
    }

    /// Raw fetch by id, soft-deleted records included.
    pub fn find(&self, user_id: &str, id: Uuid) -> Result<Expense, LedgerError> {
        load_expense(self.store, user_id, id)?.ok_or(LedgerError::ExpenseNotFound(id))
    }

    /// Active expenses in a month or date-range window, newest first, with
    /// cursor pagination. Month windows also carry the stored month totals.
    pub fn list(&self, user_id: &str, query: ExpenseQuery) -> Result<ExpensePage, LedgerError> {
        let limit = match query.limit {
            None => DEFAULT_LIMIT,
            Some(n) if (1..=MAX_LIMIT).contains(&n) => n,
            Some(n) => {
                return Err(LedgerError::Validation(format!(
                    "limit must be between 1 and {MAX_LIMIT}, got {n}"
                )));
            }
        };
        match &query.window {
            ExpenseWindow::Month(m) => validate_month(m)?,
            ExpenseWindow::Range { from, to } => {
                if from > to {
                    return Err(LedgerError::Validation(format!(
                        "'from' {from} is after 'to' {to}"
                    )));
                }
            }
        }

        let mut items: Vec<Expense> = scan_expenses(self.store, user_id)?
            .into_iter()
            .filter(|e| !e.is_deleted && query.window.contains(e))
            .collect();
        items.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));

        let start = match &query.cursor {
            Some(cursor) => {
                let cursor_id: Uuid = cursor.parse().map_err(|_| {
                    LedgerError::Validation(format!("malformed cursor '{cursor}'"))
                })?;
                let pos = items
                    .iter()
                    .position(|e| e.id == cursor_id)
                    .ok_or_else(|| LedgerError::Validation(format!("stale cursor '{cursor}'")))?;
                pos + 1
            }
            None => 0,
        };
        let page: Vec<Expense> = items.iter().skip(start).take(limit).cloned().collect();
        let next_cursor = if start + page.len() < items.len() {
            page.last().map(|e| e.id.to_string())
        } else {
            None
        };
        let aggregate_totals = match &query.window {
            ExpenseWindow::Month(m) => Some(self.ledger.month_totals(user_id, m)?),
            ExpenseWindow::Range { .. } => None,
        };
        Ok(ExpensePage {
            items: page,
            aggregate_totals,
            next_cursor,
        })
    }

    fn require_active(&self, user_id: &str, id: Uuid) -> Result<Expense, LedgerError> {
        // Soft-deleted targets read as absent for mutation purposes.
        match load_expense(self.store, user_id, id)? {
            Some(e) if !e.is_deleted => Ok(e),
            _ => Err(LedgerError::ExpenseNotFound(id)),
        }
    }

    fn require_expense_category(&self, user_id: &str, id: Uuid) -> Result<(), LedgerError> {
        match load_category(self.store, user_id, id)? {
            Some(c) if !c.is_deleted && c.r#type == CategoryKind::Expense => Ok(()),
            _ => Err(LedgerError::CategoryInvalid(id)),
        }
    }
}

pub(crate) fn load_expense(
    store: &RecordStore,
    user_id: &str,
    id: Uuid,
) -> Result<Option<Expense>, LedgerError> {
    match store.get(&user_partition(user_id), &expense_key(id))? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

pub(crate) fn validate_month(month: &str) -> Result<(), LedgerError> {
    if !MONTH_SHAPE.is_match(month) {
        return Err(LedgerError::Validation(format!(
            "month '{month}' must be YYYY-MM"
        )));
    }
    Ok(())
}

fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> Result<(), LedgerError> {
    if !CURRENCY_SHAPE.is_match(currency) {
        return Err(LedgerError::Validation(format!(
            "currency '{currency}' is not an ISO-4217 code"
        )));
    }
    Ok(())
}

fn validate_date(date: NaiveDate) -> Result<(), LedgerError> {
    if date > Utc::now().date_naive() {
        return Err(LedgerError::Validation(format!(
            "date {date} is in the future"
        )));
    }
    Ok(())
}

fn normalize_text(s: Option<String>) -> Option<String> {
    let s = s?.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

fn normalize_tags(tags: Option<BTreeSet<String>>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = tags?
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if set.is_empty() { None } else { Some(set) }
}
