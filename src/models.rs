// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EXPENSE_PREFIX: &str = "EXPENSE#";
pub const CATEGORY_PREFIX: &str = "CATEGORY#";
pub const MONTH_PREFIX: &str = "MONTH#";

/// Partition key holding every record of one user.
pub fn user_partition(user_id: &str) -> String {
    format!("USER#{user_id}")
}

pub fn expense_key(id: Uuid) -> String {
    format!("{EXPENSE_PREFIX}{id}")
}

pub fn category_key(id: Uuid) -> String {
    format!("{CATEGORY_PREFIX}{id}")
}

pub fn month_key(month: &str) -> String {
    format!("{MONTH_PREFIX}{month}")
}

/// Shares the `CATEGORY#` prefix with category records; readers use
/// `entityType` to tell the two apart.
pub fn category_month_key(category_id: Uuid, month: &str) -> String {
    format!("{CATEGORY_PREFIX}{category_id}#{month}")
}

/// Month bucket an expense date falls into.
pub fn month_of(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Expense,
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryKind {
    Expense,
    Income,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CategoryKind::Expense => "EXPENSE",
            CategoryKind::Income => "INCOME",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Uuid,
    pub user_id: String,
    pub entity_type: EntityType,
    pub amount: Decimal,
    pub currency: String, // ISO-4217
    pub category_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    pub date: NaiveDate,
    pub month: String, // YYYY-MM
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    pub fn sort_key(&self) -> String {
        expense_key(self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub color: String,
    pub r#type: CategoryKind,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Category {
    pub fn sort_key(&self) -> String {
        category_key(self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyAggregate {
    pub user_id: String,
    pub month: String, // YYYY-MM
    pub total_amount: Decimal,
    pub expense_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyAggregate {
    pub fn zero(user_id: &str, month: &str, currency: Option<String>) -> Self {
        MonthlyAggregate {
            user_id: user_id.to_string(),
            month: month.to_string(),
            total_amount: Decimal::ZERO,
            expense_count: 0,
            currency,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMonthlyAggregate {
    pub user_id: String,
    pub category_id: Uuid,
    pub month: String, // YYYY-MM
    pub total_amount: Decimal,
    pub expense_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl CategoryMonthlyAggregate {
    pub fn zero(user_id: &str, category_id: Uuid, month: &str) -> Self {
        CategoryMonthlyAggregate {
            user_id: user_id.to_string(),
            category_id,
            month: month.to_string(),
            total_amount: Decimal::ZERO,
            expense_count: 0,
            updated_at: Utc::now(),
        }
    }
}
