// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::LedgerError;
use crate::models::{
    CATEGORY_PREFIX, CategoryMonthlyAggregate, EXPENSE_PREFIX, Expense, MONTH_PREFIX,
    MonthlyAggregate, category_month_key, month_key, user_partition,
};
use crate::store::{AggregateDelta, RecordStore, WriteOp};

/// Totals slice embedded in month-windowed expense listings.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotals {
    pub total_amount: Decimal,
    pub expense_count: i64,
}

/// Stored aggregate values that disagree with the expense records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateDrift {
    pub user_id: String,
    pub month: String,
    pub category_id: Option<Uuid>,
    pub stored_total: Decimal,
    pub stored_count: i64,
    pub derived_total: Decimal,
    pub derived_count: i64,
}

impl AggregateDrift {
    pub fn key(&self) -> String {
        match self.category_id {
            Some(id) => category_month_key(id, &self.month),
            None => month_key(&self.month),
        }
    }
}

/// Maintains the running month and category-month totals. Two write
/// strategies: read-free commutative deltas embedded in expense batches,
/// and full recomputation that overwrites an aggregate from the surviving
/// expense records.
pub struct AggregateLedger<'a> {
    store: &'a RecordStore,
}

impl<'a> AggregateLedger<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        AggregateLedger { store }
    }

    /// Delta op against the user's month aggregate, for embedding in an
    /// expense write batch. `currency` is recorded only if the aggregate
    /// has none yet.
    pub fn month_delta(
        &self,
        user_id: &str,
        month: &str,
        currency: Option<&str>,
        amount: Decimal,
        count: i64,
    ) -> Result<WriteOp, LedgerError> {
        let seed = MonthlyAggregate::zero(user_id, month, currency.map(str::to_string));
        Ok(WriteOp::AddAggregate {
            sk: month_key(month),
            seed: serde_json::to_value(&seed)?,
            delta: AggregateDelta { amount, count },
        })
    }

    /// Delta op against one category's slice of the month.
    pub fn category_month_delta(
        &self,
        user_id: &str,
        category_id: Uuid,
        month: &str,
        amount: Decimal,
        count: i64,
    ) -> Result<WriteOp, LedgerError> {
        let seed = CategoryMonthlyAggregate::zero(user_id, category_id, month);
        Ok(WriteOp::AddAggregate {
            sk: category_month_key(category_id, month),
            seed: serde_json::to_value(&seed)?,
            delta: AggregateDelta { amount, count },
        })
    }

    /// Recomputes the month aggregate from the active expense records and
    /// overwrites it wholesale. Idempotent; rerunning after a partial
    /// failure converges. The read-then-overwrite is not fenced against a
    /// concurrent incremental delta on the same aggregate, so a concurrent
    /// writer can lose that delta until the next recomputation.
    pub fn recompute_month(
        &self,
        user_id: &str,
        month: &str,
    ) -> Result<MonthlyAggregate, LedgerError> {
        let expenses = scan_expenses(self.store, user_id)?;
        let (total, count) = sum_active(
            expenses
                .iter()
                .filter(|e| !e.is_deleted && e.month == month),
        );
        let pk = user_partition(user_id);
        let sk = month_key(month);
        // A previously recorded currency survives recomputation.
        let currency = match self.store.get(&pk, &sk)? {
            Some(v) => serde_json::from_value::<MonthlyAggregate>(v)?.currency,
            None => None,
        };
        let agg = MonthlyAggregate {
            user_id: user_id.to_string(),
            month: month.to_string(),
            total_amount: total,
            expense_count: count,
            currency,
            updated_at: Utc::now(),
        };
        self.store.execute(
            &pk,
            WriteOp::Put {
                sk: sk.clone(),
                item: serde_json::to_value(&agg)?,
            },
        )?;
        debug!("recomputed {sk}: total {total}, count {count}");
        Ok(agg)
    }

    /// Recomputes one category's slice of a month. Same overwrite and
    /// concurrency behavior as `recompute_month`.
    pub fn recompute_category_month(
        &self,
        user_id: &str,
        category_id: Uuid,
        month: &str,
    ) -> Result<CategoryMonthlyAggregate, LedgerError> {
        let expenses = scan_expenses(self.store, user_id)?;
        let (total, count) = sum_active(expenses.iter().filter(|e| {
            !e.is_deleted && e.month == month && e.category_id == category_id
        }));
        let pk = user_partition(user_id);
        let sk = category_month_key(category_id, month);
        let agg = CategoryMonthlyAggregate {
            user_id: user_id.to_string(),
            category_id,
            month: month.to_string(),
            total_amount: total,
            expense_count: count,
            updated_at: Utc::now(),
        };
        self.store.execute(
            &pk,
            WriteOp::Put {
                sk: sk.clone(),
                item: serde_json::to_value(&agg)?,
            },
        )?;
        debug!("recomputed {sk}: total {total}, count {count}");
        Ok(agg)
    }

    pub fn recompute_months(
        &self,
        user_id: &str,
        months: &BTreeSet<String>,
    ) -> Result<(), LedgerError> {
        for month in months {
            self.recompute_month(user_id, month)?;
        }
        Ok(())
    }

    pub fn recompute_category_months(
        &self,
        user_id: &str,
        slices: &BTreeSet<(Uuid, String)>,
    ) -> Result<(), LedgerError> {
        for (category_id, month) in slices {
            self.recompute_category_month(user_id, *category_id, month)?;
        }
        Ok(())
    }

    pub fn month_aggregate(
        &self,
        user_id: &str,
        month: &str,
    ) -> Result<Option<MonthlyAggregate>, LedgerError> {
        let pk = user_partition(user_id);
        match self.store.get(&pk, &month_key(month))? {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Totals for a month. An aggregate that was never written reads the
    /// same as one whose expenses were all removed: zero.
    pub fn month_totals(&self, user_id: &str, month: &str) -> Result<AggregateTotals, LedgerError> {
        Ok(match self.month_aggregate(user_id, month)? {
            Some(a) => AggregateTotals {
                total_amount: a.total_amount,
                expense_count: a.expense_count,
            },
            None => AggregateTotals {
                total_amount: Decimal::ZERO,
                expense_count: 0,
            },
        })
    }

    /// Per-category slices recorded for a month, category id order.
    pub fn category_month_aggregates(
        &self,
        user_id: &str,
        month: &str,
    ) -> Result<Vec<CategoryMonthlyAggregate>, LedgerError> {
        let pk = user_partition(user_id);
        let mut out = Vec::new();
        for (_, item) in self.store.query_prefix(&pk, CATEGORY_PREFIX)? {
            if item.get("entityType").is_some() {
                continue; // category record, not an aggregate
            }
            let agg: CategoryMonthlyAggregate = serde_json::from_value(item)?;
            if agg.month == month {
                out.push(agg);
            }
        }
        Ok(out)
    }

    /// Compares every stored aggregate of the partition against totals
    /// derived from the expense records. An aggregate that was never
    /// created counts as drift only when active expenses exist for it.
    pub fn audit_partition(&self, user_id: &str) -> Result<Vec<AggregateDrift>, LedgerError> {
        let pk = user_partition(user_id);
        let expenses = scan_expenses(self.store, user_id)?;

        let mut derived_months: BTreeMap<String, (Decimal, i64)> = BTreeMap::new();
        let mut derived_slices: BTreeMap<(Uuid, String), (Decimal, i64)> = BTreeMap::new();
        for e in &expenses {
            derived_months.entry(e.month.clone()).or_default();
            derived_slices
                .entry((e.category_id, e.month.clone()))
                .or_default();
        }
        for e in expenses.iter().filter(|e| !e.is_deleted) {
            let slot = derived_months.entry(e.month.clone()).or_default();
            slot.0 += e.amount;
            slot.1 += 1;
            let slot = derived_slices
                .entry((e.category_id, e.month.clone()))
                .or_default();
            slot.0 += e.amount;
            slot.1 += 1;
        }

        let mut stored_months: BTreeMap<String, (Decimal, i64)> = BTreeMap::new();
        for (_, item) in self.store.query_prefix(&pk, MONTH_PREFIX)? {
            let agg: MonthlyAggregate = serde_json::from_value(item)?;
            stored_months.insert(agg.month.clone(), (agg.total_amount, agg.expense_count));
        }
        let mut stored_slices: BTreeMap<(Uuid, String), (Decimal, i64)> = BTreeMap::new();
        for (_, item) in self.store.query_prefix(&pk, CATEGORY_PREFIX)? {
            if item.get("entityType").is_some() {
                continue;
            }
            let agg: CategoryMonthlyAggregate = serde_json::from_value(item)?;
            stored_slices.insert(
                (agg.category_id, agg.month.clone()),
                (agg.total_amount, agg.expense_count),
            );
        }

        let mut drifts = Vec::new();
        let months: BTreeSet<&String> = derived_months.keys().chain(stored_months.keys()).collect();
        for month in months {
            let derived = derived_months
                .get(month)
                .copied()
                .unwrap_or((Decimal::ZERO, 0));
            let stored = stored_months.get(month).copied();
            if stored.is_none() && derived == (Decimal::ZERO, 0) {
                continue; // lazily created, nothing ever wrote it
            }
            let stored = stored.unwrap_or((Decimal::ZERO, 0));
            if stored != derived {
                drifts.push(AggregateDrift {
                    user_id: user_id.to_string(),
                    month: month.clone(),
                    category_id: None,
                    stored_total: stored.0,
                    stored_count: stored.1,
                    derived_total: derived.0,
                    derived_count: derived.1,
                });
            }
        }
        let slices: BTreeSet<&(Uuid, String)> =
            derived_slices.keys().chain(stored_slices.keys()).collect();
        for slice in slices {
            let derived = derived_slices
                .get(slice)
                .copied()
                .unwrap_or((Decimal::ZERO, 0));
            let stored = stored_slices.get(slice).copied();
            if stored.is_none() && derived == (Decimal::ZERO, 0) {
                continue;
            }
            let stored = stored.unwrap_or((Decimal::ZERO, 0));
            if stored != derived {
                drifts.push(AggregateDrift {
                    user_id: user_id.to_string(),
                    month: slice.1.clone(),
                    category_id: Some(slice.0),
                    stored_total: stored.0,
                    stored_count: stored.1,
                    derived_total: derived.0,
                    derived_count: derived.1,
                });
            }
        }
        Ok(drifts)
    }
}

/// Every expense record of the partition, deleted ones included.
pub(crate) fn scan_expenses(
    store: &RecordStore,
    user_id: &str,
) -> Result<Vec<Expense>, LedgerError> {
    let pk = user_partition(user_id);
    let mut out = Vec::new();
    for (_, item) in store.query_prefix(&pk, EXPENSE_PREFIX)? {
        out.push(serde_json::from_value::<Expense>(item)?);
    }
    Ok(out)
}

fn sum_active<'e>(expenses: impl Iterator<Item = &'e Expense>) -> (Decimal, i64) {
    let mut total = Decimal::ZERO;
    let mut count = 0i64;
    for e in expenses {
        total += e.amount;
        count += 1;
    }
    (total, count)
}
