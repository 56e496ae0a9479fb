// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;

use chrono::Utc;
use log::{debug, info};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::aggregates::AggregateLedger;
use crate::errors::LedgerError;
use crate::models::{Category, Expense, user_partition};
use crate::store::{MAX_BATCH, RecordStore, WriteOp, chunk_writes};

pub struct CascadeOrchestrator<'a> {
    store: &'a RecordStore,
    ledger: AggregateLedger<'a>,
}

impl<'a> CascadeOrchestrator<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        CascadeOrchestrator {
            store,
            ledger: AggregateLedger::new(store),
        }
    }

    /// Cascading category delete. Soft-deletes the expense set in bounded
    /// batches, recomputes every affected month aggregate and then every
    /// affected category-month aggregate, and soft-deletes the category
    /// record last: a deleted category must never report a stale nonzero
    /// aggregate, and a rerun after a mid-flight failure re-derives the
    /// remaining work from the still-active category.
    pub fn run(
        &self,
        user_id: &str,
        category: &Category,
        expenses: &[Expense],
    ) -> Result<(), LedgerError> {
        let months = self.soft_delete_expenses(user_id, expenses)?;
        self.ledger.recompute_months(user_id, &months)?;
        let slices: BTreeSet<(Uuid, String)> =
            months.iter().map(|m| (category.id, m.clone())).collect();
        self.ledger.recompute_category_months(user_id, &slices)?;

        let now = Utc::now();
        let mut fields = Map::new();
        fields.insert("isDeleted".to_string(), Value::Bool(true));
        fields.insert("deletedAt".to_string(), serde_json::to_value(now)?);
        fields.insert("updatedAt".to_string(), serde_json::to_value(now)?);
        self.store.execute(
            &user_partition(user_id),
            WriteOp::Merge {
                sk: category.sort_key(),
                fields,
            },
        )?;
        info!(
            "cascade-deleted category {} ({} expenses across {} months)",
            category.id,
            expenses.len(),
            months.len()
        );
        Ok(())
    }

    /// Soft-deletes the expenses in chunks of at most `MAX_BATCH` writes,
    /// one atomic batch per chunk, committed sequentially. Returns the
    /// distinct months the set touched. Chunk boundaries are the resume
    /// points: a failure leaves earlier chunks applied and later ones
    /// untouched.
    pub fn soft_delete_expenses(
        &self,
        user_id: &str,
        expenses: &[Expense],
    ) -> Result<BTreeSet<String>, LedgerError> {
        let stamp = serde_json::to_value(Utc::now())?;
        let mut ops = Vec::with_capacity(expenses.len());
        for e in expenses {
            let mut fields = Map::new();
            fields.insert("isDeleted".to_string(), Value::Bool(true));
            fields.insert("deletedAt".to_string(), stamp.clone());
            fields.insert("updatedAt".to_string(), stamp.clone());
            ops.push(WriteOp::Merge {
                sk: e.sort_key(),
                fields,
            });
        }
        let pk = user_partition(user_id);
        let chunks = chunk_writes(ops, MAX_BATCH);
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            self.store.atomic_batch(&pk, chunk)?;
            debug!(
                "cascade chunk {}/{} committed ({} writes)",
                i + 1,
                total,
                chunk.len()
            );
        }
        Ok(expenses.iter().map(|e| e.month.clone()).collect())
    }
}
