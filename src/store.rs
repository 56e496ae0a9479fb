// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Upper bound on writes accepted by one atomic batch. Larger workloads
/// go through `chunk_writes`.
pub const MAX_BATCH: usize = 25;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("write condition failed for '{key}'")]
    ConditionFailed { key: String },
    #[error("batch of {0} writes exceeds the limit of {MAX_BATCH}")]
    BatchTooLarge(usize),
    #[error("corrupt record at '{key}': {detail}")]
    Corrupt { key: String, detail: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

/// One write in a partition-scoped batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Unconditional full-document upsert. Recomputation's overwrite.
    Put { sk: String, item: Value },
    /// Insert that fails the whole batch when the key already exists.
    PutIfAbsent { sk: String, item: Value },
    /// Partial update of an existing document; a `null` value removes the
    /// field. Fails when the target row is absent, so updates never create
    /// ghost records.
    Merge { sk: String, fields: Map<String, Value> },
    /// Read-free commutative delta against an aggregate document. Starts
    /// from `seed` when the row does not exist yet; a currency already on
    /// the stored document is kept (first write wins).
    AddAggregate {
        sk: String,
        seed: Value,
        delta: AggregateDelta,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateDelta {
    pub amount: Decimal,
    pub count: i64,
}

/// Totals fields shared by month and category-month aggregate documents.
/// Identity fields ride along untouched in `rest`.
#[derive(Serialize, Deserialize)]
struct TotalsDoc {
    #[serde(rename = "totalAmount")]
    total_amount: Decimal,
    #[serde(rename = "expenseCount")]
    expense_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    currency: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Wraps an open connection and applies the schema.
    pub fn new(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(RecordStore { conn })
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::new(Connection::open_in_memory()?)
    }

    pub fn get(&self, pk: &str, sk: &str) -> Result<Option<Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT item FROM records WHERE pk=?1 AND sk=?2",
                params![pk, sk],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(parse_item(sk, &text)?)),
            None => Ok(None),
        }
    }

    /// Records of one partition whose sort key starts with `prefix`,
    /// ascending by sort key.
    pub fn query_prefix(
        &self,
        pk: &str,
        prefix: &str,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT sk, item FROM records \
             WHERE pk=?1 AND sk>=?2 AND (?3 IS NULL OR sk<?3) ORDER BY sk",
        )?;
        let upper = prefix_upper(prefix);
        let mut rows = stmt.query(params![pk, prefix, upper])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let sk: String = row.get(0)?;
            let text: String = row.get(1)?;
            let item = parse_item(&sk, &text)?;
            out.push((sk, item));
        }
        Ok(out)
    }

    /// Applies one write in its own transaction.
    pub fn execute(&self, pk: &str, op: WriteOp) -> Result<(), StoreError> {
        self.atomic_batch(pk, std::slice::from_ref(&op))
    }

    /// Applies every write or none of them. Oversized batches are rejected
    /// before any row is touched.
    pub fn atomic_batch(&self, pk: &str, ops: &[WriteOp]) -> Result<(), StoreError> {
        if ops.len() > MAX_BATCH {
            return Err(StoreError::BatchTooLarge(ops.len()));
        }
        let tx = self.conn.unchecked_transaction()?;
        for op in ops {
            apply_op(&tx, pk, op)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Distinct partitions, for whole-store audits.
    pub fn partitions(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT pk FROM records ORDER BY pk")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for pk in rows {
            out.push(pk?);
        }
        Ok(out)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let v = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key=?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(v)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO settings(key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Splits a flat op list into batches the store will accept. The cascade
/// path commits the returned chunks sequentially.
pub fn chunk_writes(ops: Vec<WriteOp>, max: usize) -> Vec<Vec<WriteOp>> {
    let max = max.max(1);
    let mut chunks: Vec<Vec<WriteOp>> = Vec::new();
    let mut current: Vec<WriteOp> = Vec::new();
    for op in ops {
        if current.len() == max {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(op);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS records(
        pk TEXT NOT NULL,
        sk TEXT NOT NULL,
        item TEXT NOT NULL,
        PRIMARY KEY(pk, sk)
    );
    "#,
    )?;
    Ok(())
}

fn apply_op(tx: &rusqlite::Transaction<'_>, pk: &str, op: &WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Put { sk, item } => {
            upsert(tx, pk, sk, &item.to_string())?;
        }
        WriteOp::PutIfAbsent { sk, item } => {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO records(pk, sk, item) VALUES (?1,?2,?3)",
                params![pk, sk, item.to_string()],
            )?;
            if inserted == 0 {
                return Err(StoreError::ConditionFailed { key: sk.clone() });
            }
        }
        WriteOp::Merge { sk, fields } => {
            let text = read_row(tx, pk, sk)?
                .ok_or_else(|| StoreError::ConditionFailed { key: sk.clone() })?;
            let mut doc = parse_item(sk, &text)?;
            let Value::Object(map) = &mut doc else {
                return Err(StoreError::Corrupt {
                    key: sk.clone(),
                    detail: "not a JSON object".to_string(),
                });
            };
            for (k, v) in fields {
                if v.is_null() {
                    map.remove(k);
                } else {
                    map.insert(k.clone(), v.clone());
                }
            }
            tx.execute(
                "UPDATE records SET item=?3 WHERE pk=?1 AND sk=?2",
                params![pk, sk, doc.to_string()],
            )?;
        }
        WriteOp::AddAggregate { sk, seed, delta } => {
            let mut doc: TotalsDoc = match read_row(tx, pk, sk)? {
                Some(text) => {
                    serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
                        key: sk.clone(),
                        detail: e.to_string(),
                    })?
                }
                None => serde_json::from_value(seed.clone()).map_err(|e| StoreError::Corrupt {
                    key: sk.clone(),
                    detail: e.to_string(),
                })?,
            };
            doc.total_amount += delta.amount;
            doc.expense_count += delta.count;
            if doc.currency.is_none() {
                doc.currency = seed
                    .get("currency")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            doc.updated_at = Utc::now();
            let text = serde_json::to_string(&doc).map_err(|e| StoreError::Corrupt {
                key: sk.clone(),
                detail: e.to_string(),
            })?;
            upsert(tx, pk, sk, &text)?;
        }
    }
    Ok(())
}

fn upsert(tx: &rusqlite::Transaction<'_>, pk: &str, sk: &str, text: &str) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO records(pk, sk, item) VALUES (?1,?2,?3) \
         ON CONFLICT(pk, sk) DO UPDATE SET item=excluded.item",
        params![pk, sk, text],
    )?;
    Ok(())
}

fn read_row(
    tx: &rusqlite::Transaction<'_>,
    pk: &str,
    sk: &str,
) -> Result<Option<String>, StoreError> {
    let raw = tx
        .query_row(
            "SELECT item FROM records WHERE pk=?1 AND sk=?2",
            params![pk, sk],
            |r| r.get(0),
        )
        .optional()?;
    Ok(raw)
}

fn parse_item(key: &str, text: &str) -> Result<Value, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        detail: e.to_string(),
    })
}

// Keys are ASCII, so bumping the last byte of the prefix yields the
// exclusive upper bound of the range scan.
fn prefix_upper(prefix: &str) -> Option<String> {
    let mut bytes = prefix.as_bytes().to_vec();
    let last = bytes.last_mut()?;
    *last = last.checked_add(1)?;
    String::from_utf8(bytes).ok()
}
