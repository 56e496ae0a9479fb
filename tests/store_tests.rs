// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;
use serde_json::json;

use spendlog::store::{AggregateDelta, MAX_BATCH, RecordStore, StoreError, WriteOp};

fn store() -> RecordStore {
    RecordStore::open_in_memory().unwrap()
}

fn put(sk: &str, item: serde_json::Value) -> WriteOp {
    WriteOp::Put {
        sk: sk.to_string(),
        item,
    }
}

#[test]
fn put_if_absent_rejects_existing_key() {
    let s = store();
    s.execute(
        "USER#u",
        WriteOp::PutIfAbsent {
            sk: "EXPENSE#1".to_string(),
            item: json!({"v": 1}),
        },
    )
    .unwrap();
    let err = s
        .execute(
            "USER#u",
            WriteOp::PutIfAbsent {
                sk: "EXPENSE#1".to_string(),
                item: json!({"v": 2}),
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::ConditionFailed { .. }));
    // The loser did not clobber the stored document.
    let doc = s.get("USER#u", "EXPENSE#1").unwrap().unwrap();
    assert_eq!(doc["v"], 1);
}

#[test]
fn merge_requires_an_existing_row() {
    let s = store();
    let mut fields = serde_json::Map::new();
    fields.insert("a".to_string(), json!(1));
    let err = s
        .execute(
            "USER#u",
            WriteOp::Merge {
                sk: "EXPENSE#missing".to_string(),
                fields,
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::ConditionFailed { .. }));
    assert!(s.get("USER#u", "EXPENSE#missing").unwrap().is_none());
}

#[test]
fn merge_updates_and_removes_fields() {
    let s = store();
    s.execute("USER#u", put("EXPENSE#1", json!({"keep": true, "drop": 1})))
        .unwrap();
    let mut fields = serde_json::Map::new();
    fields.insert("drop".to_string(), serde_json::Value::Null);
    fields.insert("added".to_string(), json!("x"));
    s.execute(
        "USER#u",
        WriteOp::Merge {
            sk: "EXPENSE#1".to_string(),
            fields,
        },
    )
    .unwrap();
    let doc = s.get("USER#u", "EXPENSE#1").unwrap().unwrap();
    assert_eq!(doc, json!({"keep": true, "added": "x"}));
}

#[test]
fn atomic_batch_rolls_back_on_any_failure() {
    let s = store();
    s.execute("USER#u", put("EXPENSE#taken", json!({})))
        .unwrap();
    let ops = vec![
        put("EXPENSE#fresh", json!({})),
        WriteOp::PutIfAbsent {
            sk: "EXPENSE#taken".to_string(),
            item: json!({}),
        },
    ];
    assert!(s.atomic_batch("USER#u", &ops).is_err());
    // The successful first write was rolled back with the failed second.
    assert!(s.get("USER#u", "EXPENSE#fresh").unwrap().is_none());
}

#[test]
fn atomic_batch_rejects_oversized_batches_untouched() {
    let s = store();
    let ops: Vec<WriteOp> = (0..MAX_BATCH + 1)
        .map(|i| put(&format!("EXPENSE#{i}"), json!({})))
        .collect();
    let err = s.atomic_batch("USER#u", &ops).unwrap_err();
    assert!(matches!(err, StoreError::BatchTooLarge(n) if n == MAX_BATCH + 1));
    assert!(s.query_prefix("USER#u", "EXPENSE#").unwrap().is_empty());
}

#[test]
fn query_prefix_is_partition_and_prefix_scoped() {
    let s = store();
    s.execute("USER#a", put("EXPENSE#1", json!({}))).unwrap();
    s.execute("USER#a", put("MONTH#2025-01", json!({}))).unwrap();
    s.execute("USER#b", put("EXPENSE#2", json!({}))).unwrap();

    let rows = s.query_prefix("USER#a", "EXPENSE#").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "EXPENSE#1");
    assert!(s.query_prefix("USER#c", "EXPENSE#").unwrap().is_empty());
}

#[test]
fn query_prefix_orders_by_sort_key() {
    let s = store();
    for sk in ["MONTH#2025-03", "MONTH#2025-01", "MONTH#2025-02"] {
        s.execute("USER#u", put(sk, json!({}))).unwrap();
    }
    let keys: Vec<String> = s
        .query_prefix("USER#u", "MONTH#")
        .unwrap()
        .into_iter()
        .map(|(sk, _)| sk)
        .collect();
    assert_eq!(keys, ["MONTH#2025-01", "MONTH#2025-02", "MONTH#2025-03"]);
}

#[test]
fn add_aggregate_seeds_then_accumulates() {
    let s = store();
    let seed = json!({
        "userId": "u",
        "month": "2025-01",
        "totalAmount": "0",
        "expenseCount": 0,
        "currency": "USD",
        "updatedAt": "2025-01-01T00:00:00Z"
    });
    let delta = |amount: &str, count: i64| WriteOp::AddAggregate {
        sk: "MONTH#2025-01".to_string(),
        seed: seed.clone(),
        delta: AggregateDelta {
            amount: amount.parse::<Decimal>().unwrap(),
            count,
        },
    };
    s.execute("USER#u", delta("100", 1)).unwrap();
    s.execute("USER#u", delta("50.25", 1)).unwrap();
    s.execute("USER#u", delta("-50.25", -1)).unwrap();

    let doc = s.get("USER#u", "MONTH#2025-01").unwrap().unwrap();
    let total: Decimal = doc["totalAmount"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, Decimal::from(100));
    assert_eq!(doc["expenseCount"], 1);
    assert_eq!(doc["currency"], "USD");
}

#[test]
fn add_aggregate_keeps_the_first_currency() {
    let s = store();
    let op = |ccy: &str| WriteOp::AddAggregate {
        sk: "MONTH#2025-01".to_string(),
        seed: json!({
            "userId": "u",
            "month": "2025-01",
            "totalAmount": "0",
            "expenseCount": 0,
            "currency": ccy,
            "updatedAt": "2025-01-01T00:00:00Z"
        }),
        delta: AggregateDelta {
            amount: Decimal::ONE,
            count: 1,
        },
    };
    s.execute("USER#u", op("EUR")).unwrap();
    s.execute("USER#u", op("USD")).unwrap();
    let doc = s.get("USER#u", "MONTH#2025-01").unwrap().unwrap();
    assert_eq!(doc["currency"], "EUR");
}

#[test]
fn settings_round_trip_and_overwrite() {
    let s = store();
    assert!(s.get_setting("default_user").unwrap().is_none());
    s.set_setting("default_user", "alice").unwrap();
    s.set_setting("default_user", "bob").unwrap();
    assert_eq!(s.get_setting("default_user").unwrap().as_deref(), Some("bob"));
}
