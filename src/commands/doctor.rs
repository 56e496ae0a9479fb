// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::aggregates::{AggregateDrift, AggregateLedger};
use crate::models::user_partition;
use crate::store::RecordStore;
use crate::utils::{maybe_print_json, pretty_table};

/// Compares every stored aggregate against totals re-derived from the
/// expense records. `--user` narrows the audit to one partition; `--fix`
/// heals drifted aggregates through the ordinary recompute path.
pub fn handle(store: &RecordStore, m: &clap::ArgMatches) -> Result<()> {
    let ledger = AggregateLedger::new(store);

    let users: Vec<String> = match m.get_one::<String>("user") {
        Some(u) => vec![u.clone()],
        None => store
            .partitions()?
            .iter()
            .filter_map(|pk| pk.strip_prefix("USER#").map(str::to_string))
            .collect(),
    };

    let mut drifts: Vec<AggregateDrift> = Vec::new();
    for user in &users {
        drifts.extend(ledger.audit_partition(user)?);
    }

    if m.get_flag("fix") {
        for d in &drifts {
            match d.category_id {
                Some(category_id) => {
                    ledger.recompute_category_month(&d.user_id, category_id, &d.month)?;
                }
                None => {
                    ledger.recompute_month(&d.user_id, &d.month)?;
                }
            }
        }
    }

    if maybe_print_json(m.get_flag("json"), false, &drifts)? {
        return Ok(());
    }
    if drifts.is_empty() {
        println!("✅ doctor: no issues found");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = drifts
        .iter()
        .map(|d| {
            vec![
                user_partition(&d.user_id),
                d.key(),
                format!("{} / {}", d.stored_total, d.stored_count),
                format!("{} / {}", d.derived_total, d.derived_count),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Partition", "Aggregate", "Stored (total/count)", "Derived (total/count)"],
            rows,
        )
    );
    if m.get_flag("fix") {
        println!("Recomputed {} drifted aggregate(s)", drifts.len());
    } else {
        println!("Run with --fix to recompute");
    }
    Ok(())
}
