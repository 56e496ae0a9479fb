// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::categories::{CategoryService, CreateCategoryInput, UpdateCategoryInput};
use crate::store::RecordStore;
use crate::utils::{maybe_print_json, parse_kind, parse_uuid, pretty_table};

pub fn handle(store: &RecordStore, user: &str, m: &clap::ArgMatches) -> Result<()> {
    let svc = CategoryService::new(store);
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = sub.get_one::<String>("name").unwrap().to_string();
            let color = sub.get_one::<String>("color").unwrap().to_string();
            let kind = parse_kind(sub.get_one::<String>("kind").unwrap())?;
            let id = svc.create(user, CreateCategoryInput { name: name.clone(), color, kind })?;
            println!("Added category '{}' ({})", name, id);
        }
        Some(("list", sub)) => {
            let kind = sub
                .get_one::<String>("kind")
                .map(|s| parse_kind(s))
                .transpose()?;
            let cats = svc.list(user, kind, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &cats)? {
                let rows: Vec<Vec<String>> = cats
                    .iter()
                    .map(|c| {
                        vec![
                            c.name.clone(),
                            c.r#type.to_string(),
                            c.color.clone(),
                            if c.is_deleted { "deleted" } else { "active" }.to_string(),
                            c.id.to_string(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Name", "Kind", "Color", "State", "Id"], rows)
                );
            }
        }
        Some(("update", sub)) => {
            let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
            let input = UpdateCategoryInput {
                name: sub.get_one::<String>("name").map(|s| s.to_string()),
                color: sub.get_one::<String>("color").map(|s| s.to_string()),
            };
            svc.update(user, id, input)?;
            println!("Updated category {}", id);
        }
        Some(("rm", sub)) => {
            let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
            svc.delete(user, id, sub.get_flag("cascade"))?;
            println!("Soft-deleted category {}", id);
        }
        Some(("restore", sub)) => {
            let id = parse_uuid(sub.get_one::<String>("id").unwrap())?;
            svc.restore(user, id)?;
            println!("Restored category {}", id);
        }
        _ => {}
    }
    Ok(())
}
