// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use crate::store::RecordStore;
use crate::utils::{get_default_user, set_default_user};

pub fn handle(store: &RecordStore, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-default", sub)) => {
            let id = sub.get_one::<String>("id").unwrap();
            set_default_user(store, id)?;
            println!("Default user set to '{}'", id.trim());
        }
        Some(("show", _)) => {
            println!("{}", get_default_user(store)?);
        }
        _ => {}
    }
    Ok(())
}
