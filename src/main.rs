// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use spendlog::{cli, commands, db, utils};

fn main() -> Result<()> {
    env_logger::init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let store = db::open_or_init()?;
    let user = match matches.get_one::<String>("user") {
        Some(u) => u.clone(),
        None => utils::get_default_user(&store)?,
    };

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("user", sub)) => commands::user::handle(&store, sub)?,
        Some(("category", sub)) => commands::categories::handle(&store, &user, sub)?,
        Some(("expense", sub)) => commands::expenses::handle(&store, &user, sub)?,
        Some(("report", sub)) => commands::report::handle(&store, &user, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&store, &user, sub)?,
        Some(("doctor", sub)) => commands::doctor::handle(&store, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
