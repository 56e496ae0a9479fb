// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version, value_parser};

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print as pretty JSON")
}

fn jsonl_flag() -> Arg {
    Arg::new("jsonl")
        .long("jsonl")
        .action(ArgAction::SetTrue)
        .help("Print as JSON lines")
}

pub fn build_cli() -> Command {
    Command::new("spendlog")
        .version(crate_version!())
        .about("Personal expense ledger with running monthly and per-category totals")
        .arg(
            Arg::new("user")
                .long("user")
                .global(true)
                .help("User partition to operate on (defaults to the stored default user)"),
        )
        .subcommand(Command::new("init").about("Initialize the database"))
        .subcommand(
            Command::new("user")
                .about("Manage the default user")
                .subcommand(
                    Command::new("set-default")
                        .about("Set the default user id")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(Command::new("show").about("Show the default user id")),
        )
        .subcommand(
            Command::new("category")
                .about("Manage categories")
                .subcommand(
                    Command::new("add")
                        .about("Add a category (revives a soft-deleted one with the same name and kind)")
                        .arg(Arg::new("name").long("name").required(true))
                        .arg(Arg::new("color").long("color").required(true))
                        .arg(
                            Arg::new("kind")
                                .long("kind")
                                .default_value("expense")
                                .help("expense|income"),
                        ),
                )
                .subcommand(
                    Command::new("list")
                        .about("List categories")
                        .arg(Arg::new("kind").long("kind").help("expense|income"))
                        .arg(
                            Arg::new("all")
                                .long("all")
                                .action(ArgAction::SetTrue)
                                .help("Include soft-deleted categories"),
                        )
                        .arg(json_flag())
                        .arg(jsonl_flag()),
                )
                .subcommand(
                    Command::new("update")
                        .about("Rename or recolor a category")
                        .arg(Arg::new("id").required(true))
                        .arg(Arg::new("name").long("name"))
                        .arg(Arg::new("color").long("color")),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Soft-delete a category")
                        .arg(Arg::new("id").required(true))
                        .arg(
                            Arg::new("cascade")
                                .long("cascade")
                                .action(ArgAction::SetTrue)
                                .help("Also soft-delete the category's expenses"),
                        ),
                )
                .subcommand(
                    Command::new("restore")
                        .about("Restore a soft-deleted category")
                        .arg(Arg::new("id").required(true)),
                ),
        )
        .subcommand(
            Command::new("expense")
                .about("Manage expenses")
                .subcommand(
                    Command::new("add")
                        .about("Record an expense")
                        .arg(Arg::new("amount").long("amount").required(true))
                        .arg(Arg::new("currency").long("currency").required(true))
                        .arg(
                            Arg::new("category")
                                .long("category")
                                .required(true)
                                .help("Category id or name"),
                        )
                        .arg(Arg::new("date").long("date").required(true).help("YYYY-MM-DD"))
                        .arg(Arg::new("description").long("description"))
                        .arg(
                            Arg::new("payment-method")
                                .long("payment-method")
                                .help("cash|debit_card|credit_card"),
                        )
                        .arg(Arg::new("tags").long("tags").help("Comma-separated tags")),
                )
                .subcommand(
                    Command::new("list")
                        .about("List active expenses in a month or date range")
                        .arg(Arg::new("month").long("month").help("YYYY-MM"))
                        .arg(Arg::new("from").long("from").help("YYYY-MM-DD"))
                        .arg(Arg::new("to").long("to").help("YYYY-MM-DD"))
                        .arg(
                            Arg::new("limit")
                                .long("limit")
                                .value_parser(value_parser!(usize)),
                        )
                        .arg(Arg::new("cursor").long("cursor"))
                        .arg(json_flag())
                        .arg(jsonl_flag()),
                )
                .subcommand(
                    Command::new("update")
                        .about("Update fields of an expense")
                        .arg(Arg::new("id").required(true))
                        .arg(Arg::new("amount").long("amount"))
                        .arg(Arg::new("category").long("category").help("Category id or name"))
                        .arg(Arg::new("date").long("date").help("YYYY-MM-DD"))
                        .arg(Arg::new("description").long("description"))
                        .arg(
                            Arg::new("payment-method")
                                .long("payment-method")
                                .help("cash|debit_card|credit_card"),
                        )
                        .arg(Arg::new("tags").long("tags").help("Comma-separated tags")),
                )
                .subcommand(
                    Command::new("rm")
                        .about("Soft-delete an expense")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    Command::new("restore")
                        .about("Restore a soft-deleted expense")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    Command::new("show")
                        .about("Show one expense, soft-deleted included")
                        .arg(Arg::new("id").required(true))
                        .arg(json_flag()),
                ),
        )
        .subcommand(
            Command::new("report")
                .about("Reports over the stored aggregates")
                .subcommand(
                    Command::new("month")
                        .about("Month total and per-category breakdown")
                        .arg(Arg::new("month").required(true).help("YYYY-MM"))
                        .arg(json_flag())
                        .arg(jsonl_flag()),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export records to a file")
                .subcommand(
                    Command::new("expenses")
                        .about("Export active expenses")
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .required(true)
                                .help("csv|json"),
                        )
                        .arg(Arg::new("out").long("out").required(true)),
                ),
        )
        .subcommand(
            Command::new("doctor")
                .about("Audit stored aggregates against the expense records")
                .arg(
                    Arg::new("fix")
                        .long("fix")
                        .action(ArgAction::SetTrue)
                        .help("Recompute aggregates that drifted"),
                )
                .arg(json_flag()),
        )
}
