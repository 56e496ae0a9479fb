// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod aggregates;
pub mod cascade;
pub mod categories;
pub mod cli;
pub mod commands;
pub mod db;
pub mod errors;
pub mod expenses;
pub mod models;
pub mod store;
pub mod utils;
