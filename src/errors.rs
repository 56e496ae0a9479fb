// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Failures surfaced by expense and category lifecycle operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("expense {0} not found")]
    ExpenseNotFound(Uuid),
    #[error("category {0} not found")]
    CategoryNotFound(Uuid),
    #[error("category {0} is missing, deleted, or not an expense category")]
    CategoryInvalid(Uuid),
    #[error("category {0} is deleted; restore it before restoring its expenses")]
    CategoryDeleted(Uuid),
    #[error("category '{0}' already exists")]
    CategoryAlreadyExists(String),
    #[error("expense {0} is not deleted")]
    ExpenseAlreadyActive(Uuid),
    #[error("category {0} is not deleted")]
    CategoryAlreadyActive(Uuid),
    #[error("category {id} has {count} active expense(s); use cascade to delete them too")]
    CategoryHasExpenses { id: Uuid, count: usize },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}
