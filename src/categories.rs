// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::BTreeSet;

use chrono::Utc;
use log::debug;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::aggregates::{AggregateLedger, scan_expenses};
use crate::cascade::CascadeOrchestrator;
use crate::errors::LedgerError;
use crate::models::{
    CATEGORY_PREFIX, Category, CategoryKind, EntityType, Expense, category_key, user_partition,
};
use crate::store::{RecordStore, WriteOp};

#[derive(Debug, Clone)]
pub struct CreateCategoryInput {
    pub name: String,
    pub color: String,
    pub kind: CategoryKind,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub color: Option<String>,
}

pub struct CategoryService<'a> {
    store: &'a RecordStore,
    ledger: AggregateLedger<'a>,
    cascade: CascadeOrchestrator<'a>,
}

impl<'a> CategoryService<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        CategoryService {
            store,
            ledger: AggregateLedger::new(store),
            cascade: CascadeOrchestrator::new(store),
        }
    }

    /// Name+kind is unique among active categories. A soft-deleted match is
    /// revived in place, keeping its id, instead of minting a duplicate.
    pub fn create(&self, user_id: &str, input: CreateCategoryInput) -> Result<Uuid, LedgerError> {
        let name = validate_name(&input.name)?;
        let color = validate_color(&input.color)?;

        let existing = load_categories(self.store, user_id)?;
        if existing
            .iter()
            .any(|c| !c.is_deleted && c.name == name && c.r#type == input.kind)
        {
            return Err(LedgerError::CategoryAlreadyExists(name));
        }
        if let Some(dead) = existing
            .iter()
            .find(|c| c.is_deleted && c.name == name && c.r#type == input.kind)
        {
            let mut fields = Map::new();
            fields.insert("isDeleted".to_string(), Value::Bool(false));
            fields.insert("deletedAt".to_string(), Value::Null);
            fields.insert("color".to_string(), Value::String(color));
            fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
            self.store.execute(
                &user_partition(user_id),
                WriteOp::Merge {
                    sk: dead.sort_key(),
                    fields,
                },
            )?;
            debug!("revived category {} as '{}'", dead.id, name);
            return Ok(dead.id);
        }

        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            entity_type: EntityType::Category,
            name,
            color,
            r#type: input.kind,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store.execute(
            &user_partition(user_id),
            WriteOp::PutIfAbsent {
                sk: category.sort_key(),
                item: serde_json::to_value(&category)?,
            },
        )?;
        Ok(category.id)
    }

    /// Partial update of name and color. Renames keep name+kind unique
    /// among active categories.
    pub fn update(
        &self,
        user_id: &str,
        id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<(), LedgerError> {
        if input.name.is_none() && input.color.is_none() {
            return Err(LedgerError::Validation("no fields to update".to_string()));
        }
        let current = self.require_active(user_id, id)?;
        let mut fields = Map::new();
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        if let Some(raw) = input.name {
            let name = validate_name(&raw)?;
            if name != current.name {
                let taken = load_categories(self.store, user_id)?.into_iter().any(|c| {
                    c.id != id && !c.is_deleted && c.name == name && c.r#type == current.r#type
                });
                if taken {
                    return Err(LedgerError::CategoryAlreadyExists(name));
                }
            }
            fields.insert("name".to_string(), Value::String(name));
        }
        if let Some(raw) = input.color {
            fields.insert("color".to_string(), Value::String(validate_color(&raw)?));
        }
        self.store.execute(
            &user_partition(user_id),
            WriteOp::Merge {
                sk: current.sort_key(),
                fields,
            },
        )?;
        Ok(())
    }

    /// Soft delete, refusing while active expenses reference the category
    /// unless `cascade` is set, in which case the orchestrator soft-deletes
    /// them first and the category record goes last.
    pub fn delete(&self, user_id: &str, id: Uuid, cascade: bool) -> Result<(), LedgerError> {
        let category = self.require_active(user_id, id)?;
        let active: Vec<Expense> = scan_expenses(self.store, user_id)?
            .into_iter()
            .filter(|e| !e.is_deleted && e.category_id == id)
            .collect();
        if active.is_empty() {
            return self.soft_delete_record(user_id, &category);
        }
        if !cascade {
            return Err(LedgerError::CategoryHasExpenses {
                id,
                count: active.len(),
            });
        }
        self.cascade.run(user_id, &category, &active)
    }

    /// Brings a soft-deleted category back and recomputes the aggregates of
    /// every month it ever touched. Expenses removed by an earlier cascade
    /// stay deleted.
    pub fn restore(&self, user_id: &str, id: Uuid) -> Result<(), LedgerError> {
        let category =
            load_category(self.store, user_id, id)?.ok_or(LedgerError::CategoryNotFound(id))?;
        if !category.is_deleted {
            return Err(LedgerError::CategoryAlreadyActive(id));
        }
        // An active twin created since the delete keeps name+kind unique.
        let taken = load_categories(self.store, user_id)?.into_iter().any(|c| {
            c.id != id && !c.is_deleted && c.name == category.name && c.r#type == category.r#type
        });
        if taken {
            return Err(LedgerError::CategoryAlreadyExists(category.name));
        }

        let mut fields = Map::new();
        fields.insert("isDeleted".to_string(), Value::Bool(false));
        fields.insert("deletedAt".to_string(), Value::Null);
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        self.store.execute(
            &user_partition(user_id),
            WriteOp::Merge {
                sk: category.sort_key(),
                fields,
            },
        )?;

        let touched: BTreeSet<String> = scan_expenses(self.store, user_id)?
            .iter()
            .filter(|e| e.category_id == id)
            .map(|e| e.month.clone())
            .collect();
        self.ledger.recompute_months(user_id, &touched)?;
        let slices: BTreeSet<(Uuid, String)> =
            touched.iter().map(|m| (id, m.clone())).collect();
        self.ledger.recompute_category_months(user_id, &slices)?;
        debug!("restored category {id}");
        Ok(())
    }

    /// Raw fetch by id, soft-deleted records included.
    pub fn find(&self, user_id: &str, id: Uuid) -> Result<Category, LedgerError> {
        load_category(self.store, user_id, id)?.ok_or(LedgerError::CategoryNotFound(id))
    }

    /// Categories sorted by name; active only unless `include_deleted`.
    pub fn list(
        &self,
        user_id: &str,
        kind: Option<CategoryKind>,
        include_deleted: bool,
    ) -> Result<Vec<Category>, LedgerError> {
        let mut cats: Vec<Category> = load_categories(self.store, user_id)?
            .into_iter()
            .filter(|c| include_deleted || !c.is_deleted)
            .filter(|c| kind.is_none_or(|k| c.r#type == k))
            .collect();
        cats.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cats)
    }

    fn require_active(&self, user_id: &str, id: Uuid) -> Result<Category, LedgerError> {
        // Soft-deleted targets read as absent for mutation purposes.
        match load_category(self.store, user_id, id)? {
            Some(c) if !c.is_deleted => Ok(c),
            _ => Err(LedgerError::CategoryNotFound(id)),
        }
    }

    fn soft_delete_record(&self, user_id: &str, category: &Category) -> Result<(), LedgerError> {
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
        debug!("soft-deleted category {}", category.id);
        Ok(())
    }
}

pub(crate) fn load_category(
    store: &RecordStore,
    user_id: &str,
    id: Uuid,
) -> Result<Option<Category>, LedgerError> {
    match store.get(&user_partition(user_id), &category_key(id))? {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

/// Category records of the partition. The shared `CATEGORY#` prefix also
/// holds category-month aggregates; the `entityType` tag filters those out.
pub(crate) fn load_categories(
    store: &RecordStore,
    user_id: &str,
) -> Result<Vec<Category>, LedgerError> {
    let mut out = Vec::new();
    for (_, item) in store.query_prefix(&user_partition(user_id), CATEGORY_PREFIX)? {
        if item.get("entityType").and_then(Value::as_str) == Some("CATEGORY") {
            out.push(serde_json::from_value::<Category>(item)?);
        }
    }
    Ok(out)
}

fn validate_name(name: &str) -> Result<String, LedgerError> {
    let name = name.trim().to_string();
    if name.chars().count() < 2 {
        return Err(LedgerError::Validation(format!(
            "category name '{name}' is too short"
        )));
    }
    Ok(name)
}

fn validate_color(color: &str) -> Result<String, LedgerError> {
    let color = color.trim().to_string();
    if color.is_empty() {
        return Err(LedgerError::Validation("color must not be empty".to_string()));
    }
    Ok(color)
}
