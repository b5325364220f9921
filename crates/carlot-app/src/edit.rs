// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Edit-commit protocol between the grid surface and the record store.
//!
//! The grid never writes its own copy of a row. It turns user actions into
//! a [`GridIntent`], hands it to [`apply_intent`], and replays the returned
//! [`RowChange`] onto its row buffer. The store's record is the only value
//! the grid ever shows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{DerivedView, HighlightPolicy, Record, RecordField, RecordId, RecordStore, StoreError};

/// A committed cell edit: which row, which column, and the raw editor text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    pub id: RecordId,
    pub field: RecordField,
    pub raw: String,
}

impl CellEdit {
    pub fn new(id: RecordId, field: RecordField, raw: impl Into<String>) -> Self {
        Self {
            id,
            field,
            raw: raw.into(),
        }
    }

    /// Builds the edit from the surface's full post-edit row.
    pub fn from_row(row: &Record, field: RecordField) -> Self {
        Self {
            id: row.id,
            field,
            raw: row.raw_value(field),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridIntent {
    AddRow,
    RemoveRows(BTreeSet<RecordId>),
    CommitEdit(CellEdit),
}

/// Row transaction the surface applies verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowChange {
    Inserted { index: usize, record: Record },
    Removed { ids: BTreeSet<RecordId> },
    Replaced { record: Record },
}

impl RowChange {
    pub fn apply_to(&self, rows: &mut Vec<Record>) {
        match self {
            Self::Inserted { index, record } => {
                let index = (*index).min(rows.len());
                rows.insert(index, record.clone());
            }
            Self::Removed { ids } => rows.retain(|row| !ids.contains(&row.id)),
            Self::Replaced { record } => {
                if let Some(row) = rows.iter_mut().find(|row| row.id == record.id) {
                    *row = record.clone();
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciled {
    pub change: RowChange,
    pub view: DerivedView,
}

/// Runs one intent against the store and rebuilds the derived view.
///
/// On error the store is untouched and no change is produced.
pub fn apply_intent(
    store: &mut RecordStore,
    policy: &HighlightPolicy,
    intent: GridIntent,
) -> Result<Reconciled, StoreError> {
    let change = match intent {
        GridIntent::AddRow => RowChange::Inserted {
            index: 0,
            record: store.add(),
        },
        GridIntent::RemoveRows(ids) => {
            store.remove(&ids);
            RowChange::Removed { ids }
        }
        GridIntent::CommitEdit(edit) => RowChange::Replaced {
            record: store.update_field(edit.id, edit.field, &edit.raw)?,
        },
    };

    Ok(Reconciled {
        change,
        view: DerivedView::build(store.snapshot(), policy),
    })
}
