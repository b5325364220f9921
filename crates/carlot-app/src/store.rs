// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::{Record, RecordField, RecordId, ReferenceData, parse_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record {0} not found -- the grid is out of sync with the store")]
    NotFound(RecordId),
    #[error("record id {0} is used by more than one seed record")]
    DuplicateId(RecordId),
    #[error("record id {0} leaves no room for a larger id")]
    IdOutOfRange(RecordId),
}

/// Authoritative, ordered collection of listing records.
///
/// Every mutation goes through here, and every record handed back has
/// already had its category/subcategory pair resolved against the reference
/// data.
#[derive(Debug, Clone)]
pub struct RecordStore {
    reference: Arc<ReferenceData>,
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            reference,
            records: Vec::new(),
        }
    }

    pub fn with_records<I>(reference: Arc<ReferenceData>, records: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut seen = BTreeSet::new();
        let mut seeded = Vec::new();
        for mut record in records {
            if record.id.get() == i64::MAX {
                return Err(StoreError::IdOutOfRange(record.id));
            }
            if !seen.insert(record.id) {
                return Err(StoreError::DuplicateId(record.id));
            }
            if !record.amount.is_finite() {
                record.amount = 0.0;
            }
            resolve_dependent_fields(&mut record, None, &reference);
            seeded.push(record);
        }

        debug!(
            "event=store_seeded module=store status=ok count={}",
            seeded.len()
        );
        Ok(Self {
            reference,
            records: seeded,
        })
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn shared_reference(&self) -> Arc<ReferenceData> {
        Arc::clone(&self.reference)
    }

    pub fn snapshot(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seeding rejects `i64::MAX`, so the increment cannot overflow.
    pub fn next_id(&self) -> RecordId {
        let max = self
            .records
            .iter()
            .map(|record| record.id.get())
            .fold(0, i64::max);
        RecordId::new(max + 1)
    }

    /// Inserts a default record at the head and returns it.
    pub fn add(&mut self) -> Record {
        let category = self.reference.first_category().to_owned();
        let subcategory = self.reference.first_subcategory(&category).to_owned();
        let record = Record::new(self.next_id(), category, subcategory, 0.0);
        self.records.insert(0, record.clone());

        debug!(
            "event=record_added module=store status=ok id={}",
            record.id
        );
        record
    }

    /// Drops every record in `ids`; unknown ids are ignored.
    pub fn remove(&mut self, ids: &BTreeSet<RecordId>) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !ids.contains(&record.id));
        let removed = before - self.records.len();

        debug!(
            "event=records_removed module=store status=ok requested={} removed={}",
            ids.len(),
            removed
        );
        removed
    }

    /// Writes one field and returns the fully resolved record.
    ///
    /// The caller must render the returned record, not its own edited copy:
    /// a category change also rewrites the subcategory.
    pub fn update_field(
        &mut self,
        id: RecordId,
        field: RecordField,
        raw: &str,
    ) -> Result<Record, StoreError> {
        let index = self
            .records
            .iter()
            .position(|record| record.id == id)
            .ok_or(StoreError::NotFound(id))?;

        let mut candidate = self.records[index].clone();
        match field {
            RecordField::Category => candidate.category = raw.to_owned(),
            RecordField::Subcategory => candidate.subcategory = raw.to_owned(),
            RecordField::Amount => candidate.amount = parse_amount(raw),
        }
        resolve_dependent_fields(&mut candidate, Some(field), &self.reference);

        self.records[index] = candidate.clone();
        debug!(
            "event=record_updated module=store status=ok id={} field={}",
            id,
            field.as_str()
        );
        Ok(candidate)
    }
}

/// Restores the category/subcategory invariant on a record.
///
/// A category edit always resets the subcategory to the first one listed
/// for the new category, even when the old value would still be valid.
/// Otherwise an invalid subcategory falls back to that first entry. Unknown
/// categories resolve to an empty subcategory.
pub fn resolve_dependent_fields(
    record: &mut Record,
    edited: Option<RecordField>,
    reference: &ReferenceData,
) {
    let reset = edited == Some(RecordField::Category)
        || !reference.is_valid_pair(&record.category, &record.subcategory);
    if reset {
        let first = reference.first_subcategory(&record.category);
        if record.subcategory != first {
            record.subcategory = first.to_owned();
        }
    }
}
