// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use carlot_app::{RecordField, RecordId, RecordStore, ReferenceData, StoreError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub use carlot_app::demo_records;

const RAW_AMOUNTS: [&str; 10] = [
    "35000",
    "1,234,000원",
    "$72,000.50",
    "-50",
    "abc",
    "",
    "172000000",
    "1.2.3",
    "0",
    "9.99",
];

/// Small table where `A` lists `x` before `z` and `B` lists only `y`.
pub fn ab_reference() -> ReferenceData {
    let mut subcategories = BTreeMap::new();
    subcategories.insert("A".to_owned(), vec!["x".to_owned(), "z".to_owned()]);
    subcategories.insert("B".to_owned(), vec!["y".to_owned()]);
    ReferenceData::new(vec!["A".to_owned(), "B".to_owned()], subcategories)
        .expect("static fixture table is valid")
}

/// Table with a category that has no subcategories at all.
pub fn sparse_reference() -> ReferenceData {
    let mut subcategories = BTreeMap::new();
    subcategories.insert("A".to_owned(), vec!["x".to_owned(), "z".to_owned()]);
    ReferenceData::new(vec!["A".to_owned(), "Empty".to_owned()], subcategories)
        .expect("static fixture table is valid")
}

/// Table whose first category has no subcategories, so new records start blank.
pub fn bare_first_reference() -> ReferenceData {
    let mut subcategories = BTreeMap::new();
    subcategories.insert("A".to_owned(), vec!["x".to_owned(), "z".to_owned()]);
    ReferenceData::new(vec!["Empty".to_owned(), "A".to_owned()], subcategories)
        .expect("static fixture table is valid")
}

pub fn demo_store() -> RecordStore {
    RecordStore::with_records(Arc::new(ReferenceData::builtin()), demo_records())
        .expect("demo ids are unique")
}

/// Fails when any record breaks the category/subcategory invariant.
pub fn check_invariant(store: &RecordStore) -> Result<()> {
    let reference = store.reference();
    let mut ids = BTreeSet::new();
    for record in store.snapshot() {
        if !ids.insert(record.id) {
            bail!("record id {} appears twice", record.id);
        }
        if !record.amount.is_finite() {
            bail!("record {} has non-finite amount {}", record.id, record.amount);
        }
        if !reference.is_valid_pair(&record.category, &record.subcategory) {
            bail!(
                "record {} has subcategory {:?}, not valid for category {:?}",
                record.id,
                record.subcategory,
                record.category
            );
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Add,
    Remove(BTreeSet<RecordId>),
    Update {
        id: RecordId,
        field: RecordField,
        raw: String,
    },
}

impl StoreOp {
    pub fn apply(&self, store: &mut RecordStore) -> Result<(), StoreError> {
        match self {
            Self::Add => {
                store.add();
            }
            Self::Remove(ids) => {
                store.remove(ids);
            }
            Self::Update { id, field, raw } => {
                store.update_field(*id, *field, raw)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of store operations for invariant checks.
///
/// Updates draw categories and subcategories from the store's reference
/// data plus a few values that are valid nowhere, and occasionally target
/// ids that do not exist.
#[derive(Debug, Clone)]
pub struct OpFaker {
    rng: DeterministicRng,
    seed: u64,
}

impl OpFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn next_op(&mut self, store: &RecordStore) -> StoreOp {
        let roll = self.rng.int_n(10);
        if store.is_empty() || roll < 2 {
            return StoreOp::Add;
        }
        if roll < 3 {
            return StoreOp::Remove(self.pick_ids(store));
        }

        let id = self.pick_id(store);
        let field = RecordField::ALL[self.rng.int_n(RecordField::ALL.len())];
        let raw = match field {
            RecordField::Category => self.category(store.reference()),
            RecordField::Subcategory => self.subcategory(store),
            RecordField::Amount => RAW_AMOUNTS[self.rng.int_n(RAW_AMOUNTS.len())].to_owned(),
        };
        StoreOp::Update { id, field, raw }
    }

    fn pick_id(&mut self, store: &RecordStore) -> RecordId {
        if self.rng.int_n(12) == 0 {
            return store.next_id();
        }
        let records = store.snapshot();
        records[self.rng.int_n(records.len())].id
    }

    fn pick_ids(&mut self, store: &RecordStore) -> BTreeSet<RecordId> {
        let count = 1 + self.rng.int_n(3);
        (0..count).map(|_| self.pick_id(store)).collect()
    }

    fn category(&mut self, reference: &ReferenceData) -> String {
        if self.rng.int_n(8) == 0 {
            return "Unlisted".to_owned();
        }
        let categories = reference.categories();
        categories[self.rng.int_n(categories.len())].clone()
    }

    fn subcategory(&mut self, store: &RecordStore) -> String {
        let reference = store.reference();
        let category = self.category(reference);
        let choices = reference.subcategories_for(&category);
        if choices.is_empty() || (self.rng.bool() && self.rng.bool()) {
            return "not-a-model".to_owned();
        }
        choices[self.rng.int_n(choices.len())].clone()
    }
}
