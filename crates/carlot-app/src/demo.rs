// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Record, RecordId};

const DEMO_LISTINGS: [(i64, &str, &str, f64); 4] = [
    (1, "Toyota", "Corolla", 35_000.0),
    (2, "Ford", "Mondeo", 32_000.0),
    (3, "Porsche", "Boxster", 72_000.0),
    (4, "오즈코딩", "AI", 172_000_000.0),
];

/// The four listings `--demo` starts with.
pub fn demo_records() -> Vec<Record> {
    DEMO_LISTINGS
        .iter()
        .map(|(id, make, model, price)| Record::new(RecordId::new(*id), *make, *model, *price))
        .collect()
}
