// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

use crate::ids::RecordId;

/// One listing row: a make (category), a model (subcategory) and a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub category: String,
    pub subcategory: String,
    pub amount: f64,
}

impl Record {
    pub fn new(
        id: RecordId,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            id,
            category: category.into(),
            subcategory: subcategory.into(),
            amount,
        }
    }

    /// Text form of a field as the edit surface would hand it back.
    pub fn raw_value(&self, field: RecordField) -> String {
        match field {
            RecordField::Category => self.category.clone(),
            RecordField::Subcategory => self.subcategory.clone(),
            RecordField::Amount => self.amount.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordField {
    Category,
    Subcategory,
    Amount,
}

impl RecordField {
    pub const ALL: [Self; 3] = [Self::Category, Self::Subcategory, Self::Amount];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Amount => "amount",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Category => "make",
            Self::Subcategory => "model",
            Self::Amount => "price",
        }
    }

    pub const fn editor(self) -> EditorKind {
        match self {
            Self::Category => EditorKind::FixedChoice,
            Self::Subcategory => EditorKind::DependentChoice,
            Self::Amount => EditorKind::Text,
        }
    }
}

/// Which cell editor the grid should open for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorKind {
    /// Choices come from the category list.
    FixedChoice,
    /// Choices depend on the row's current category.
    DependentChoice,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Nav,
    Edit(RecordField),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}
