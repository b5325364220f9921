// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const BUILTIN_MAKES: [(&str, &[&str]); 6] = [
    ("Toyota", &["Corolla", "Prius", "Supra"]),
    ("Ford", &["Fiesta", "Mondeo", "Focus"]),
    ("Porsche", &["911", "Boxster", "Cayman"]),
    ("현대", &["아반떼", "소나타", "그랜저"]),
    ("기아", &["레이", "K5", "EV6"]),
    ("오즈코딩", &["AI", "UI", "FRONTEND", "BACKEND", "FULLSTACK"]),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("reference data needs at least one category")]
    NoCategories,
    #[error("category {0:?} is listed more than once")]
    DuplicateCategory(String),
    #[error("subcategories are given for {0:?}, which is not in the category list")]
    UndeclaredCategory(String),
}

/// Valid categories and, per category, the valid subcategories.
///
/// Built once at startup and shared read-only. Lookups never fail: an
/// unknown category simply has no subcategories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceData {
    categories: Vec<String>,
    subcategories: BTreeMap<String, Vec<String>>,
}

impl ReferenceData {
    pub fn new(
        categories: Vec<String>,
        subcategories: BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ReferenceError> {
        if categories.is_empty() {
            return Err(ReferenceError::NoCategories);
        }

        let mut seen = BTreeSet::new();
        for category in &categories {
            if !seen.insert(category.as_str()) {
                return Err(ReferenceError::DuplicateCategory(category.clone()));
            }
        }

        if let Some(orphan) = subcategories
            .keys()
            .find(|category| !seen.contains(category.as_str()))
        {
            return Err(ReferenceError::UndeclaredCategory(orphan.clone()));
        }

        Ok(Self {
            categories,
            subcategories,
        })
    }

    /// The vehicle makes and models the app ships with.
    pub fn builtin() -> Self {
        let categories = BUILTIN_MAKES
            .iter()
            .map(|(make, _)| (*make).to_owned())
            .collect();
        let subcategories = BUILTIN_MAKES
            .iter()
            .map(|(make, models)| {
                (
                    (*make).to_owned(),
                    models.iter().map(|model| (*model).to_owned()).collect(),
                )
            })
            .collect();
        Self {
            categories,
            subcategories,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn first_category(&self) -> &str {
        self.categories.first().map(String::as_str).unwrap_or("")
    }

    pub fn subcategories_for(&self, category: &str) -> &[String] {
        self.subcategories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn first_subcategory(&self, category: &str) -> &str {
        self.subcategories_for(category)
            .first()
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_valid_pair(&self, category: &str, subcategory: &str) -> bool {
        let allowed = self.subcategories_for(category);
        if allowed.is_empty() {
            return subcategory.is_empty();
        }
        allowed.iter().any(|candidate| candidate == subcategory)
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}
