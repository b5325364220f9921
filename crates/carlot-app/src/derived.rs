// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Record, RecordId};

pub const DEFAULT_HIGHLIGHT_THRESHOLD: f64 = 100_000_000.0;
pub const DEFAULT_TOTAL_LABEL: &str = "total";
pub const HIGHLIGHT_MARKER: &str = "💸";

const MAX_FRACTION_DIGITS: usize = 3;

/// Sum of every amount, using Neumaier compensation so cancelling values
/// give the same result in any order.
pub fn total(records: &[Record]) -> f64 {
    let (sum, compensation) = records
        .iter()
        .fold((0.0_f64, 0.0_f64), |(sum, compensation), record| {
            let next = sum + record.amount;
            let lost = if sum.abs() >= record.amount.abs() {
                (sum - next) + record.amount
            } else {
                (record.amount - next) + sum
            };
            (next, compensation + lost)
        });
    sum + compensation
}

pub fn is_highlighted(amount: f64, threshold: f64) -> bool {
    amount >= threshold
}

/// Canonical text to number coercion for the amount column.
///
/// Everything except digits, `-` and `.` is dropped before parsing, so
/// `"1,234,000원"` reads as `1234000`. Anything that still does not parse to
/// a finite number becomes `0`.
pub fn parse_amount(input: &str) -> f64 {
    let cleaned = input
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '-' || *ch == '.')
        .collect::<String>();
    if cleaned.is_empty() {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        // -0 collapses to 0 as well
        Ok(value) if value.is_finite() && value != 0.0 => value,
        _ => 0.0,
    }
}

/// Comma-grouped display form; at most three fraction digits, no trailing zeros.
pub fn format_amount(amount: f64) -> String {
    if !amount.is_finite() {
        return "0".to_owned();
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');
    let is_zero = whole.bytes().all(|byte| byte == b'0') && fraction.is_empty();

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if amount.is_sign_negative() && !is_zero {
        out.push('-');
    }
    out.push_str(&comma_group(whole));
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn comma_group(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    let mut chars = digits.chars().collect::<Vec<_>>();
    let mut count = 0usize;
    while let Some(ch) = chars.pop() {
        if count == 3 {
            out.push(',');
            count = 0;
        }
        out.push(ch);
        count += 1;
    }
    out.chars().rev().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmountClass {
    Normal,
    Highlighted,
}

/// Presentation-only classification of amounts. Never touches stored data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightPolicy {
    pub threshold: f64,
}

impl Default for HighlightPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_HIGHLIGHT_THRESHOLD,
        }
    }
}

impl HighlightPolicy {
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, amount: f64) -> AmountClass {
        if is_highlighted(amount, self.threshold) {
            AmountClass::Highlighted
        } else {
            AmountClass::Normal
        }
    }

    pub fn decorate(&self, amount: f64) -> String {
        let formatted = format_amount(amount);
        match self.classify(amount) {
            AmountClass::Highlighted => format!("{HIGHLIGHT_MARKER} {formatted}"),
            AmountClass::Normal => formatted,
        }
    }
}

/// The synthetic trailing row the grid pins below the data rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedView {
    pub total: f64,
    pub highlighted: BTreeSet<RecordId>,
}

impl DerivedView {
    pub fn build(records: &[Record], policy: &HighlightPolicy) -> Self {
        let highlighted = records
            .iter()
            .filter(|record| policy.classify(record.amount) == AmountClass::Highlighted)
            .map(|record| record.id)
            .collect();
        Self {
            total: total(records),
            highlighted,
        }
    }

    pub fn is_row_highlighted(&self, id: RecordId) -> bool {
        self.highlighted.contains(&id)
    }

    pub fn summary_row(&self, label: &str) -> SummaryRow {
        SummaryRow {
            label: label.to_owned(),
            amount: self.total,
        }
    }
}
