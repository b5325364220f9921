// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use carlot_app::{
    DerivedView, GridIntent, HighlightPolicy, Reconciled, Record, RecordStore, ReferenceData,
};
use log::{debug, warn};
use std::sync::Arc;

/// Grid runtime backed by the in-memory record store.
pub struct StoreRuntime {
    store: RecordStore,
    policy: HighlightPolicy,
    total_label: String,
}

impl StoreRuntime {
    pub fn new(store: RecordStore, policy: HighlightPolicy, total_label: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            total_label: total_label.into(),
        }
    }
}

impl carlot_tui::GridRuntime for StoreRuntime {
    fn reference(&self) -> Arc<ReferenceData> {
        self.store.shared_reference()
    }

    fn highlight_policy(&self) -> HighlightPolicy {
        self.policy
    }

    fn total_label(&self) -> String {
        self.total_label.clone()
    }

    fn load_rows(&mut self) -> Result<(Vec<Record>, DerivedView)> {
        let rows = self.store.snapshot().to_vec();
        let derived = DerivedView::build(&rows, &self.policy);
        debug!(
            "event=rows_loaded module=runtime status=ok count={} total={}",
            rows.len(),
            derived.total
        );
        Ok((rows, derived))
    }

    fn apply_intent(&mut self, intent: GridIntent) -> Result<Reconciled> {
        let action = intent_action(&intent);
        match carlot_app::apply_intent(&mut self.store, &self.policy, intent) {
            Ok(reconciled) => {
                debug!(
                    "event=intent_applied module=runtime status=ok action={} records={} highlighted={}",
                    action,
                    self.store.len(),
                    reconciled.view.highlighted.len()
                );
                Ok(reconciled)
            }
            Err(error) => {
                warn!(
                    "event=intent_dropped module=runtime status=error action={} error={}",
                    action, error
                );
                Err(error).with_context(|| format!("{action} rejected"))
            }
        }
    }
}

fn intent_action(intent: &GridIntent) -> &'static str {
    match intent {
        GridIntent::AddRow => "add",
        GridIntent::RemoveRows(_) => "remove",
        GridIntent::CommitEdit(_) => "commit",
    }
}
