//! Per-session widget store.
//!
//! Maps a widget key to its last known state. The store is mutated by the
//! active run's publish path and by the session handler's input-merge step;
//! the two can overlap in wall-clock time during supersession, so every
//! operation is a single critical section behind one mutex. No check-then-
//! act spans the lock boundary.

use std::sync::Mutex;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::script::{CellId, StartCell};
use crate::widgets::{Widget, WidgetKind, WidgetValue};

/// Stored record for a widget key: the widget plus the cell and output slot
/// that produced it. The metadata drives both rerun targeting and output
/// ordering.
#[derive(Debug, Clone)]
pub struct WidgetState {
    pub widget: Widget,
    pub cell_id: CellId,
    pub cell_index: usize,
    pub widget_index: u32,
}

impl WidgetState {
    pub fn new(widget: Widget, cell_id: CellId, cell_index: usize, widget_index: u32) -> Self {
        Self {
            widget,
            cell_id,
            cell_index,
            widget_index,
        }
    }

    /// Wire representation.
    pub fn to_record(&self) -> WidgetStateRecord {
        WidgetStateRecord {
            widget_key: self.widget.key().to_string(),
            widget_type: self.widget.kind(),
            cell_id: self.cell_id,
            cell_index: self.cell_index,
            widget_index: self.widget_index,
            value: self.widget.value(),
        }
    }
}

/// One entry of an outbound `WIDGET_STATES` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetStateRecord {
    pub widget_key: String,
    pub widget_type: WidgetKind,
    pub cell_id: CellId,
    pub cell_index: usize,
    pub widget_index: u32,
    pub value: WidgetValue,
}

/// One entry of an inbound `WIDGET_STATE_UPDATE` batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetUpdate {
    pub widget_key: String,
    pub value: WidgetValue,
}

/// Per-session map from widget key to its latest known state.
///
/// A key maps to at most one state at a time; a later put with the same key
/// replaces the value and re-derives the cell/slot metadata.
#[derive(Debug, Default)]
pub struct WidgetStore {
    inner: Mutex<FxHashMap<String, WidgetState>>,
}

impl WidgetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known state for a key.
    pub fn get(&self, key: &str) -> Option<WidgetState> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    /// Insert or replace the state stored under the widget's key.
    pub fn put(&self, state: WidgetState) {
        self.inner
            .lock()
            .unwrap()
            .insert(state.widget.key().to_string(), state);
    }

    /// All states in output order: slot index first, then cell index, so
    /// widgets keep their visual position across reruns even when only a
    /// subset of cells executed.
    pub fn snapshot(&self) -> Vec<WidgetStateRecord> {
        let mut records: Vec<WidgetStateRecord> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .map(WidgetState::to_record)
            .collect();
        records.sort_by(|a, b| {
            (a.widget_index, a.cell_index).cmp(&(b.widget_index, b.cell_index))
        });
        records
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Merge an inbound update batch in one critical section.
    ///
    /// Updates for unknown keys, with unchanged values, or with a value of
    /// the wrong kind are skipped; stale client state racing the server is
    /// expected, not an error. Returns the earliest cell that produced any
    /// changed widget, or `None` when nothing changed and no rerun is
    /// needed.
    pub fn apply_updates(&self, updates: &[WidgetUpdate]) -> Option<StartCell> {
        let mut inner = self.inner.lock().unwrap();
        let mut earliest: Option<StartCell> = None;

        for update in updates {
            let Some(state) = inner.get_mut(&update.widget_key) else {
                tracing::debug!(key = %update.widget_key, "update for unknown widget key skipped");
                continue;
            };

            let previous = state.widget.value();
            let mut changed = state.widget.clone();
            if !changed.set_value(&update.value) {
                tracing::debug!(key = %update.widget_key, "update with mismatched value kind skipped");
                continue;
            }
            if changed.value() == previous {
                tracing::debug!(key = %update.widget_key, "unchanged widget value skipped");
                continue;
            }

            state.widget = changed;
            if earliest.is_none_or(|start| state.cell_index < start.cell_index) {
                earliest = Some(StartCell {
                    cell_id: state.cell_id,
                    cell_index: state.cell_index,
                });
            }
        }

        earliest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(key: &str, cell_index: usize, widget_index: u32) -> WidgetState {
        WidgetState::new(
            Widget::TextInput {
                key: key.to_string(),
                label: key.to_string(),
                value: "initial".to_string(),
            },
            CellId::fresh(),
            cell_index,
            widget_index,
        )
    }

    fn update(key: &str, value: &str) -> WidgetUpdate {
        WidgetUpdate {
            widget_key: key.to_string(),
            value: WidgetValue::Text(value.to_string()),
        }
    }

    #[test]
    fn put_replaces_state_for_key() {
        let store = WidgetStore::new();
        store.put(state("a", 0, 1));
        store.put(state("a", 2, 3));

        assert_eq!(store.len(), 1);
        let stored = store.get("a").unwrap();
        assert_eq!(stored.cell_index, 2);
        assert_eq!(stored.widget_index, 3);
    }

    #[test]
    fn snapshot_orders_by_slot_then_cell() {
        let store = WidgetStore::new();
        store.put(state("third", 2, 2));
        store.put(state("first", 1, 1));
        store.put(state("second", 2, 1));

        let snapshot = store.snapshot();
        let keys: Vec<&str> = snapshot.iter().map(|r| r.widget_key.as_str()).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn apply_updates_returns_earliest_changed_cell() {
        let store = WidgetStore::new();
        store.put(state("a", 0, 1));
        store.put(state("b", 2, 1));

        let start = store
            .apply_updates(&[update("b", "x"), update("a", "y")])
            .unwrap();
        assert_eq!(start.cell_index, 0);
        assert_eq!(
            store.get("a").unwrap().widget.value(),
            WidgetValue::Text("y".to_string())
        );
    }

    #[test]
    fn identical_values_do_not_request_a_rerun() {
        let store = WidgetStore::new();
        store.put(state("a", 0, 1));

        assert!(store.apply_updates(&[update("a", "initial")]).is_none());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let store = WidgetStore::new();
        store.put(state("a", 0, 1));

        assert!(store.apply_updates(&[update("ghost", "x")]).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn mismatched_value_kind_is_ignored() {
        let store = WidgetStore::new();
        store.put(state("a", 0, 1));

        let bad = WidgetUpdate {
            widget_key: "a".to_string(),
            value: WidgetValue::Bool(true),
        };
        assert!(store.apply_updates(&[bad]).is_none());
        assert_eq!(
            store.get("a").unwrap().widget.value(),
            WidgetValue::Text("initial".to_string())
        );
    }

    #[test]
    fn record_serializes_with_camel_case_fields() {
        let record = state("a", 1, 2).to_record();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["widgetKey"], "a");
        assert_eq!(json["widgetType"], "TEXT_INPUT");
        assert_eq!(json["cellIndex"], 1);
        assert_eq!(json["widgetIndex"], 2);
        assert_eq!(json["value"], "initial");
    }
}
