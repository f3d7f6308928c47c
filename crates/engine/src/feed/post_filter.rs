//! Local taxonomy post-filtering.
//!
//! Multi-value taxonomy fields cannot be expressed in the server query, so
//! their criteria are applied here after each page arrives. The filter is
//! purely local: it never touches the cursor or the page-full heuristic,
//! which are computed from the raw page.

use serde_json::Value;

use super::types::FilterCriterion;

/// Keep the items satisfying every taxonomy criterion.
///
/// AND across criteria; within one criterion, OR across its selected
/// values, each compared by exact string match against the labels of the
/// item's field. An item whose field is missing or not array-valued fails
/// the criterion (fail-closed: absent structured data is non-matching,
/// not a wildcard).
pub fn apply(items: Vec<Value>, criteria: &[FilterCriterion]) -> Vec<Value> {
    let active: Vec<&FilterCriterion> = criteria.iter().filter(|c| c.is_active()).collect();
    if active.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| active.iter().all(|criterion| matches(item, criterion)))
        .collect()
}

/// Whether one item satisfies one criterion.
fn matches(item: &Value, criterion: &FilterCriterion) -> bool {
    let Some(labels) = item.get(&criterion.column).and_then(Value::as_array) else {
        return false;
    };

    criterion.values.iter().any(|wanted| {
        labels
            .iter()
            .any(|label| label.get("Label").and_then(Value::as_str) == Some(wanted.as_str()))
    })
}
