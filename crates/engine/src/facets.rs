//! Filter option extraction.
//!
//! Filter panels need the distinct values a column takes. Two sources:
//! locally from already-fetched items (per-kind extraction rules), or the
//! service's filter-data endpoint when the local window is not enough.

use serde_json::Value;

use crate::client::ListClient;
use crate::error::{Error, Result};
use crate::feed::ColumnKind;

/// One selectable filter option: what the user sees, what the query gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetOption {
    pub text: String,
    pub value: String,
}

impl FacetOption {
    fn plain(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            text: value.clone(),
            value,
        }
    }
}

/// Distinct values of a column across the given items, first-seen order.
///
/// Extraction dispatches on the column kind; null and empty values are
/// skipped. Never fails.
pub fn distinct_values(column: &str, kind: &ColumnKind, items: &[Value]) -> Vec<FacetOption> {
    let mut seen: Vec<FacetOption> = Vec::new();
    let mut push = |option: FacetOption| {
        if !option.value.is_empty() && !seen.iter().any(|o| o.value == option.value) {
            seen.push(option);
        }
    };

    for item in items {
        let Some(raw) = item.get(column) else {
            continue;
        };
        match kind {
            ColumnKind::TaxonomyMulti | ColumnKind::Taxonomy => {
                let Some(labels) = raw.as_array() else {
                    continue;
                };
                for label in labels {
                    if let Some(text) = label.get("Label").and_then(Value::as_str) {
                        push(FacetOption::plain(text));
                    }
                }
            }
            ColumnKind::DateTime => {
                if let Some(instant) = raw.as_str() {
                    // Only the date part distinguishes options.
                    let day = instant.split('T').next().unwrap_or(instant);
                    push(FacetOption::plain(day));
                }
            }
            ColumnKind::User => {
                let (Some(title), Some(id)) = (
                    raw.get("Title").and_then(Value::as_str),
                    raw.get("Id").map(scalar_to_string),
                ) else {
                    continue;
                };
                push(FacetOption {
                    text: title.to_string(),
                    value: id,
                });
            }
            ColumnKind::Url => {
                if let Some(url) = raw.get("Url").and_then(Value::as_str) {
                    push(FacetOption::plain(url));
                }
            }
            ColumnKind::Computed => {
                if let Some(text) = raw.as_str() {
                    let stem = text.split('.').next().unwrap_or(text);
                    push(FacetOption::plain(stem));
                }
            }
            // Text, Number, Choice, File, Unknown: the raw value.
            _ => {
                push(FacetOption::plain(scalar_to_string(raw)));
            }
        }
    }

    seen
}

/// Distinct values of a column from the service's filter-data endpoint.
pub async fn filter_data(
    client: &dyn ListClient,
    list_id: &str,
    column: &str,
) -> Result<Vec<FacetOption>> {
    let url = format!(
        "{}/_layouts/15/RenderListFilterData.aspx?FieldInternalName={}&ListId={}",
        client.site_url(),
        urlencoding::encode(column),
        urlencoding::encode(list_id),
    );
    let body = client.get_json(&url).await?;

    let rows = body
        .get("filterData")
        .and_then(Value::as_array)
        .ok_or(Error::MissingField("filterData"))?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let text = row.get("Value").and_then(Value::as_str)?;
            let value = row.get("Key").and_then(Value::as_str)?;
            Some(FacetOption {
                text: text.to_string(),
                value: value.to_string(),
            })
        })
        .collect())
}

/// Render a scalar JSON value without quoting strings.
fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
