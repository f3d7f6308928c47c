//! View resolution: a named view into its ordered column descriptors.
//!
//! A view is a server-defined, ordered set of columns. Resolving one takes
//! two steps: fetch the view's field name list, then resolve each field to
//! its display name and declared type tag. Widths come from a fixed
//! override table with 100/200 defaults.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::client::ListClient;
use crate::error::{Error, Result};
use crate::feed::{ColumnDescriptor, ColumnKind};

/// Per-column width overrides: (internal name, min, max).
const WIDTH_OVERRIDES: &[(&str, u32, u32)] = &[
    ("Article_x0020_ID", 60, 80),
    ("Title", 400, 1200),
    ("Categories0", 200, 800),
    ("Modified", 200, 200),
];

const DEFAULT_MIN_WIDTH: u32 = 100;
const DEFAULT_MAX_WIDTH: u32 = 200;

/// Resolves views against one list.
pub struct ViewService {
    client: Arc<dyn ListClient>,
    list_title: String,
}

impl ViewService {
    pub fn new(client: Arc<dyn ListClient>, list_title: &str) -> Self {
        Self {
            client,
            list_title: list_title.to_string(),
        }
    }

    /// Resolve a view into column descriptors, preserving the server's
    /// field order.
    pub async fn columns(&self, view_id: &str) -> Result<Vec<ColumnDescriptor>> {
        let names = self.view_field_names(view_id).await?;
        debug!(view = %view_id, fields = names.len(), "resolving view fields");

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            columns.push(self.resolve_field(name).await?);
        }
        Ok(columns)
    }

    /// Ordered internal field names of a view.
    async fn view_field_names(&self, view_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/_api/web/lists/getByTitle('{}')/Views('{}')/ViewFields",
            self.client.site_url(),
            urlencoding::encode(&self.list_title),
            urlencoding::encode(view_id),
        );
        let body = self.client.get_json(&url).await?;

        let items = body
            .get("Items")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("Items"))?;

        Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Resolve one field to its descriptor.
    async fn resolve_field(&self, internal_name: &str) -> Result<ColumnDescriptor> {
        let url = format!(
            "{}/_api/web/lists/getByTitle('{}')/fields/getByInternalNameOrTitle('{}')",
            self.client.site_url(),
            urlencoding::encode(&self.list_title),
            urlencoding::encode(internal_name),
        );
        let body = self.client.get_json(&url).await?;

        let internal = body
            .get("InternalName")
            .and_then(Value::as_str)
            .unwrap_or(internal_name)
            .to_string();
        let display = body
            .get("Title")
            .and_then(Value::as_str)
            .unwrap_or(internal_name)
            .to_string();
        let kind = body
            .get("TypeAsString")
            .and_then(Value::as_str)
            .map(ColumnKind::from_type_tag)
            .unwrap_or_else(|| ColumnKind::Unknown(String::new()));

        let (min_width, max_width) = widths(&internal);

        Ok(ColumnDescriptor {
            internal_name: internal,
            display_name: display,
            kind,
            min_width,
            max_width,
        })
    }
}

/// Width bounds for a column, from the override table or the defaults.
fn widths(internal_name: &str) -> (u32, u32) {
    WIDTH_OVERRIDES
        .iter()
        .find(|(name, _, _)| *name == internal_name)
        .map(|(_, min, max)| (*min, *max))
        .unwrap_or((DEFAULT_MIN_WIDTH, DEFAULT_MAX_WIDTH))
}

impl std::fmt::Debug for ViewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewService")
            .field("list_title", &self.list_title)
            .finish()
    }
}
