//! Feed engine types.
//!
//! Provides type definitions for the paged filtered fetch engine:
//! - ColumnKind: tagged dispatch over the service's declared field types
//! - FilterCriterion: one active filter on one column
//! - QuerySpec: a fully derived items query (select/expand/filter/order/top)
//! - PageResult / LoadOutcome: what a single fetch produced

use serde_json::Value;

/// Declared type of a list column.
///
/// Parsed from the service's type tag strings. Unknown tags map to
/// [`ColumnKind::Unknown`], which falls through to the default
/// equality/selection strategy everywhere it is dispatched on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
    Choice,
    DateTime,
    User,
    Url,
    Computed,
    /// Multi-value taxonomy field; filtered locally, never server-side.
    TaxonomyMulti,
    /// Single-value taxonomy field.
    Taxonomy,
    File,
    /// Unrecognized type tag, kept verbatim for diagnostics.
    Unknown(String),
}

impl ColumnKind {
    /// Parse a declared type tag.
    pub fn from_type_tag(tag: &str) -> Self {
        match tag {
            "Text" | "Note" => ColumnKind::Text,
            "Number" | "Integer" | "Counter" => ColumnKind::Number,
            "Choice" | "MultiChoice" => ColumnKind::Choice,
            "DateTime" => ColumnKind::DateTime,
            "User" => ColumnKind::User,
            "URL" => ColumnKind::Url,
            "Computed" => ColumnKind::Computed,
            "TaxonomyFieldTypeMulti" => ColumnKind::TaxonomyMulti,
            "TaxonomyFieldType" => ColumnKind::Taxonomy,
            "File" => ColumnKind::File,
            other => ColumnKind::Unknown(other.to_string()),
        }
    }

    /// Whether criteria on this kind are applied locally after each page
    /// instead of inside the server query.
    pub fn is_post_filtered(&self) -> bool {
        matches!(self, ColumnKind::TaxonomyMulti)
    }
}

/// One active filter on one column.
///
/// An empty value set means the criterion is inactive and should be
/// removed. At most one criterion per column is ever active within a
/// filter class (server-side vs taxonomy); replacing is the caller's
/// concern, enforced by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriterion {
    /// Internal name of the field being filtered.
    pub column: String,

    /// Declared type of the field, driving clause construction.
    pub kind: ColumnKind,

    /// Selected values, OR'd within the criterion.
    pub values: Vec<String>,
}

impl FilterCriterion {
    pub fn is_active(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Keyword used in the `$orderby` clause.
    pub fn as_odata(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Sort specification: column + direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: "Created".to_string(),
            direction: SortDirection::Desc,
        }
    }
}

/// A column of the selected view.
///
/// Sourced once per view selection and regenerated when the view changes;
/// immutable in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub internal_name: String,
    pub display_name: String,
    pub kind: ColumnKind,
    pub min_width: u32,
    pub max_width: u32,
}

/// A fully derived items query. Pure function of its inputs; never
/// persisted, rebuilt whenever a fresh first page is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Fields to `$select`, ordered, deduplicated.
    pub select: Vec<String>,

    /// Lookup fields to `$expand`, ordered, deduplicated.
    pub expand: Vec<String>,

    /// Rendered `$filter` expression.
    pub filter: String,

    /// `$orderby` column + direction.
    pub order_by: SortSpec,

    /// Requested page length (`$top`).
    pub page_size: u32,
}

impl QuerySpec {
    /// Render the absolute items URL for this query.
    ///
    /// Only the filter and orderby values need percent-encoding; select
    /// and expand are plain identifier lists.
    pub fn to_url(&self, site_url: &str, list_title: &str) -> String {
        format!(
            "{}?$select={}&$expand={}&$filter={}&$top={}&$orderby={}%20{}",
            crate::client::items_url(site_url, list_title),
            self.select.join(","),
            self.expand.join(","),
            urlencoding::encode(&self.filter),
            self.page_size,
            urlencoding::encode(&self.order_by.field),
            self.order_by.direction.as_odata(),
        )
    }
}

/// What a single page fetch produced, before local post-filtering.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Raw records of this page, in server order.
    pub items: Vec<Value>,

    /// Continuation link for the next page, followed verbatim. Absent
    /// when the service has nothing further.
    pub next_cursor: Option<String>,
}

/// Outcome of a `load_more` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged; `appended` counts the records that
    /// survived local post-filtering.
    Loaded { appended: usize },

    /// A fetch was already outstanding; this trigger was ignored, not
    /// queued.
    AlreadyFetching,

    /// The response arrived after a reset and was dropped.
    Stale,

    /// No cursor and the feed is already primed: nothing left to fetch.
    NothingMore,
}
