//! Items query construction.
//!
//! Translates the feed's current inputs (category, free-text search, sort,
//! server-side filter criteria, active columns, page size) into a single
//! [`QuerySpec`]. Building never fails: unparseable filter values are
//! skipped and unknown column kinds fall through to plain equality and
//! plain selection.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};

use super::types::{ColumnDescriptor, ColumnKind, FilterCriterion, QuerySpec, SortSpec};
use crate::config::{Config, CREATED_WINDOW_DAYS};

/// Fields every query selects regardless of the active view, before the
/// configured identifier field and the view's own columns are appended.
const BASELINE_SELECT: &[&str] = &[
    "FileRef",
    "FileDirRef",
    "FSObjType",
    "Title",
    "Id",
    "FileLeafRef",
];

/// Lookup fields every query expands.
const BASELINE_EXPAND: &[&str] = &["Author", "Editor"];

/// Builder for items queries.
pub struct QueryBuilder<'a> {
    config: &'a Config,
    category: String,
    search: String,
    sort: SortSpec,
    criteria: Vec<FilterCriterion>,
    columns: Vec<ColumnDescriptor>,
    page_size: u32,
    now: DateTime<Utc>,
}

impl<'a> QueryBuilder<'a> {
    /// Create a builder for the given category.
    ///
    /// `now` anchors the rolling creation-date window; passing it in keeps
    /// the builder a pure function of its inputs.
    pub fn new(config: &'a Config, category: &str, now: DateTime<Utc>) -> Self {
        Self {
            config,
            category: category.to_string(),
            search: String::new(),
            sort: SortSpec::default(),
            criteria: Vec::new(),
            columns: Vec::new(),
            page_size: config.default_page_size,
            now,
        }
    }

    /// Set the free-text search term.
    pub fn with_search(mut self, search: &str) -> Self {
        self.search = search.to_string();
        self
    }

    /// Set the sort column and direction.
    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    /// Set the active filter criteria. Taxonomy-multi criteria are the
    /// post-filter's business and are ignored here.
    pub fn with_criteria(mut self, criteria: Vec<FilterCriterion>) -> Self {
        self.criteria = criteria;
        self
    }

    /// Set the active view's columns, which drive field selection.
    pub fn with_columns(mut self, columns: Vec<ColumnDescriptor>) -> Self {
        self.columns = columns;
        self
    }

    /// Set the requested page length.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build the query. Deterministic for identical inputs.
    pub fn build(&self) -> QuerySpec {
        QuerySpec {
            select: self.build_select(),
            expand: self.build_expand(),
            filter: self.build_filter(),
            order_by: self.sort.clone(),
            page_size: self.page_size,
        }
    }

    /// Ordered, deduplicated `$select` list: baseline fields, the
    /// identifier field, author/editor, then every active column's
    /// contribution in view order.
    fn build_select(&self) -> Vec<String> {
        let mut select: Vec<String> = BASELINE_SELECT.iter().map(|f| f.to_string()).collect();
        select.push(self.config.id_field.clone());
        select.extend(BASELINE_EXPAND.iter().map(|f| f.to_string()));

        for column in &self.columns {
            match column.kind {
                ColumnKind::User => {
                    push_unique(&mut select, format!("{}/Id", column.internal_name));
                    push_unique(&mut select, format!("{}/Title", column.internal_name));
                }
                _ => push_unique(&mut select, column.internal_name.clone()),
            }
        }

        select
    }

    /// Ordered, deduplicated `$expand` list: author/editor plus the parent
    /// field of every User-typed column.
    fn build_expand(&self) -> Vec<String> {
        let mut expand: Vec<String> = BASELINE_EXPAND.iter().map(|f| f.to_string()).collect();

        for column in &self.columns {
            if column.kind == ColumnKind::User {
                let parent = column
                    .internal_name
                    .split('/')
                    .next()
                    .unwrap_or(&column.internal_name);
                push_unique(&mut expand, parent.to_string());
            }
        }

        expand
    }

    /// Conjunction of category, item type, the optional creation window,
    /// the optional free-text clause, and one clause per active criterion.
    fn build_filter(&self) -> String {
        let mut clauses = vec![
            format!(
                "{} eq '{}'",
                self.config.category_field,
                escape_quotes(&self.category)
            ),
            "FSObjType eq 0".to_string(),
        ];

        // Rolling window unless the category is allowed unbounded history.
        if !self
            .config
            .unbounded_categories
            .iter()
            .any(|c| c == &self.category)
        {
            let floor = self.now - Duration::days(CREATED_WINDOW_DAYS);
            clauses.push(format!("Created ge datetime'{}'", format_instant(floor)));
        }

        if !self.search.is_empty() {
            let text = escape_quotes(&self.search);
            clauses.push(format!(
                "(substringof('{text}', Title) or {} eq '{text}' or substringof('{text}', {}))",
                self.config.id_field, self.config.modified_field
            ));
        }

        for criterion in &self.criteria {
            if !criterion.is_active() || criterion.kind.is_post_filtered() {
                continue;
            }
            if let Some(clause) = criterion_clause(criterion) {
                clauses.push(clause);
            }
        }

        clauses.join(" and ")
    }
}

/// Build the disjunctive clause for one server-side criterion.
///
/// Returns None when no value produced a usable comparison (e.g. every
/// date failed to parse), which simply drops the criterion from the query.
fn criterion_clause(criterion: &FilterCriterion) -> Option<String> {
    let parts: Vec<String> = match &criterion.kind {
        ColumnKind::DateTime => criterion
            .values
            .iter()
            .filter_map(|value| {
                let day = parse_day(value)?;
                let start = day.and_hms_opt(0, 0, 0)?.and_utc();
                let end = start + Duration::days(1);
                Some(format!(
                    "{col} ge datetime'{}' and {col} lt datetime'{}'",
                    format_instant(start),
                    format_instant(end),
                    col = criterion.column,
                ))
            })
            .collect(),
        ColumnKind::User => criterion
            .values
            .iter()
            .map(|value| format!("{}/Id eq '{}'", criterion.column, escape_quotes(value)))
            .collect(),
        ColumnKind::Url => criterion
            .values
            .iter()
            .map(|value| format!("{}/Url eq '{}'", criterion.column, escape_quotes(value)))
            .collect(),
        // Text, Number, Choice, Computed, Taxonomy (single), File, Unknown:
        // direct equality on the raw field.
        _ => criterion
            .values
            .iter()
            .map(|value| format!("{} eq '{}'", criterion.column, escape_quotes(value)))
            .collect(),
    };

    if parts.is_empty() {
        None
    } else {
        Some(format!("({})", parts.join(" or ")))
    }
}

/// Parse a criterion's date value. Accepts a bare date or a full
/// RFC 3339 instant, of which only the date part is kept.
fn parse_day(value: &str) -> Option<NaiveDate> {
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(day);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc().date())
}

/// Render an instant the way the service expects inside `datetime'…'`.
fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Escape a value for interpolation into a quoted literal (`'` doubles).
fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}
