//! Fetch orchestration and feed state.
//!
//! [`PageFeed`] owns the accumulated result set for one hosted view. It
//! issues one page request at a time, merges raw pages through the taxonomy
//! post-filter, and tracks the continuation cursor and the page-full
//! heuristic. Any change to a server-affecting input resets the feed: a
//! changed query is never resumed with an old cursor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::post_filter;
use super::query_builder::QueryBuilder;
use super::types::{
    ColumnDescriptor, FilterCriterion, LoadOutcome, PageResult, SortDirection, SortSpec,
};
use crate::client::ListClient;
use crate::config::Config;
use crate::error::{Error, Result};

/// Inputs that shape the server query and the local post-filter.
#[derive(Debug, Clone)]
pub struct FeedParams {
    pub category: String,
    pub search: String,
    pub sort: SortSpec,
    pub server_filters: Vec<FilterCriterion>,
    pub taxonomy_filters: Vec<FilterCriterion>,
    pub columns: Vec<ColumnDescriptor>,
    pub page_size: u32,
}

/// Accumulated result set.
#[derive(Debug, Default)]
struct FeedState {
    /// Post-filter survivors of every fetched page, in server order.
    items: Vec<Value>,

    /// Continuation link for the next page.
    cursor: Option<String>,

    /// True exactly when the most recent raw page was full-sized.
    has_more: bool,

    /// Count of visible items.
    total: usize,

    /// Whether at least one page was fetched under the current parameters.
    primed: bool,
}

/// Incremental, filtered, paginated list fetcher for one hosted view.
pub struct PageFeed {
    client: Arc<dyn ListClient>,
    config: Config,
    params: Mutex<FeedParams>,
    state: Mutex<FeedState>,

    /// Bumped on every reset; responses issued under an older epoch are
    /// dropped rather than resurrecting a just-reset view.
    epoch: AtomicU64,

    /// Single-flight guard: while a fetch is outstanding, further
    /// load-more triggers are ignored, not queued.
    in_flight: AtomicBool,
}

impl PageFeed {
    /// Create a feed. No request is issued until [`PageFeed::load_more`].
    pub fn new(client: Arc<dyn ListClient>, config: Config) -> Self {
        let page_size = config.default_page_size;
        Self {
            client,
            config,
            params: Mutex::new(FeedParams {
                category: String::new(),
                search: String::new(),
                sort: SortSpec::default(),
                server_filters: Vec::new(),
                taxonomy_filters: Vec::new(),
                columns: Vec::new(),
                page_size,
            }),
            state: Mutex::new(FeedState::default()),
            epoch: AtomicU64::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Select a category. Resets the feed.
    pub fn set_category(&self, category: &str) {
        self.params.lock().category = category.to_string();
        self.reset();
    }

    /// Sort by a column: clicking the current sort column flips its
    /// direction, any other column starts descending. Resets the feed.
    pub fn sort_by(&self, field: &str) {
        {
            let mut params = self.params.lock();
            if params.sort.field == field {
                params.sort.direction = match params.sort.direction {
                    SortDirection::Asc => SortDirection::Desc,
                    SortDirection::Desc => SortDirection::Asc,
                };
            } else {
                params.sort = SortSpec {
                    field: field.to_string(),
                    direction: SortDirection::Desc,
                };
            }
        }
        self.reset();
    }

    /// Submit a free-text search. Resets the feed.
    pub fn submit_search(&self, text: &str) {
        self.params.lock().search = text.to_string();
        self.reset();
    }

    /// Add, replace, or (with an empty value set) remove one criterion.
    ///
    /// Taxonomy-multi criteria route to the local post-filter, everything
    /// else to the server query; either way at most one criterion per
    /// column stays active in its class. Resets the feed.
    pub fn apply_filter(&self, criterion: FilterCriterion) {
        {
            let mut params = self.params.lock();
            let class = if criterion.kind.is_post_filtered() {
                &mut params.taxonomy_filters
            } else {
                &mut params.server_filters
            };
            class.retain(|c| c.column != criterion.column);
            if criterion.is_active() {
                class.push(criterion);
            }
        }
        self.reset();
    }

    /// Drop every active criterion and the search text. Resets the feed.
    pub fn clear_filters(&self) {
        {
            let mut params = self.params.lock();
            params.server_filters.clear();
            params.taxonomy_filters.clear();
            params.search.clear();
        }
        self.reset();
    }

    /// Change the requested page length. Resets the feed.
    pub fn set_page_size(&self, page_size: u32) {
        self.params.lock().page_size = page_size;
        self.reset();
    }

    /// Install the columns of a newly selected view. Resets the feed.
    pub fn set_columns(&self, columns: Vec<ColumnDescriptor>) {
        self.params.lock().columns = columns;
        self.reset();
    }

    /// Clear accumulated items, cursor, and total, and invalidate any
    /// in-flight response. Valid from any state.
    pub fn reset(&self) {
        *self.state.lock() = FeedState::default();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        debug!("feed reset");
    }

    /// Fetch the next page and merge it into the accumulated set.
    ///
    /// First call after a reset builds a fresh query; subsequent calls
    /// follow the stored continuation link verbatim. On failure the
    /// accumulated set and cursor are left untouched.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("fetch already outstanding; load-more ignored");
            return Ok(LoadOutcome::AlreadyFetching);
        }

        let outcome = self.fetch_page().await;
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn fetch_page(&self) -> Result<LoadOutcome> {
        let epoch = self.epoch.load(Ordering::SeqCst);

        // Decide the request under the locks, then drop them: nothing may
        // be held across the await.
        let (url, page_size, taxonomy) = {
            let params = self.params.lock();
            let mut state = self.state.lock();

            if let Some(cursor) = &state.cursor {
                (
                    cursor.clone(),
                    params.page_size,
                    params.taxonomy_filters.clone(),
                )
            } else if state.primed {
                // Last raw page was full but the service offered no
                // continuation: nothing further exists.
                state.has_more = false;
                return Ok(LoadOutcome::NothingMore);
            } else {
                let spec = QueryBuilder::new(&self.config, &params.category, Utc::now())
                    .with_search(&params.search)
                    .with_sort(params.sort.clone())
                    .with_criteria(params.server_filters.clone())
                    .with_columns(params.columns.clone())
                    .with_page_size(params.page_size)
                    .build();
                (
                    spec.to_url(self.client.site_url(), &self.config.pages_list),
                    params.page_size,
                    params.taxonomy_filters.clone(),
                )
            }
        };

        let body = self.client.get_json(&url).await?;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("response outlived its query parameters; dropped");
            return Ok(LoadOutcome::Stale);
        }

        let page = parse_page(&body)?;
        let raw_len = page.items.len();
        // Exact-size heuristic: a last page that exactly fills the page
        // size triggers one extra empty fetch, handled as a normal page.
        let full = raw_len as u32 == page_size;
        let visible = post_filter::apply(page.items, &taxonomy);
        let appended = visible.len();

        let mut state = self.state.lock();
        state.primed = true;
        state.cursor = page.next_cursor;
        state.has_more = full;
        state.items.extend(visible);
        state.total = state.items.len();

        debug!(raw = raw_len, appended = appended, has_more = full, "page merged");
        Ok(LoadOutcome::Loaded { appended })
    }

    /// Snapshot of the visible items, in accumulated order.
    pub fn items(&self) -> Vec<Value> {
        self.state.lock().items.clone()
    }

    /// Count of visible items.
    pub fn total(&self) -> usize {
        self.state.lock().total
    }

    /// Whether the most recent raw page was full-sized.
    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    /// Current continuation link, if any.
    pub fn cursor(&self) -> Option<String> {
        self.state.lock().cursor.clone()
    }

    /// Whether a fetch is outstanding.
    pub fn is_fetching(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Snapshot of the current parameters.
    pub fn params(&self) -> FeedParams {
        self.params.lock().clone()
    }
}

impl std::fmt::Debug for PageFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFeed").finish()
    }
}

/// Pull the raw page and continuation link out of a response body.
fn parse_page(body: &Value) -> Result<PageResult> {
    let items = body
        .get("value")
        .and_then(Value::as_array)
        .ok_or(Error::MissingField("value"))?
        .clone();

    let next_cursor = body
        .get("@odata.nextLink")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(PageResult { items, next_cursor })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::feed::types::ColumnKind;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;

    enum Scripted {
        Body(Value),
        Status(u16),
    }

    /// Client that replays scripted responses and records every URL,
    /// optionally holding each request until the gate is opened.
    struct ScriptedClient {
        responses: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<String>>,
        gate: Option<tokio::sync::Semaphore>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Scripted>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                gate: None,
            }
        }

        fn gated(responses: Vec<Scripted>) -> Self {
            Self {
                gate: Some(tokio::sync::Semaphore::new(0)),
                ..Self::new(responses)
            }
        }

        fn open_gate(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl ListClient for ScriptedClient {
        async fn get_json(&self, url: &str) -> Result<Value> {
            self.requests.lock().push(url.to_string());
            if let Some(gate) = &self.gate {
                let permit = gate.acquire().await.expect("gate closed");
                permit.forget();
            }
            match self.responses.lock().pop_front() {
                Some(Scripted::Body(body)) => Ok(body),
                Some(Scripted::Status(status)) => Err(Error::Status {
                    status,
                    body: String::new(),
                }),
                None => panic!("unscripted request: {url}"),
            }
        }

        async fn post_json(&self, _url: &str, _body: &Value) -> Result<Value> {
            panic!("unexpected POST");
        }

        fn site_url(&self) -> &str {
            "https://example.test/site"
        }
    }

    fn page(ids: &[u64], next: Option<&str>) -> Value {
        let items: Vec<Value> = ids.iter().map(|id| json!({"Id": id})).collect();
        match next {
            Some(link) => json!({"value": items, "@odata.nextLink": link}),
            None => json!({"value": items}),
        }
    }

    fn feed_with(responses: Vec<Scripted>, page_size: u32) -> (Arc<ScriptedClient>, PageFeed) {
        let client = Arc::new(ScriptedClient::new(responses));
        let config = Config {
            default_page_size: page_size,
            ..Config::default()
        };
        let feed = PageFeed::new(client.clone(), config);
        feed.set_category("Networking");
        (client, feed)
    }

    #[tokio::test]
    async fn full_page_sets_has_more() {
        let (_client, feed) = feed_with(vec![Scripted::Body(page(&[1, 2], Some("tok")))], 2);

        let outcome = feed.load_more().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { appended: 2 });
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn short_page_clears_has_more() {
        let (_client, feed) = feed_with(vec![Scripted::Body(page(&[1], None))], 2);

        feed.load_more().await.unwrap();
        assert!(!feed.has_more());
        assert_eq!(feed.total(), 1);
    }

    #[tokio::test]
    async fn cursor_followed_verbatim() {
        let (client, feed) = feed_with(
            vec![
                Scripted::Body(page(&[1, 2], Some("https://example.test/site/next?skiptoken=x%3D7"))),
                Scripted::Body(page(&[3], None)),
            ],
            2,
        );

        feed.load_more().await.unwrap();
        feed.load_more().await.unwrap();

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1], "https://example.test/site/next?skiptoken=x%3D7");
    }

    #[tokio::test]
    async fn reset_clears_items_and_cursor() {
        let (_client, feed) = feed_with(vec![Scripted::Body(page(&[1, 2], Some("tok")))], 2);

        feed.load_more().await.unwrap();
        assert_eq!(feed.total(), 2);

        feed.set_category("Storage");
        assert_eq!(feed.total(), 0);
        assert!(feed.items().is_empty());
        assert!(feed.cursor().is_none());
        assert!(!feed.has_more());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let (_client, feed) = feed_with(
            vec![
                Scripted::Body(page(&[1, 2], Some("tok"))),
                Scripted::Status(503),
            ],
            2,
        );

        feed.load_more().await.unwrap();
        let before = feed.items();

        let err = feed.load_more().await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 503, .. }));
        assert_eq!(feed.items(), before);
        assert_eq!(feed.cursor(), Some("tok".to_string()));
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn missing_value_array_is_an_error() {
        let (_client, feed) = feed_with(vec![Scripted::Body(json!({"odd": true}))], 2);

        let err = feed.load_more().await.unwrap_err();
        assert!(matches!(err, Error::MissingField("value")));
        assert_eq!(feed.total(), 0);
    }

    #[tokio::test]
    async fn fully_filtered_page_still_reports_has_more() {
        let body = json!({
            "value": [
                {"Id": 1, "Tags": [{"Label": "B"}]},
                {"Id": 2, "Tags": [{"Label": "C"}]},
            ],
            "@odata.nextLink": "tok",
        });
        let (_client, feed) = feed_with(vec![Scripted::Body(body)], 2);
        feed.apply_filter(FilterCriterion {
            column: "Tags".to_string(),
            kind: ColumnKind::TaxonomyMulti,
            values: vec!["A".to_string()],
        });

        let outcome = feed.load_more().await.unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { appended: 0 });
        assert_eq!(feed.total(), 0);
        assert!(feed.has_more());
    }

    #[tokio::test]
    async fn primed_feed_without_cursor_has_nothing_more() {
        let (client, feed) = feed_with(vec![Scripted::Body(page(&[1, 2], None))], 2);

        feed.load_more().await.unwrap();
        assert!(feed.has_more());

        let outcome = feed.load_more().await.unwrap();
        assert_eq!(outcome, LoadOutcome::NothingMore);
        assert!(!feed.has_more());
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn filter_change_resets_and_requeries() {
        let (client, feed) = feed_with(
            vec![
                Scripted::Body(page(&[1, 2], Some("tok"))),
                Scripted::Body(page(&[5], None)),
            ],
            2,
        );

        feed.load_more().await.unwrap();
        feed.apply_filter(FilterCriterion {
            column: "Status".to_string(),
            kind: ColumnKind::Choice,
            values: vec!["Published".to_string()],
        });
        feed.load_more().await.unwrap();

        let requests = client.requests();
        // Second request is a fresh query, not the stale cursor.
        assert_ne!(requests[1], "tok");
        assert!(requests[1].contains("Status%20eq%20%27Published%27"));
        let ids: Vec<u64> = feed.items().iter().map(|i| i["Id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![5]);
    }

    #[tokio::test]
    async fn second_trigger_during_fetch_is_ignored() {
        let client = Arc::new(ScriptedClient::gated(vec![Scripted::Body(page(
            &[1, 2],
            None,
        ))]));
        let config = Config {
            default_page_size: 2,
            ..Config::default()
        };
        let feed = Arc::new(PageFeed::new(client.clone(), config));
        feed.set_category("Networking");

        let background = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more().await })
        };
        tokio::task::yield_now().await;
        assert!(feed.is_fetching());

        let second = feed.load_more().await.unwrap();
        assert_eq!(second, LoadOutcome::AlreadyFetching);

        client.open_gate();
        let first = background.await.unwrap().unwrap();
        assert_eq!(first, LoadOutcome::Loaded { appended: 2 });
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn response_after_reset_is_dropped() {
        let client = Arc::new(ScriptedClient::gated(vec![Scripted::Body(page(
            &[1, 2],
            Some("tok"),
        ))]));
        let config = Config {
            default_page_size: 2,
            ..Config::default()
        };
        let feed = Arc::new(PageFeed::new(client.clone(), config));
        feed.set_category("Networking");

        let background = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.load_more().await })
        };
        tokio::task::yield_now().await;

        // Reset while the request is outstanding.
        feed.set_category("Storage");
        client.open_gate();

        let outcome = background.await.unwrap().unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(feed.items().is_empty());
        assert!(feed.cursor().is_none());
    }

    #[tokio::test]
    async fn sort_by_toggles_direction_on_same_column() {
        let (_client, feed) = feed_with(vec![], 2);

        feed.sort_by("Title");
        assert_eq!(feed.params().sort.direction, SortDirection::Desc);

        feed.sort_by("Title");
        assert_eq!(feed.params().sort.direction, SortDirection::Asc);

        feed.sort_by("Created");
        assert_eq!(feed.params().sort.field, "Created");
        assert_eq!(feed.params().sort.direction, SortDirection::Desc);
    }

    #[tokio::test]
    async fn empty_criterion_removes_existing_filter() {
        let (_client, feed) = feed_with(vec![], 2);

        feed.apply_filter(FilterCriterion {
            column: "Status".to_string(),
            kind: ColumnKind::Choice,
            values: vec!["Published".to_string()],
        });
        assert_eq!(feed.params().server_filters.len(), 1);

        feed.apply_filter(FilterCriterion {
            column: "Status".to_string(),
            kind: ColumnKind::Choice,
            values: Vec::new(),
        });
        assert!(feed.params().server_filters.is_empty());
    }

    #[tokio::test]
    async fn one_criterion_per_column_per_class() {
        let (_client, feed) = feed_with(vec![], 2);

        feed.apply_filter(FilterCriterion {
            column: "Status".to_string(),
            kind: ColumnKind::Choice,
            values: vec!["Draft".to_string()],
        });
        feed.apply_filter(FilterCriterion {
            column: "Status".to_string(),
            kind: ColumnKind::Choice,
            values: vec!["Published".to_string()],
        });

        let params = feed.params();
        assert_eq!(params.server_filters.len(), 1);
        assert_eq!(params.server_filters[0].values, vec!["Published"]);
    }
}
