//! Alert subscription status with a scoped read-through cache.
//!
//! Whether the current user holds an alert subscription on an item is
//! looked up against the alerts endpoint and cached per service instance,
//! keyed by (list name, item id). The cache is unbounded — acceptable for
//! a single view's lifetime — and explicitly invalidated when the
//! underlying subscription changes. Lookup failures are surfaced, never
//! cached.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use crate::client::ListClient;
use crate::error::{Error, Result};

/// Subscription status lookups for one list.
pub struct AlertService {
    client: Arc<dyn ListClient>,
    list_title: String,
    cache: DashMap<(String, i64), bool>,
}

impl AlertService {
    pub fn new(client: Arc<dyn ListClient>, list_title: &str) -> Self {
        Self {
            client,
            list_title: list_title.to_string(),
            cache: DashMap::new(),
        }
    }

    /// Whether `user_id` has an alert on the item, read through the cache.
    ///
    /// The alert title the service records is `"{list}: {file_name}"`;
    /// subscribed means the filtered alert collection is non-empty.
    pub async fn is_subscribed(
        &self,
        user_id: i64,
        item_id: i64,
        file_name: &str,
    ) -> Result<bool> {
        let key = (self.list_title.clone(), item_id);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(*cached);
        }

        let alert_title = format!("{}: {}", self.list_title, file_name);
        let filter = format!(
            "UserId eq {} and Title eq '{}'",
            user_id,
            alert_title.replace('\'', "''")
        );
        let url = format!(
            "{}/_api/web/alerts?$filter={}",
            self.client.site_url(),
            urlencoding::encode(&filter),
        );

        let body = self.client.get_json(&url).await?;
        let alerts = body
            .get("value")
            .and_then(Value::as_array)
            .ok_or(Error::MissingField("value"))?;

        let subscribed = !alerts.is_empty();
        self.cache.insert(key, subscribed);
        debug!(item = item_id, subscribed = subscribed, "alert status cached");
        Ok(subscribed)
    }

    /// Drop the cached status for one item (its subscription changed).
    pub fn invalidate(&self, item_id: i64) {
        self.cache.remove(&(self.list_title.clone(), item_id));
    }

    /// Drop every cached status.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl std::fmt::Debug for AlertService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertService")
            .field("list_title", &self.list_title)
            .field("cached", &self.cache.len())
            .finish()
    }
}
