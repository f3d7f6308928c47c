//! HTTP seam to the remote list service.
//!
//! Provides the `ListClient` trait and a reqwest-backed implementation.
//! The engine only ever needs two verbs against the service: GET a JSON
//! resource and POST a JSON payload, so the seam stays that narrow and an
//! in-memory mock can stand in for the whole service under test.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Longest response body kept when reporting a non-success status.
const ERROR_BODY_LIMIT: usize = 512;

/// Client seam for the remote list service.
#[async_trait]
pub trait ListClient: Send + Sync {
    /// GET a resource and parse the body as JSON.
    async fn get_json(&self, url: &str) -> Result<Value>;

    /// POST a JSON payload and parse the response body as JSON.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;

    /// Absolute URL of the site all list resources hang off.
    fn site_url(&self) -> &str;
}

/// reqwest-backed client for the list service's REST endpoints.
pub struct RestListClient {
    http: reqwest::Client,
    site_url: String,
    bearer_token: Option<String>,
}

impl RestListClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            // Continuation links must be followed verbatim, not rewritten
            // by a redirect chain we never see.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            http,
            site_url: config.site_url.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
        }
    }

    fn decorate(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req
            .header("Accept", "application/json;odata=nometadata")
            .header("User-Agent", "pagefeed/0.2");
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if !(200..300).contains(&status) {
            let mut truncated = body;
            if truncated.len() > ERROR_BODY_LIMIT {
                let mut at = ERROR_BODY_LIMIT;
                while at > 0 && !truncated.is_char_boundary(at) {
                    at -= 1;
                }
                truncated.truncate(at);
            }
            warn!(status = status, "list service returned non-success status");
            return Err(Error::Status {
                status,
                body: truncated,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ListClient for RestListClient {
    async fn get_json(&self, url: &str) -> Result<Value> {
        debug!(url = %url, "GET");
        let response = self.decorate(self.http.get(url)).send().await?;
        Self::read_json(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!(url = %url, "POST");
        let response = self
            .decorate(self.http.post(url))
            .header("Content-Type", "application/json;odata=nometadata")
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    fn site_url(&self) -> &str {
        &self.site_url
    }
}

impl std::fmt::Debug for RestListClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestListClient")
            .field("site_url", &self.site_url)
            .finish()
    }
}

/// Details of a list, fetched by title.
#[derive(Debug, Clone, Deserialize)]
pub struct ListDetails {
    #[serde(rename = "Id")]
    pub id: String,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "ItemCount", default)]
    pub item_count: u64,
}

/// The authenticated user as reported by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    #[serde(rename = "Id")]
    pub id: i64,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Email", default)]
    pub email: String,
}

/// URL of a list's items collection.
pub fn items_url(site_url: &str, list_title: &str) -> String {
    format!(
        "{}/_api/web/lists/getByTitle('{}')/items",
        site_url,
        urlencoding::encode(list_title)
    )
}

/// Create a record in the named list. Returns the created record.
pub async fn create_item(client: &dyn ListClient, list_title: &str, payload: &Value) -> Result<Value> {
    let url = items_url(client.site_url(), list_title);
    client.post_json(&url, payload).await
}

/// Fetch list details by title.
pub async fn list_details(client: &dyn ListClient, list_title: &str) -> Result<ListDetails> {
    let url = format!(
        "{}/_api/web/lists/getByTitle('{}')",
        client.site_url(),
        urlencoding::encode(list_title)
    );
    let body = client.get_json(&url).await?;
    Ok(serde_json::from_value(body)?)
}

/// Fetch the current authenticated user.
pub async fn current_user(client: &dyn ListClient) -> Result<CurrentUser> {
    let url = format!("{}/_api/web/currentuser", client.site_url());
    let body = client.get_json(&url).await?;
    Ok(serde_json::from_value(body)?)
}
