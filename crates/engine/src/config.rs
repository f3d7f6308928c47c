//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};

/// Rolling creation-date window, in days. Categories outside the
/// unbounded set only see items created within this window.
pub const CREATED_WINDOW_DAYS: i64 = 120;

/// Page sizes the hosting view may select between.
pub const PAGE_SIZE_OPTIONS: &[u32] = &[10, 20, 40, 60, 80, 100, 200, 300, 400, 500];

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute URL of the site hosting the lists.
    pub site_url: String,

    /// Title of the pages list (default: "Site Pages").
    pub pages_list: String,

    /// Title of the list receiving feedback records (default: "Feedbacks").
    pub feedback_list: String,

    /// Internal name of the category field (default: "KnowledgeBaseLabel").
    pub category_field: String,

    /// Internal name of the identifier field (default: "Article_x0020_ID").
    pub id_field: String,

    /// Internal name of the modified field searched by free text
    /// (default: "Modified").
    pub modified_field: String,

    /// Categories allowed unbounded history; all others get the rolling
    /// creation-date window (comma-separated, default: empty).
    pub unbounded_categories: Vec<String>,

    /// Requested page length (default: 40).
    pub default_page_size: u32,

    /// HTTP request timeout in seconds (default: 30).
    pub http_timeout_secs: u64,

    /// Bearer token sent with every request. When None, requests are
    /// issued unauthenticated (ambient auth, e.g. a cookie-forwarding
    /// proxy, is assumed).
    pub bearer_token: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let site_url =
            env::var("SITE_URL").context("SITE_URL environment variable is required")?;
        url::Url::parse(&site_url).context("SITE_URL must be an absolute URL")?;

        let pages_list = env::var("PAGES_LIST").unwrap_or_else(|_| "Site Pages".to_string());

        let feedback_list = env::var("FEEDBACK_LIST").unwrap_or_else(|_| "Feedbacks".to_string());

        let category_field =
            env::var("CATEGORY_FIELD").unwrap_or_else(|_| "KnowledgeBaseLabel".to_string());

        let id_field = env::var("ID_FIELD").unwrap_or_else(|_| "Article_x0020_ID".to_string());

        let modified_field = env::var("MODIFIED_FIELD").unwrap_or_else(|_| "Modified".to_string());

        let unbounded_categories = env::var("UNBOUNDED_CATEGORIES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_page_size = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "40".to_string())
            .parse()
            .context("DEFAULT_PAGE_SIZE must be a valid u32")?;

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("HTTP_TIMEOUT_SECS must be a valid u64")?;

        let bearer_token = env::var("API_BEARER_TOKEN").ok();

        Ok(Self {
            site_url,
            pages_list,
            feedback_list,
            category_field,
            id_field,
            modified_field,
            unbounded_categories,
            default_page_size,
            http_timeout_secs,
            bearer_token,
        })
    }
}

impl Default for Config {
    /// Defaults suitable for tests and embedding; `site_url` must still be
    /// set before building a real client.
    fn default() -> Self {
        Self {
            site_url: String::new(),
            pages_list: "Site Pages".to_string(),
            feedback_list: "Feedbacks".to_string(),
            category_field: "KnowledgeBaseLabel".to_string(),
            id_field: "Article_x0020_ID".to_string(),
            modified_field: "Modified".to_string(),
            unbounded_categories: Vec::new(),
            default_page_size: 40,
            http_timeout_secs: 30,
            bearer_token: None,
        }
    }
}
