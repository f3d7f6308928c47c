//! Feedback record submission.
//!
//! Builds the structured feedback payload for a page and posts it to the
//! configured feedback list through the generic record-creation contract.
//! Failures propagate to the caller; nothing is retried.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::client::{self, ListClient};
use crate::error::Result;

/// A link field value: URL plus display text.
#[derive(Debug, Clone, Serialize)]
pub struct LinkValue {
    #[serde(rename = "Url")]
    pub url: String,

    #[serde(rename = "Description")]
    pub description: String,
}

/// One feedback submission, serialized with the service's field names.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRecord {
    #[serde(rename = "Article_x0020_ID")]
    pub article_id: String,

    #[serde(rename = "Title")]
    pub title: String,

    #[serde(rename = "Name")]
    pub name: LinkValue,

    #[serde(rename = "Link")]
    pub link: LinkValue,

    #[serde(rename = "FeedBackComments")]
    pub comments: String,

    #[serde(rename = "FeedBackProviderName")]
    pub provider_name: String,

    #[serde(rename = "FeedBackProviderEmail")]
    pub provider_email: String,

    #[serde(rename = "CreatedBy")]
    pub created_by: String,

    #[serde(rename = "ModifiedBy")]
    pub modified_by: String,
}

/// Submits feedback records to one target list.
pub struct FeedbackService {
    client: Arc<dyn ListClient>,
    target_list: String,
}

impl FeedbackService {
    pub fn new(client: Arc<dyn ListClient>, target_list: &str) -> Self {
        Self {
            client,
            target_list: target_list.to_string(),
        }
    }

    /// Create the feedback record. Returns the created item.
    pub async fn submit(&self, record: &FeedbackRecord) -> Result<Value> {
        let payload = serde_json::to_value(record)?;
        let created = client::create_item(self.client.as_ref(), &self.target_list, &payload).await?;
        info!(article = %record.article_id, list = %self.target_list, "feedback submitted");
        Ok(created)
    }
}

impl std::fmt::Debug for FeedbackService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackService")
            .field("target_list", &self.target_list)
            .finish()
    }
}
